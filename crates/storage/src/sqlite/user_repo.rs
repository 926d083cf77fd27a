use async_trait::async_trait;
use sqlx::Row;
use syllabus_core::model::{User, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, read_err, ser, user_id_from_i64, write_err};
use crate::repository::{NewUserRecord, StorageError, UserRepository};

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        let res = sqlx::query(
            r"
            INSERT INTO users (username, email, is_staff)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(user.username.trim())
        .bind(user.email)
        .bind(if user.is_staff { 1_i64 } else { 0 })
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;
        let id = res.last_insert_rowid();

        for group in &user.groups {
            sqlx::query(
                r"
                INSERT INTO user_groups (user_id, name) VALUES (?1, ?2)
                ON CONFLICT(user_id, name) DO NOTHING
                ",
            )
            .bind(id)
            .bind(group.as_str())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(read_err)?;
        user_id_from_i64(id)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let raw_id = id_i64("user_id", id.value())?;
        let row = sqlx::query("SELECT id, username, email, is_staff FROM users WHERE id = ?1")
            .bind(raw_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let groups: Vec<String> =
            sqlx::query_scalar("SELECT name FROM user_groups WHERE user_id = ?1 ORDER BY name")
                .bind(raw_id)
                .fetch_all(&self.pool)
                .await
                .map_err(read_err)?;

        User::new(
            id,
            row.try_get::<String, _>("username").map_err(ser)?,
            row.try_get::<Option<String>, _>("email").map_err(ser)?,
            row.try_get::<i64, _>("is_staff").map_err(ser)? != 0,
            groups,
        )
        .map(Some)
        .map_err(ser)
    }

    async fn add_to_group(&self, id: UserId, group: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_groups (user_id, name) VALUES (?1, ?2)
            ON CONFLICT(user_id, name) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", id.value())?)
        .bind(group)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn users_in_group(&self, group: &str) -> Result<Vec<UserId>, StorageError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r"
            SELECT DISTINCT user_id FROM user_groups
            WHERE name = ?1 COLLATE NOCASE
            ORDER BY user_id ASC
            ",
        )
        .bind(group)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        ids.into_iter().map(user_id_from_i64).collect()
    }
}
