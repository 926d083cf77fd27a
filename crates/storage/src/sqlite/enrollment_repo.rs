use async_trait::async_trait;
use syllabus_core::model::{Enrollment, Role, SubjectId, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, read_err, user_id_from_i64, write_err};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO enrollments (user_id, subject_id, role)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_i64("user_id", enrollment.user_id.value())?)
        .bind(id_i64("subject_id", enrollment.subject_id.value())?)
        .bind(enrollment.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn enrolled_users(
        &self,
        subject: SubjectId,
        role: Role,
    ) -> Result<Vec<UserId>, StorageError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r"
            SELECT user_id FROM enrollments
            WHERE subject_id = ?1 AND role = ?2
            ORDER BY user_id ASC
            ",
        )
        .bind(id_i64("subject_id", subject.value())?)
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        ids.into_iter().map(user_id_from_i64).collect()
    }
}
