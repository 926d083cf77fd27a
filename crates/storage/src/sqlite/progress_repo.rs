use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use sqlx::sqlite::SqliteRow;
use syllabus_core::model::{ProgressStatus, SubjectId, TopicId, TopicProgress, TopicStatus, UserId};
use syllabus_core::progress::StatusCounts;
use tracing::debug;

use super::SqliteRepository;
use super::mapping::{count_from_i64, id_i64, map_status_row, parse_status, read_err, ser, write_err};
use crate::repository::{
    ClassStatusPersistence, ProgressRepository, StorageError, TopicStatusRepository,
};

const UPSERT_PROGRESS: &str = r"
    INSERT INTO topic_progress (student_id, topic_id, status, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(student_id, topic_id) DO UPDATE SET
        status = excluded.status,
        updated_at = excluded.updated_at
";

fn grouped_counts(rows: &[SqliteRow]) -> Result<StatusCounts, StorageError> {
    let mut counts = StatusCounts::default();
    for row in rows {
        let status: String = row.try_get("status").map_err(ser)?;
        let n: i64 = row.try_get("n").map_err(ser)?;
        counts.add(parse_status(&status)?, count_from_i64(n)?);
    }
    Ok(counts)
}

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn student_status_counts(
        &self,
        subject: SubjectId,
        student: UserId,
    ) -> Result<StatusCounts, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT p.status AS status, COUNT(*) AS n
            FROM topic_progress p
            JOIN topics t ON t.id = p.topic_id
            JOIN chapters c ON c.id = t.chapter_id
            WHERE c.subject_id = ?1 AND p.student_id = ?2
            GROUP BY p.status
            ",
        )
        .bind(id_i64("subject_id", subject.value())?)
        .bind(id_i64("student_id", student.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        grouped_counts(&rows)
    }

    async fn subject_status_counts(&self, subject: SubjectId) -> Result<StatusCounts, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT p.status AS status, COUNT(*) AS n
            FROM topic_progress p
            JOIN topics t ON t.id = p.topic_id
            JOIN chapters c ON c.id = t.chapter_id
            WHERE c.subject_id = ?1
            GROUP BY p.status
            ",
        )
        .bind(id_i64("subject_id", subject.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        grouped_counts(&rows)
    }

    async fn subject_status_counts_for(
        &self,
        subject: SubjectId,
        students: &[UserId],
    ) -> Result<StatusCounts, StorageError> {
        if students.is_empty() {
            return Ok(StatusCounts::default());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            r"
            SELECT p.status AS status, COUNT(*) AS n
            FROM topic_progress p
            JOIN topics t ON t.id = p.topic_id
            JOIN chapters c ON c.id = t.chapter_id
            WHERE c.subject_id = ",
        );
        query.push_bind(id_i64("subject_id", subject.value())?);
        query.push(" AND p.student_id IN (");
        let mut ids = query.separated(", ");
        for student in students {
            ids.push_bind(id_i64("student_id", student.value())?);
        }
        ids.push_unseparated(") GROUP BY p.status");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(read_err)?;
        grouped_counts(&rows)
    }

    async fn progress_status(
        &self,
        student: UserId,
        topic: TopicId,
    ) -> Result<ProgressStatus, StorageError> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM topic_progress WHERE student_id = ?1 AND topic_id = ?2",
        )
        .bind(id_i64("student_id", student.value())?)
        .bind(id_i64("topic_id", topic.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        status
            .as_deref()
            .map(parse_status)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    async fn upsert_progress(&self, progress: &TopicProgress) -> Result<(), StorageError> {
        sqlx::query(UPSERT_PROGRESS)
            .bind(id_i64("student_id", progress.student_id.value())?)
            .bind(id_i64("topic_id", progress.topic_id.value())?)
            .bind(progress.status.as_str())
            .bind(progress.updated_at)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;
        Ok(())
    }
}

#[async_trait]
impl TopicStatusRepository for SqliteRepository {
    async fn get_status(&self, topic: TopicId) -> Result<Option<TopicStatus>, StorageError> {
        let row = sqlx::query(
            "SELECT topic_id, completed, updated_by, updated_at FROM topic_status WHERE topic_id = ?1",
        )
        .bind(id_i64("topic_id", topic.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        row.as_ref().map(map_status_row).transpose()
    }

    async fn statuses_for_subject(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<TopicStatus>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT s.topic_id, s.completed, s.updated_by, s.updated_at
            FROM topic_status s
            JOIN topics t ON t.id = s.topic_id
            JOIN chapters c ON c.id = t.chapter_id
            WHERE c.subject_id = ?1
            ORDER BY s.topic_id ASC
            ",
        )
        .bind(id_i64("subject_id", subject.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_status_row).collect()
    }
}

async fn write_class_status(
    conn: &mut SqliteConnection,
    status: &TopicStatus,
    students: &[UserId],
    at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let topic_id = id_i64("topic_id", status.topic_id().value())?;
    let updated_by = status
        .updated_by()
        .map(|u| id_i64("updated_by", u.value()))
        .transpose()?;
    let new_status = ProgressStatus::from_class_flag(status.completed());

    sqlx::query(
        r"
        INSERT INTO topic_status (topic_id, completed, updated_by, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(topic_id) DO UPDATE SET
            completed = excluded.completed,
            updated_by = excluded.updated_by,
            updated_at = excluded.updated_at
        ",
    )
    .bind(topic_id)
    .bind(if status.completed() { 1_i64 } else { 0 })
    .bind(updated_by)
    .bind(status.updated_at())
    .execute(&mut *conn)
    .await
    .map_err(write_err)?;

    for student in students {
        sqlx::query(UPSERT_PROGRESS)
            .bind(id_i64("student_id", student.value())?)
            .bind(topic_id)
            .bind(new_status.as_str())
            .bind(at)
            .execute(&mut *conn)
            .await
            .map_err(write_err)?;
    }
    Ok(())
}

#[async_trait]
impl ClassStatusPersistence for SqliteRepository {
    async fn apply_class_status(
        &self,
        status: &TopicStatus,
        students: &[UserId],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(read_err)?;

        if let Err(e) = write_class_status(&mut tx, status, students, at).await {
            tx.rollback().await.map_err(read_err)?;
            return Err(e);
        }
        tx.commit().await.map_err(read_err)?;

        debug!(
            topic_id = status.topic_id().value(),
            students = students.len(),
            completed = status.completed(),
            "applied class status"
        );
        Ok(())
    }
}
