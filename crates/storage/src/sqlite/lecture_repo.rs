use async_trait::async_trait;
use syllabus_core::model::{LectureSession, LectureSessionId, SubjectId};

use super::SqliteRepository;
use super::mapping::{count_from_i64, id_i64, map_session_row, read_err, ser, write_err};
use crate::repository::{LectureRepository, NewLectureRecord, StorageError};

#[async_trait]
impl LectureRepository for SqliteRepository {
    async fn insert_session(
        &self,
        session: NewLectureRecord,
    ) -> Result<LectureSessionId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO lecture_sessions (subject_id, date, attendees, notes)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("subject_id", session.subject_id.value())?)
        .bind(session.date)
        .bind(i64::from(session.attendees))
        .bind(session.notes)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        u64::try_from(res.last_insert_rowid())
            .map(LectureSessionId::new)
            .map_err(ser)
    }

    async fn recent_sessions(
        &self,
        subject: SubjectId,
        limit: u32,
    ) -> Result<Vec<LectureSession>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, subject_id, date, attendees, notes
            FROM lecture_sessions
            WHERE subject_id = ?1
            ORDER BY date DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(id_i64("subject_id", subject.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_session_row).collect()
    }

    async fn count_sessions(&self, subject: SubjectId) -> Result<u64, StorageError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM lecture_sessions WHERE subject_id = ?1")
                .bind(id_i64("subject_id", subject.value())?)
                .fetch_one(&self.pool)
                .await
                .map_err(read_err)?;

        count_from_i64(count)
    }
}
