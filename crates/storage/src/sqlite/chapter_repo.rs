use async_trait::async_trait;
use syllabus_core::model::{Chapter, ChapterId, SubjectId};

use super::SqliteRepository;
use super::mapping::{chapter_id_from_i64, id_i64, map_chapter_row, read_err, write_err};
use crate::repository::{ChapterRepository, NewChapterRecord, StorageError};

#[async_trait]
impl ChapterRepository for SqliteRepository {
    async fn insert_chapter(&self, chapter: NewChapterRecord) -> Result<ChapterId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO chapters (subject_id, title, ord)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_i64("subject_id", chapter.subject_id.value())?)
        .bind(chapter.title)
        .bind(i64::from(chapter.order))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        chapter_id_from_i64(res.last_insert_rowid())
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError> {
        let row = sqlx::query("SELECT id, subject_id, title, ord FROM chapters WHERE id = ?1")
            .bind(id_i64("chapter_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        row.as_ref().map(map_chapter_row).transpose()
    }

    async fn update_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE chapters SET title = ?1, ord = ?2 WHERE id = ?3")
            .bind(chapter.title())
            .bind(i64::from(chapter.order()))
            .bind(id_i64("chapter_id", chapter.id().value())?)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_chapter(&self, id: ChapterId) -> Result<(), StorageError> {
        // topics, topic_status and topic_progress cascade through foreign keys
        let res = sqlx::query("DELETE FROM chapters WHERE id = ?1")
            .bind(id_i64("chapter_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn chapters_for_subject(&self, subject: SubjectId) -> Result<Vec<Chapter>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, subject_id, title, ord FROM chapters
            WHERE subject_id = ?1
            ORDER BY ord ASC, id ASC
            ",
        )
        .bind(id_i64("subject_id", subject.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_chapter_row).collect()
    }
}
