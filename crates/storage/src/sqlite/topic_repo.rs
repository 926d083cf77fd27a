use async_trait::async_trait;
use syllabus_core::model::{ChapterId, SubjectId, Topic, TopicId};

use super::SqliteRepository;
use super::mapping::{
    count_from_i64, id_i64, map_topic_row, read_err, subject_id_from_i64, topic_id_from_i64,
    write_err,
};
use crate::repository::{NewTopicRecord, StorageError, TopicRepository};

#[async_trait]
impl TopicRepository for SqliteRepository {
    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO topics (chapter_id, title, ord)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_i64("chapter_id", topic.chapter_id.value())?)
        .bind(topic.title.trim())
        .bind(i64::from(topic.order))
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        topic_id_from_i64(res.last_insert_rowid())
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query("SELECT id, chapter_id, title, ord FROM topics WHERE id = ?1")
            .bind(id_i64("topic_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        row.as_ref().map(map_topic_row).transpose()
    }

    async fn topics_for_chapter(&self, chapter: ChapterId) -> Result<Vec<Topic>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, chapter_id, title, ord FROM topics
            WHERE chapter_id = ?1
            ORDER BY ord ASC, id ASC
            ",
        )
        .bind(id_i64("chapter_id", chapter.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_topic_row).collect()
    }

    async fn count_topics_for_subject(&self, subject: SubjectId) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM topics t
            JOIN chapters c ON c.id = t.chapter_id
            WHERE c.subject_id = ?1
            ",
        )
        .bind(id_i64("subject_id", subject.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(read_err)?;

        count_from_i64(count)
    }

    async fn subject_of_topic(&self, topic: TopicId) -> Result<Option<SubjectId>, StorageError> {
        let subject: Option<i64> = sqlx::query_scalar(
            r"
            SELECT c.subject_id FROM topics t
            JOIN chapters c ON c.id = t.chapter_id
            WHERE t.id = ?1
            ",
        )
        .bind(id_i64("topic_id", topic.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_err)?;

        subject.map(subject_id_from_i64).transpose()
    }
}
