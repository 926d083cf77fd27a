use async_trait::async_trait;
use syllabus_core::model::{Subject, SubjectId, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_subject_row, read_err, subject_id_from_i64, write_err};
use crate::repository::{NewSubjectRecord, StorageError, SubjectRepository};

const SUBJECT_COLUMNS: &str =
    "id, name, class_name, planned_lectures, start_date, end_date, teacher_id";

#[async_trait]
impl SubjectRepository for SqliteRepository {
    async fn insert_subject(&self, subject: NewSubjectRecord) -> Result<SubjectId, StorageError> {
        let teacher = subject
            .teacher
            .map(|t| id_i64("teacher_id", t.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
            INSERT INTO subjects (name, class_name, planned_lectures, start_date, end_date, teacher_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(subject.name)
        .bind(subject.class_name)
        .bind(i64::from(subject.planned_lectures))
        .bind(subject.start_date)
        .bind(subject.end_date)
        .bind(teacher)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        subject_id_from_i64(res.last_insert_rowid())
    }

    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, StorageError> {
        let row = sqlx::query(&format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE id = ?1"))
            .bind(id_i64("subject_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_err)?;

        row.as_ref().map(map_subject_row).transpose()
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_subject_row).collect()
    }

    async fn subjects_for_teacher(&self, teacher: UserId) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {SUBJECT_COLUMNS} FROM subjects
            WHERE teacher_id = ?1
            ORDER BY class_name ASC, name ASC
            "
        ))
        .bind(id_i64("teacher_id", teacher.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(read_err)?;

        rows.iter().map(map_subject_row).collect()
    }
}
