use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use syllabus_core::model::{
    Chapter, ChapterId, LectureSession, LectureSessionId, ProgressStatus, Subject, SubjectId,
    Topic, TopicId, TopicStatus, UserId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map write failures, surfacing constraint violations as domain conditions.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn read_err(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn count_from_i64(v: i64) -> Result<u64, StorageError> {
    i64_to_u64("count", v)
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn subject_id_from_i64(v: i64) -> Result<SubjectId, StorageError> {
    Ok(SubjectId::new(i64_to_u64("subject_id", v)?))
}

pub(crate) fn chapter_id_from_i64(v: i64) -> Result<ChapterId, StorageError> {
    Ok(ChapterId::new(i64_to_u64("chapter_id", v)?))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn parse_status(s: &str) -> Result<ProgressStatus, StorageError> {
    s.parse::<ProgressStatus>().map_err(ser)
}

pub(crate) fn map_subject_row(row: &SqliteRow) -> Result<Subject, StorageError> {
    let teacher = row
        .try_get::<Option<i64>, _>("teacher_id")
        .map_err(ser)?
        .map(user_id_from_i64)
        .transpose()?;

    Subject::new(
        subject_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("class_name").map_err(ser)?,
        u32_from_i64(
            "planned_lectures",
            row.try_get::<i64, _>("planned_lectures").map_err(ser)?,
        )?,
        row.try_get("start_date").map_err(ser)?,
        row.try_get("end_date").map_err(ser)?,
        teacher,
    )
    .map_err(ser)
}

pub(crate) fn map_chapter_row(row: &SqliteRow) -> Result<Chapter, StorageError> {
    Chapter::new(
        chapter_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        subject_id_from_i64(row.try_get::<i64, _>("subject_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        u32_from_i64("ord", row.try_get::<i64, _>("ord").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_topic_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    Topic::new(
        topic_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        chapter_id_from_i64(row.try_get::<i64, _>("chapter_id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        u32_from_i64("ord", row.try_get::<i64, _>("ord").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_status_row(row: &SqliteRow) -> Result<TopicStatus, StorageError> {
    Ok(TopicStatus::from_persisted(
        topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        row.try_get::<Option<i64>, _>("updated_by")
            .map_err(ser)?
            .map(user_id_from_i64)
            .transpose()?,
        row.try_get("updated_at").map_err(ser)?,
    ))
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<LectureSession, StorageError> {
    LectureSession::new(
        LectureSessionId::new(i64_to_u64(
            "session_id",
            row.try_get::<i64, _>("id").map_err(ser)?,
        )?),
        subject_id_from_i64(row.try_get::<i64, _>("subject_id").map_err(ser)?)?,
        row.try_get("date").map_err(ser)?,
        u32_from_i64("attendees", row.try_get::<i64, _>("attendees").map_err(ser)?)?,
        row.try_get::<String, _>("notes").map_err(ser)?,
    )
    .map_err(ser)
}
