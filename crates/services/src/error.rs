//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use syllabus_core::model::{ChapterError, LectureError, TopicError};

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("subject not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `TopicStatusService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopicStatusError {
    #[error("topic not found")]
    NotFound,
    #[error("only teachers can change the class status of a topic")]
    PermissionDenied,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SyllabusService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyllabusError {
    #[error("not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("topic already exists in this chapter: {title}")]
    DuplicateTopic { title: String },
    #[error("user is already enrolled with this role")]
    AlreadyEnrolled,
    #[error(transparent)]
    Chapter(#[from] ChapterError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LectureService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LectureServiceError {
    #[error("subject not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Lecture(#[from] LectureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DashboardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DashboardError {
    #[error("subject not found")]
    NotFound,
    #[error("only teachers have a teacher dashboard")]
    PermissionDenied,
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
