use thiserror::Error;

use crate::model::{
    ChapterError, LectureError, ProgressStatusError, SubjectError, TopicError, UserError,
};

/// Validation failures raised by the domain model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Chapter(#[from] ChapterError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Lecture(#[from] LectureError),
    #[error(transparent)]
    ProgressStatus(#[from] ProgressStatusError),
    #[error(transparent)]
    User(#[from] UserError),
}
