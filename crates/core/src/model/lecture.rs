use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{LectureSessionId, SubjectId};

const MAX_NOTES_LEN: usize = 250;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LectureError {
    #[error("lecture notes exceed {max} characters")]
    NotesTooLong { max: usize },
}

/// One held lecture: date, attendance and free-text notes.
///
/// Sessions list most-recent-first by `(date, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LectureSession {
    id: LectureSessionId,
    subject_id: SubjectId,
    date: NaiveDate,
    attendees: u32,
    notes: String,
}

impl LectureSession {
    /// # Errors
    ///
    /// Returns `LectureError::NotesTooLong` if the notes exceed 250 characters.
    pub fn new(
        id: LectureSessionId,
        subject_id: SubjectId,
        date: NaiveDate,
        attendees: u32,
        notes: impl Into<String>,
    ) -> Result<Self, LectureError> {
        let notes = notes.into().trim().to_string();
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(LectureError::NotesTooLong { max: MAX_NOTES_LEN });
        }
        Ok(Self {
            id,
            subject_id,
            date,
            attendees,
            notes,
        })
    }

    #[must_use]
    pub fn id(&self) -> LectureSessionId {
        self.id
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn attendees(&self) -> u32 {
        self.attendees
    }

    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }
}
