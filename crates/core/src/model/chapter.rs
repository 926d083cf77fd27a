use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{ChapterId, SubjectId};

const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChapterError {
    #[error("chapter title is required")]
    EmptyTitle,

    #[error("chapter title exceeds {max} characters")]
    TitleTooLong { max: usize },
}

/// An ordered grouping of topics within a subject.
///
/// Chapters sort by `(order, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    id: ChapterId,
    subject_id: SubjectId,
    title: String,
    order: u32,
}

impl Chapter {
    /// Creates a chapter with a validated title.
    ///
    /// # Errors
    ///
    /// Returns `ChapterError` if the title is blank or too long.
    pub fn new(
        id: ChapterId,
        subject_id: SubjectId,
        title: impl Into<String>,
        order: u32,
    ) -> Result<Self, ChapterError> {
        Ok(Self {
            id,
            subject_id,
            title: validate_title(title.into())?,
            order,
        })
    }

    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Replace the title, keeping position and parent.
    ///
    /// # Errors
    ///
    /// Returns `ChapterError` if the new title is blank or too long.
    pub fn rename(&mut self, title: impl Into<String>) -> Result<(), ChapterError> {
        self.title = validate_title(title.into())?;
        Ok(())
    }

    /// Sort key matching the `(order, id)` ordering.
    #[must_use]
    pub fn sort_key(&self) -> (u32, ChapterId) {
        (self.order, self.id)
    }
}

fn validate_title(raw: String) -> Result<String, ChapterError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ChapterError::EmptyTitle);
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ChapterError::TitleTooLong { max: MAX_TITLE_LEN });
    }
    Ok(title.to_string())
}
