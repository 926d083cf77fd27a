use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{ChapterId, TopicId, UserId};

const MAX_TITLE_LEN: usize = 250;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic title is required")]
    EmptyTitle,

    #[error("topic title exceeds {max} characters")]
    TitleTooLong { max: usize },
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// A single syllabus item within a chapter. Titles are unique per chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    id: TopicId,
    chapter_id: ChapterId,
    title: String,
    order: u32,
}

impl Topic {
    /// Creates a topic with a validated title.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` if the title is blank or too long.
    pub fn new(
        id: TopicId,
        chapter_id: ChapterId,
        title: impl Into<String>,
        order: u32,
    ) -> Result<Self, TopicError> {
        let raw = title.into();
        let title = raw.trim();
        if title.is_empty() {
            return Err(TopicError::EmptyTitle);
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(TopicError::TitleTooLong { max: MAX_TITLE_LEN });
        }
        Ok(Self {
            id,
            chapter_id,
            title: title.to_string(),
            order,
        })
    }

    #[must_use]
    pub fn id(&self) -> TopicId {
        self.id
    }

    #[must_use]
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn sort_key(&self) -> (u32, TopicId) {
        (self.order, self.id)
    }
}

//
// ─── CLASS-WIDE STATUS ─────────────────────────────────────────────────────────
//

/// Class-wide completion flag for a topic, set by a teacher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicStatus {
    topic_id: TopicId,
    completed: bool,
    updated_by: Option<UserId>,
    updated_at: DateTime<Utc>,
}

impl TopicStatus {
    /// A fresh, not-yet-completed status, as created on first toggle.
    #[must_use]
    pub fn pending(topic_id: TopicId, now: DateTime<Utc>) -> Self {
        Self {
            topic_id,
            completed: false,
            updated_by: None,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn from_persisted(
        topic_id: TopicId,
        completed: bool,
        updated_by: Option<UserId>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            topic_id,
            completed,
            updated_by,
            updated_at,
        }
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn updated_by(&self) -> Option<UserId> {
        self.updated_by
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Flip the completion flag, stamping the acting user and time.
    ///
    /// Returns the new flag value.
    pub fn toggle(&mut self, by: UserId, at: DateTime<Utc>) -> bool {
        self.completed = !self.completed;
        self.updated_by = Some(by);
        self.updated_at = at;
        self.completed
    }
}
