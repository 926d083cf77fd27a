use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{TopicId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressStatusError {
    #[error("invalid progress status: {0}")]
    Invalid(String),
}

/// A student's individual status for one topic.
///
/// A missing progress row is equivalent to `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub const ALL: [ProgressStatus; 3] = [
        ProgressStatus::NotStarted,
        ProgressStatus::InProgress,
        ProgressStatus::Completed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "Not Started",
            ProgressStatus::InProgress => "In Progress",
            ProgressStatus::Completed => "Completed",
        }
    }

    /// Status a student is moved to when the class-wide flag changes.
    ///
    /// Clearing the class flag moves students back to `InProgress`, never to
    /// `NotStarted`.
    #[must_use]
    pub fn from_class_flag(completed: bool) -> Self {
        if completed {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = ProgressStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            other => Err(ProgressStatusError::Invalid(other.to_string())),
        }
    }
}

/// One student's progress row for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicProgress {
    pub student_id: UserId,
    pub topic_id: TopicId,
    pub status: ProgressStatus,
    pub updated_at: DateTime<Utc>,
}

impl TopicProgress {
    #[must_use]
    pub fn new(
        student_id: UserId,
        topic_id: TopicId,
        status: ProgressStatus,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id,
            topic_id,
            status,
            updated_at,
        }
    }
}
