use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{SubjectId, UserId};

/// Class label used when none is provided.
pub const DEFAULT_CLASS_NAME: &str = "CSE-SEM-1";
/// Planned lecture budget used when none is provided.
pub const DEFAULT_PLANNED_LECTURES: u32 = 24;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubjectError {
    #[error("subject name cannot be empty")]
    EmptyName,

    #[error("subject name exceeds {max} characters")]
    NameTooLong { max: usize },

    #[error("end date {end} is before start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

const MAX_NAME_LEN: usize = 200;

//
// ─── SUBJECT ───────────────────────────────────────────────────────────────────
//

/// A course within a class, with a planned lecture budget and a schedule window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    id: SubjectId,
    name: String,
    class_name: String,
    planned_lectures: u32,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    teacher: Option<UserId>,
}

impl Subject {
    /// Creates a validated subject.
    ///
    /// A blank class label falls back to [`DEFAULT_CLASS_NAME`].
    ///
    /// # Errors
    ///
    /// Returns `SubjectError` if the name is blank or too long, or if the end
    /// date precedes the start date.
    pub fn new(
        id: SubjectId,
        name: impl Into<String>,
        class_name: impl Into<String>,
        planned_lectures: u32,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        teacher: Option<UserId>,
    ) -> Result<Self, SubjectError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(SubjectError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(SubjectError::NameTooLong { max: MAX_NAME_LEN });
        }
        if let Some(end) = end_date.filter(|end| *end < start_date) {
            return Err(SubjectError::InvalidDateRange {
                start: start_date,
                end,
            });
        }

        let class_name = class_name.into().trim().to_string();
        let class_name = if class_name.is_empty() {
            DEFAULT_CLASS_NAME.to_string()
        } else {
            class_name
        };

        Ok(Self {
            id,
            name,
            class_name,
            planned_lectures,
            start_date,
            end_date,
            teacher,
        })
    }

    #[must_use]
    pub fn id(&self) -> SubjectId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn planned_lectures(&self) -> u32 {
        self.planned_lectures
    }

    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    #[must_use]
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    #[must_use]
    pub fn teacher(&self) -> Option<UserId> {
        self.teacher
    }

    #[must_use]
    pub fn is_taught_by(&self, user: UserId) -> bool {
        self.teacher == Some(user)
    }

    /// Lectures still to be held given how many were conducted.
    #[must_use]
    pub fn remaining_lectures(&self, conducted: u32) -> u32 {
        self.planned_lectures.saturating_sub(conducted)
    }

    /// Label of the form `"<class> · <name>"`.
    #[must_use]
    pub fn display_label(&self) -> String {
        format!("{} · {}", self.class_name, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn remaining_lectures_never_negative() {
        let subject = Subject::new(
            SubjectId::new(1),
            "Cyber Security",
            "",
            3,
            date(2024, 1, 1),
            None,
            None,
        )
        .unwrap();
        assert_eq!(subject.remaining_lectures(1), 2);
        assert_eq!(subject.remaining_lectures(5), 0);
        assert_eq!(subject.class_name(), DEFAULT_CLASS_NAME);
    }

    #[test]
    fn rejects_inverted_schedule() {
        let err = Subject::new(
            SubjectId::new(1),
            "Networks",
            "CSE-SEM-2",
            DEFAULT_PLANNED_LECTURES,
            date(2024, 3, 1),
            Some(date(2024, 2, 1)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SubjectError::InvalidDateRange { .. }));
    }

    #[test]
    fn rejects_blank_name() {
        let err = Subject::new(
            SubjectId::new(1),
            "   ",
            "X",
            1,
            date(2024, 1, 1),
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, SubjectError::EmptyName);
    }

    #[test]
    fn display_label_joins_class_and_name() {
        let subject = Subject::new(
            SubjectId::new(1),
            "Compilers",
            "CSE-SEM-5",
            10,
            date(2024, 1, 1),
            None,
            Some(UserId::new(9)),
        )
        .unwrap();
        assert_eq!(subject.display_label(), "CSE-SEM-5 · Compilers");
        assert!(subject.is_taught_by(UserId::new(9)));
        assert!(!subject.is_taught_by(UserId::new(1)));
    }
}
