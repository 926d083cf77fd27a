use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::UserId;

/// Group name granting teacher capability.
pub const TEACHER_GROUP: &str = "Teacher";
/// Group name granting student capability.
pub const STUDENT_GROUP: &str = "Student";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("invalid role: {0}")]
    InvalidRole(String),
}

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

/// Role a user holds in a subject enrollment or at signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Group a user joins when signing up with this role.
    #[must_use]
    pub fn group_name(self) -> &'static str {
        match self {
            Role::Teacher => TEACHER_GROUP,
            Role::Student => STUDENT_GROUP,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(UserError::InvalidRole(other.to_string())),
        }
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// An account with group memberships.
///
/// Capabilities are derived from membership: staff accounts and members of
/// the `Teacher` group may manage the syllabus, members of `Student` track
/// individual progress. Group names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    username: String,
    email: Option<String>,
    is_staff: bool,
    groups: Vec<String>,
}

impl User {
    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyUsername` if the username is blank.
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        email: Option<String>,
        is_staff: bool,
        groups: Vec<String>,
    ) -> Result<Self, UserError> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(UserError::EmptyUsername);
        }
        Ok(Self {
            id,
            username,
            email,
            is_staff,
            groups,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.is_staff
    }

    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    #[must_use]
    pub fn in_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn is_teacher(&self) -> bool {
        self.is_staff || self.in_group(TEACHER_GROUP)
    }

    #[must_use]
    pub fn is_student(&self) -> bool {
        self.in_group(STUDENT_GROUP)
    }

    /// Label shown next to the account name.
    #[must_use]
    pub fn role_label(&self) -> &'static str {
        if self.is_teacher() {
            "Teacher"
        } else if self.is_student() {
            "Student"
        } else {
            "User"
        }
    }
}
