use serde::Serialize;

use crate::model::ids::{SubjectId, UserId};
use crate::model::user::Role;

/// A user's membership in a subject. The full triple is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Enrollment {
    pub user_id: UserId,
    pub subject_id: SubjectId,
    pub role: Role,
}

impl Enrollment {
    #[must_use]
    pub fn new(user_id: UserId, subject_id: SubjectId, role: Role) -> Self {
        Self {
            user_id,
            subject_id,
            role,
        }
    }
}
