use std::sync::Arc;

use serde::Serialize;
use storage::repository::{LectureRepository, NewLectureRecord, SubjectRepository};
use syllabus_core::model::{LectureSession, LectureSessionId, SubjectId, UserId};
use tracing::{info, warn};

use crate::Clock;
use crate::error::LectureServiceError;
use crate::roles::RoleDirectory;

/// Planned versus conducted lectures of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LectureSummary {
    pub subject_id: SubjectId,
    pub planned: u32,
    pub conducted: u64,
    pub remaining: u32,
}

/// Records lecture sessions (attendance and notes).
#[derive(Clone)]
pub struct LectureService {
    clock: Clock,
    subjects: Arc<dyn SubjectRepository>,
    lectures: Arc<dyn LectureRepository>,
    roles: Arc<dyn RoleDirectory>,
}

impl LectureService {
    #[must_use]
    pub fn new(
        clock: Clock,
        subjects: Arc<dyn SubjectRepository>,
        lectures: Arc<dyn LectureRepository>,
        roles: Arc<dyn RoleDirectory>,
    ) -> Self {
        Self {
            clock,
            subjects,
            lectures,
            roles,
        }
    }

    /// Record a session dated today for a subject owned by `actor`.
    ///
    /// # Errors
    ///
    /// Returns `LectureServiceError::PermissionDenied` unless `actor` is a
    /// teacher who owns the subject.
    /// Returns `LectureServiceError::Lecture` if the notes are too long.
    /// Returns `LectureServiceError::NotFound` if the subject does not exist.
    pub async fn add_session(
        &self,
        subject: SubjectId,
        attendees: u32,
        notes: &str,
        actor: UserId,
    ) -> Result<LectureSession, LectureServiceError> {
        if !self.roles.is_teacher(actor).await? {
            warn!(actor = actor.value(), "rejected lecture session from non-teacher");
            return Err(LectureServiceError::PermissionDenied);
        }
        let record = self
            .subjects
            .get_subject(subject)
            .await?
            .ok_or(LectureServiceError::NotFound)?;
        if !record.is_taught_by(actor) {
            warn!(
                subject = subject.value(),
                actor = actor.value(),
                "rejected lecture session from teacher who does not own the subject"
            );
            return Err(LectureServiceError::PermissionDenied);
        }

        let draft = LectureSession::new(
            LectureSessionId::new(1),
            subject,
            self.clock.today(),
            attendees,
            notes,
        )?;
        let id = self
            .lectures
            .insert_session(NewLectureRecord::from_session(&draft))
            .await?;
        info!(subject = subject.value(), session = id.value(), attendees, "recorded lecture session");

        Ok(LectureSession::new(
            id,
            subject,
            draft.date(),
            draft.attendees(),
            draft.notes(),
        )?)
    }

    /// # Errors
    ///
    /// Returns `LectureServiceError::NotFound` if the subject does not exist.
    /// Returns `LectureServiceError::Storage` if repository access fails.
    pub async fn lecture_summary(
        &self,
        subject: SubjectId,
    ) -> Result<LectureSummary, LectureServiceError> {
        let record = self
            .subjects
            .get_subject(subject)
            .await?
            .ok_or(LectureServiceError::NotFound)?;
        let conducted = self.lectures.count_sessions(subject).await?;

        Ok(LectureSummary {
            subject_id: subject,
            planned: record.planned_lectures(),
            conducted,
            remaining: record.remaining_lectures(u32::try_from(conducted).unwrap_or(u32::MAX)),
        })
    }
}
