use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::repository::{ClassStatusPersistence, TopicRepository, TopicStatusRepository};
use syllabus_core::model::{TopicId, TopicStatus, UserId};
use tracing::{info, warn};

use crate::Clock;
use crate::error::TopicStatusError;
use crate::roles::RoleDirectory;

/// Class-wide state of a topic after a toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicState {
    pub topic_id: TopicId,
    pub title: String,
    pub completed: bool,
    /// Username of the teacher who last changed the status.
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Number of students whose progress row was written.
    pub students_updated: usize,
}

/// Flips the class completion flag of a topic and propagates it to students.
#[derive(Clone)]
pub struct TopicStatusService {
    clock: Clock,
    topics: Arc<dyn TopicRepository>,
    statuses: Arc<dyn TopicStatusRepository>,
    writer: Arc<dyn ClassStatusPersistence>,
    roles: Arc<dyn RoleDirectory>,
}

impl TopicStatusService {
    #[must_use]
    pub fn new(
        clock: Clock,
        topics: Arc<dyn TopicRepository>,
        statuses: Arc<dyn TopicStatusRepository>,
        writer: Arc<dyn ClassStatusPersistence>,
        roles: Arc<dyn RoleDirectory>,
    ) -> Self {
        Self {
            clock,
            topics,
            statuses,
            writer,
            roles,
        }
    }

    /// Toggle the class status of `topic` on behalf of `actor`.
    ///
    /// Every student reached by the role directory gets a progress row of
    /// `completed` when the flag turns on and `in_progress` when it turns off.
    /// The status and the fan-out are written together. Concurrent toggles of
    /// the same topic are last-write-wins.
    ///
    /// # Errors
    ///
    /// Returns `TopicStatusError::PermissionDenied` if `actor` is not a
    /// teacher; nothing is written in that case.
    /// Returns `TopicStatusError::NotFound` if the topic does not exist.
    /// Returns `TopicStatusError::Storage` if repository access fails.
    pub async fn toggle_class_topic_status(
        &self,
        topic_id: TopicId,
        actor: UserId,
    ) -> Result<TopicState, TopicStatusError> {
        let user = self.roles.find_user(actor).await?;
        let Some(user) = user.filter(|u| u.is_teacher()) else {
            warn!(
                topic = topic_id.value(),
                actor = actor.value(),
                "rejected class status toggle from non-teacher"
            );
            return Err(TopicStatusError::PermissionDenied);
        };

        let topic = self
            .topics
            .get_topic(topic_id)
            .await?
            .ok_or(TopicStatusError::NotFound)?;
        let subject = self
            .topics
            .subject_of_topic(topic_id)
            .await?
            .ok_or(TopicStatusError::NotFound)?;

        let now = self.clock.now();
        let mut status = self
            .statuses
            .get_status(topic_id)
            .await?
            .unwrap_or_else(|| TopicStatus::pending(topic_id, now));
        let completed = status.toggle(actor, now);

        let students = self.roles.students_for(subject).await?;
        self.writer
            .apply_class_status(&status, &students, now)
            .await?;

        info!(
            topic = topic_id.value(),
            subject = subject.value(),
            actor = actor.value(),
            completed,
            students = students.len(),
            "toggled class topic status"
        );

        Ok(TopicState {
            topic_id,
            title: topic.title().to_string(),
            completed,
            updated_by: Some(user.username().to_string()),
            updated_at: status.updated_at(),
            students_updated: students.len(),
        })
    }
}
