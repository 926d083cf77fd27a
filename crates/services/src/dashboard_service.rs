use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use storage::repository::SubjectRepository;
use syllabus_core::model::{Subject, SubjectId, UserId};
use syllabus_core::pacing::{PacingAlert, PacingPolicy};
use syllabus_core::progress::ProgressSummary;
use tracing::{debug, warn};

use crate::Clock;
use crate::error::DashboardError;
use crate::progress_service::{ProgressService, Viewer};
use crate::roles::RoleDirectory;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectProgress {
    pub subject: Subject,
    pub progress: ProgressSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherDashboard {
    pub subjects: Vec<SubjectProgress>,
    pub alerts: Vec<PacingAlert>,
}

/// Dashboards for both roles and the pacing nudge.
#[derive(Clone)]
pub struct DashboardService {
    clock: Clock,
    pacing: PacingPolicy,
    subjects: Arc<dyn SubjectRepository>,
    progress: Arc<ProgressService>,
    roles: Arc<dyn RoleDirectory>,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        clock: Clock,
        pacing: PacingPolicy,
        subjects: Arc<dyn SubjectRepository>,
        progress: Arc<ProgressService>,
        roles: Arc<dyn RoleDirectory>,
    ) -> Self {
        Self {
            clock,
            pacing,
            subjects,
            progress,
            roles,
        }
    }

    /// Pacing advisory for a subject, judged against class progress.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::NotFound` if the subject does not exist.
    /// Returns `DashboardError::Storage` if repository access fails.
    pub async fn dashboard_alert(
        &self,
        subject: SubjectId,
        today: NaiveDate,
    ) -> Result<Option<PacingAlert>, DashboardError> {
        let record = self
            .subjects
            .get_subject(subject)
            .await?
            .ok_or(DashboardError::NotFound)?;
        let report = self
            .progress
            .compute_subject_progress(subject, Viewer::Class)
            .await?;
        Ok(self.assess(&record, today, report.percent))
    }

    fn assess(&self, subject: &Subject, today: NaiveDate, percent: f64) -> Option<PacingAlert> {
        let alert = self
            .pacing
            .assess(subject.id(), subject.name(), subject.end_date(), today, percent);
        if let Some(alert) = &alert {
            debug!(
                subject = subject.id().value(),
                left = alert.left_percent,
                weeks = alert.weeks_left,
                "pacing alert"
            );
        }
        alert
    }

    /// Subjects owned by `teacher` with class progress and pacing alerts.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::PermissionDenied` if `teacher` lacks the
    /// teacher role.
    /// Returns `DashboardError::Storage` if repository access fails.
    pub async fn teacher_dashboard(
        &self,
        teacher: UserId,
    ) -> Result<TeacherDashboard, DashboardError> {
        if !self.roles.is_teacher(teacher).await? {
            warn!(user = teacher.value(), "rejected teacher dashboard for non-teacher");
            return Err(DashboardError::PermissionDenied);
        }

        let today = self.clock.today();
        let mut subjects = Vec::new();
        let mut alerts = Vec::new();
        for subject in self.subjects.subjects_for_teacher(teacher).await? {
            let report = self
                .progress
                .compute_subject_progress(subject.id(), Viewer::Class)
                .await?;
            alerts.extend(self.assess(&subject, today, report.percent));
            subjects.push(SubjectProgress {
                subject,
                progress: report.summary(),
            });
        }

        Ok(TeacherDashboard { subjects, alerts })
    }

    /// Every subject ordered by name with the student's own progress.
    ///
    /// # Errors
    ///
    /// Returns `DashboardError::Storage` if repository access fails.
    pub async fn student_dashboard(
        &self,
        student: UserId,
    ) -> Result<Vec<SubjectProgress>, DashboardError> {
        let mut out = Vec::new();
        for subject in self.subjects.list_subjects().await? {
            let report = self
                .progress
                .compute_subject_progress(subject.id(), Viewer::Student(student))
                .await?;
            out.push(SubjectProgress {
                subject,
                progress: report.summary(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use storage::repository::{
        ChapterRepository, InMemoryRepository, NewChapterRecord, NewSubjectRecord, NewTopicRecord,
        NewUserRecord, ProgressRepository, TopicRepository, UserRepository,
    };
    use syllabus_core::model::{ProgressStatus, STUDENT_GROUP, TEACHER_GROUP, TopicProgress};
    use syllabus_core::time::fixed_now;

    use crate::config::FanOutScope;
    use crate::roles::GroupRoles;

    fn today() -> NaiveDate {
        fixed_now().date_naive()
    }

    async fn user(repo: &InMemoryRepository, name: &str, group: &str) -> UserId {
        repo.insert_user(NewUserRecord {
            username: name.into(),
            email: None,
            is_staff: false,
            groups: vec![group.into()],
        })
        .await
        .unwrap()
    }

    async fn subject(
        repo: &InMemoryRepository,
        name: &str,
        class_name: &str,
        end: Option<NaiveDate>,
        teacher: UserId,
    ) -> SubjectId {
        let id = repo
            .insert_subject(NewSubjectRecord {
                name: name.into(),
                class_name: class_name.into(),
                planned_lectures: 24,
                start_date: today() - Duration::days(30),
                end_date: end,
                teacher: Some(teacher),
            })
            .await
            .unwrap();
        let chapter = repo
            .insert_chapter(NewChapterRecord {
                subject_id: id,
                title: "Unit 1".into(),
                order: 1,
            })
            .await
            .unwrap();
        for order in 1..=4 {
            repo.insert_topic(NewTopicRecord {
                chapter_id: chapter,
                title: format!("topic {order}"),
                order,
            })
            .await
            .unwrap();
        }
        id
    }

    fn service(repo: &InMemoryRepository) -> DashboardService {
        let shared = Arc::new(repo.clone());
        let roles: Arc<dyn RoleDirectory> = Arc::new(GroupRoles::new(
            shared.clone(),
            shared.clone(),
            FanOutScope::AllStudents,
        ));
        let progress = Arc::new(ProgressService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            Arc::clone(&roles),
        ));
        DashboardService::new(
            Clock::fixed(fixed_now()),
            PacingPolicy::default(),
            shared,
            progress,
            roles,
        )
    }

    #[tokio::test]
    async fn alert_fires_when_behind_schedule() {
        let repo = InMemoryRepository::new();
        let teacher = user(&repo, "alice", TEACHER_GROUP).await;
        user(&repo, "bob", STUDENT_GROUP).await;
        // 20 days left: two whole weeks, 10% budget
        let id = subject(&repo, "Java", "", Some(today() + Duration::days(20)), teacher).await;

        let alert = service(&repo)
            .dashboard_alert(id, today())
            .await
            .unwrap()
            .expect("alert");
        assert_eq!(alert.weeks_left, 2);
        assert_eq!(
            alert.message(),
            "Java: 100% syllabus left but only ~2 weeks remain."
        );
    }

    #[tokio::test]
    async fn past_end_date_counts_as_one_week() {
        let repo = InMemoryRepository::new();
        let teacher = user(&repo, "alice", TEACHER_GROUP).await;
        let student = user(&repo, "bob", STUDENT_GROUP).await;
        let id = subject(&repo, "Java", "", Some(today() - Duration::days(3)), teacher).await;
        let chapter = repo.chapters_for_subject(id).await.unwrap()[0].id();
        for topic in repo.topics_for_chapter(chapter).await.unwrap() {
            repo.upsert_progress(&TopicProgress::new(
                student,
                topic.id(),
                ProgressStatus::Completed,
                fixed_now(),
            ))
            .await
            .unwrap();
        }

        let end = Some(today() - Duration::days(3));
        assert_eq!(PacingPolicy::default().weeks_left(end, today()), 1);
        assert!(service(&repo).dashboard_alert(id, today()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn teacher_dashboard_lists_owned_subjects_by_class_then_name() {
        let repo = InMemoryRepository::new();
        let teacher = user(&repo, "alice", TEACHER_GROUP).await;
        let other = user(&repo, "oscar", TEACHER_GROUP).await;
        let student = user(&repo, "bob", STUDENT_GROUP).await;
        subject(&repo, "Zoology", "A-1", None, teacher).await;
        subject(&repo, "Algebra", "B-2", None, teacher).await;
        subject(&repo, "Botany", "A-1", None, teacher).await;
        subject(&repo, "Chemistry", "A-1", None, other).await;

        let dashboard = service(&repo).teacher_dashboard(teacher).await.unwrap();
        let names: Vec<&str> = dashboard
            .subjects
            .iter()
            .map(|s| s.subject.name())
            .collect();
        assert_eq!(names, vec!["Botany", "Zoology", "Algebra"]);
        // nothing covered, twelve default weeks: 100 > 60
        assert_eq!(dashboard.alerts.len(), 3);

        let denied = service(&repo).teacher_dashboard(student).await.unwrap_err();
        assert!(matches!(denied, DashboardError::PermissionDenied));
    }

    #[tokio::test]
    async fn student_dashboard_lists_every_subject_by_name() {
        let repo = InMemoryRepository::new();
        let teacher = user(&repo, "alice", TEACHER_GROUP).await;
        let other = user(&repo, "oscar", TEACHER_GROUP).await;
        let student = user(&repo, "bob", STUDENT_GROUP).await;
        subject(&repo, "Zoology", "A-1", None, teacher).await;
        subject(&repo, "Chemistry", "A-1", None, other).await;

        let rows = service(&repo).student_dashboard(student).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|s| s.subject.name()).collect();
        assert_eq!(names, vec!["Chemistry", "Zoology"]);
        assert_eq!(rows[0].progress.remaining_topics, 4);
        assert!(rows[0].progress.progress_percent.abs() < 1e-9);
    }
}
