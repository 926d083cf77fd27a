use std::sync::Arc;

use storage::repository::{ProgressRepository, SubjectRepository, TopicRepository};
use syllabus_core::model::{SubjectId, UserId};
use syllabus_core::progress::{self, ProgressReport};
use tracing::debug;

use crate::config::FanOutScope;
use crate::error::ProgressServiceError;
use crate::roles::RoleDirectory;

/// Whose progress is being aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// One student's own rows.
    Student(UserId),
    /// Student rows averaged over the class; under the enrolled scope only
    /// the subject's enrolled students count.
    Class,
}

/// Read-only aggregation of topic progress for a subject.
#[derive(Clone)]
pub struct ProgressService {
    subjects: Arc<dyn SubjectRepository>,
    topics: Arc<dyn TopicRepository>,
    progress: Arc<dyn ProgressRepository>,
    roles: Arc<dyn RoleDirectory>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        subjects: Arc<dyn SubjectRepository>,
        topics: Arc<dyn TopicRepository>,
        progress: Arc<dyn ProgressRepository>,
        roles: Arc<dyn RoleDirectory>,
    ) -> Self {
        Self {
            subjects,
            topics,
            progress,
            roles,
        }
    }

    /// Completion report for a subject as seen by `viewer`.
    ///
    /// A subject without topics, or a class view without students, yields a
    /// zero report rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the subject does not exist.
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn compute_subject_progress(
        &self,
        subject: SubjectId,
        viewer: Viewer,
    ) -> Result<ProgressReport, ProgressServiceError> {
        if self.subjects.get_subject(subject).await?.is_none() {
            return Err(ProgressServiceError::NotFound);
        }

        let total = self.topics.count_topics_for_subject(subject).await?;
        if total == 0 {
            return Ok(ProgressReport::zero(0));
        }

        let report = match viewer {
            Viewer::Student(student) => {
                let counts = self.progress.student_status_counts(subject, student).await?;
                progress::student_progress(total, counts)
            }
            Viewer::Class => {
                let students = self.roles.students_for(subject).await?;
                let counts = match self.roles.fan_out_scope() {
                    FanOutScope::AllStudents => self.progress.subject_status_counts(subject).await?,
                    FanOutScope::Enrolled => {
                        self.progress
                            .subject_status_counts_for(subject, &students)
                            .await?
                    }
                };
                progress::class_progress(total, counts, students.len() as u64)
            }
        };

        debug!(
            subject = subject.value(),
            ?viewer,
            total,
            percent = report.percent,
            "computed subject progress"
        );
        Ok(report)
    }

    /// Students see their own progress; everyone else sees the class.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` if the subject does not exist.
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn progress_for_user(
        &self,
        subject: SubjectId,
        user: UserId,
    ) -> Result<ProgressReport, ProgressServiceError> {
        let viewer = if self.roles.is_student(user).await? {
            Viewer::Student(user)
        } else {
            Viewer::Class
        };
        self.compute_subject_progress(subject, viewer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::{
        ChapterRepository, EnrollmentRepository, InMemoryRepository, NewChapterRecord,
        NewSubjectRecord, NewTopicRecord, NewUserRecord, UserRepository,
    };
    use syllabus_core::model::{
        Enrollment, ProgressStatus, Role, STUDENT_GROUP, TopicId, TopicProgress,
    };
    use syllabus_core::time::fixed_now;

    use crate::roles::GroupRoles;

    struct Fixture {
        repo: InMemoryRepository,
        service: ProgressService,
        subject: SubjectId,
        topics: Vec<TopicId>,
    }

    async fn fixture(topic_count: usize) -> Fixture {
        scoped_fixture(topic_count, FanOutScope::AllStudents).await
    }

    async fn scoped_fixture(topic_count: usize, scope: FanOutScope) -> Fixture {
        let repo = InMemoryRepository::new();
        let subject = repo
            .insert_subject(NewSubjectRecord {
                name: "Networks".into(),
                class_name: String::new(),
                planned_lectures: 24,
                start_date: fixed_now().date_naive(),
                end_date: None,
                teacher: None,
            })
            .await
            .unwrap();
        let mut topics = Vec::new();
        if topic_count > 0 {
            let chapter = repo
                .insert_chapter(NewChapterRecord {
                    subject_id: subject,
                    title: "Layers".into(),
                    order: 1,
                })
                .await
                .unwrap();
            for i in 0..topic_count {
                let order = u32::try_from(i).unwrap() + 1;
                let id = repo
                    .insert_topic(NewTopicRecord {
                        chapter_id: chapter,
                        title: format!("topic {order}"),
                        order,
                    })
                    .await
                    .unwrap();
                topics.push(id);
            }
        }

        let shared = Arc::new(repo.clone());
        let roles = Arc::new(GroupRoles::new(
            shared.clone(),
            shared.clone(),
            scope,
        ));
        let service = ProgressService::new(shared.clone(), shared.clone(), shared, roles);
        Fixture {
            repo,
            service,
            subject,
            topics,
        }
    }

    async fn student(repo: &InMemoryRepository, name: &str) -> UserId {
        repo.insert_user(NewUserRecord {
            username: name.into(),
            email: None,
            is_staff: false,
            groups: vec![STUDENT_GROUP.into()],
        })
        .await
        .unwrap()
    }

    async fn record(repo: &InMemoryRepository, who: UserId, topic: TopicId, status: ProgressStatus) {
        repo.upsert_progress(&TopicProgress::new(who, topic, status, fixed_now()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn student_view_attributes_missing_rows_to_not_started() {
        let f = fixture(8).await;
        let s = student(&f.repo, "bob").await;
        for topic in &f.topics[..4] {
            record(&f.repo, s, *topic, ProgressStatus::Completed).await;
        }
        record(&f.repo, s, f.topics[4], ProgressStatus::InProgress).await;
        record(&f.repo, s, f.topics[5], ProgressStatus::InProgress).await;

        let report = f
            .service
            .compute_subject_progress(f.subject, Viewer::Student(s))
            .await
            .unwrap();
        let summary = report.summary();
        assert!((summary.progress_percent - 62.5).abs() < 1e-9);
        assert_eq!(summary.completed_topics, 4);
        assert_eq!(summary.in_progress_topics, 2);
        assert_eq!(summary.remaining_topics, 2);
    }

    #[tokio::test]
    async fn class_view_averages_over_students() {
        let f = fixture(4).await;
        let a = student(&f.repo, "a").await;
        let b = student(&f.repo, "b").await;
        student(&f.repo, "c").await;

        for topic in &f.topics[..3] {
            record(&f.repo, a, *topic, ProgressStatus::Completed).await;
        }
        record(&f.repo, b, f.topics[0], ProgressStatus::Completed).await;
        record(&f.repo, b, f.topics[1], ProgressStatus::InProgress).await;

        let report = f
            .service
            .compute_subject_progress(f.subject, Viewer::Class)
            .await
            .unwrap();
        assert!((report.percent - 37.5).abs() < 1e-9);
        assert!((report.completed - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.summary().completed_topics, 1);
    }

    #[tokio::test]
    async fn enrolled_class_view_ignores_rows_of_unenrolled_students() {
        let f = scoped_fixture(2, FanOutScope::Enrolled).await;
        let a = student(&f.repo, "a").await;
        let b = student(&f.repo, "b").await;
        f.repo
            .enroll(Enrollment::new(a, f.subject, Role::Student))
            .await
            .unwrap();
        // rows left behind by an earlier school-wide toggle
        record(&f.repo, a, f.topics[0], ProgressStatus::Completed).await;
        record(&f.repo, b, f.topics[0], ProgressStatus::Completed).await;

        let class = f
            .service
            .compute_subject_progress(f.subject, Viewer::Class)
            .await
            .unwrap();
        let own = f
            .service
            .compute_subject_progress(f.subject, Viewer::Student(a))
            .await
            .unwrap();
        assert!((class.percent - 50.0).abs() < 1e-9);
        assert!((class.completed - 1.0).abs() < 1e-9);
        assert!((class.percent - own.percent).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zero_topics_yields_zero_report() {
        let f = fixture(0).await;
        let s = student(&f.repo, "bob").await;

        for viewer in [Viewer::Student(s), Viewer::Class] {
            let report = f
                .service
                .compute_subject_progress(f.subject, viewer)
                .await
                .unwrap();
            assert!(report.is_zero());
            assert_eq!(report.total_topics, 0);
        }
    }

    #[tokio::test]
    async fn class_view_without_students_is_zero() {
        let f = fixture(3).await;
        let report = f
            .service
            .compute_subject_progress(f.subject, Viewer::Class)
            .await
            .unwrap();
        assert!(report.is_zero());
        assert_eq!(report.total_topics, 3);
    }

    #[tokio::test]
    async fn unknown_subject_is_not_found() {
        let f = fixture(1).await;
        let err = f
            .service
            .compute_subject_progress(SubjectId::new(999), Viewer::Class)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::NotFound));
    }

    #[tokio::test]
    async fn progress_for_user_picks_view_by_role() {
        let f = fixture(2).await;
        let s = student(&f.repo, "bob").await;
        let other = student(&f.repo, "carol").await;
        record(&f.repo, s, f.topics[0], ProgressStatus::Completed).await;
        record(&f.repo, s, f.topics[1], ProgressStatus::Completed).await;
        let outsider = f
            .repo
            .insert_user(NewUserRecord {
                username: "visitor".into(),
                email: None,
                is_staff: false,
                groups: Vec::new(),
            })
            .await
            .unwrap();

        let own = f.service.progress_for_user(f.subject, s).await.unwrap();
        assert!((own.percent - 100.0).abs() < 1e-9);

        let peer = f.service.progress_for_user(f.subject, other).await.unwrap();
        assert!(peer.percent.abs() < 1e-9);
        assert!((peer.remaining - 2.0).abs() < 1e-9);

        let class = f.service.progress_for_user(f.subject, outsider).await.unwrap();
        assert!((class.percent - 50.0).abs() < 1e-9);
    }
}
