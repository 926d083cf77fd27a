use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use storage::repository::{
    ChapterRepository, EnrollmentRepository, LectureRepository, NewChapterRecord, NewTopicRecord,
    StorageError, SubjectRepository, TopicRepository, TopicStatusRepository,
};
use syllabus_core::model::{
    Chapter, ChapterId, Enrollment, LectureSession, Role, Subject, SubjectId, Topic, TopicId,
    TopicStatus, UserId,
};
use tracing::{info, warn};

use crate::error::SyllabusError;
use crate::roles::RoleDirectory;

const RECENT_SESSIONS: u32 = 10;

/// A topic with its class completion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicRow {
    pub topic_id: TopicId,
    pub title: String,
    pub order: u32,
    pub completed: bool,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterOutline {
    pub chapter_id: ChapterId,
    pub title: String,
    pub order: u32,
    pub topics: Vec<TopicRow>,
}

/// Chapter tree of a subject, as printed in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectReport {
    pub subject: Subject,
    pub chapters: Vec<ChapterOutline>,
}

/// Report plus lecture bookkeeping, as shown on the subject page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectDetail {
    #[serde(flatten)]
    pub report: SubjectReport,
    pub conducted_lectures: u64,
    pub remaining_lectures: u32,
    pub recent_sessions: Vec<LectureSession>,
    pub viewer_is_teacher: bool,
}

/// Teacher-facing chapter and topic management plus subject read models.
#[derive(Clone)]
pub struct SyllabusService {
    subjects: Arc<dyn SubjectRepository>,
    chapters: Arc<dyn ChapterRepository>,
    topics: Arc<dyn TopicRepository>,
    statuses: Arc<dyn TopicStatusRepository>,
    lectures: Arc<dyn LectureRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    roles: Arc<dyn RoleDirectory>,
}

impl SyllabusService {
    #[must_use]
    pub fn new(
        subjects: Arc<dyn SubjectRepository>,
        chapters: Arc<dyn ChapterRepository>,
        topics: Arc<dyn TopicRepository>,
        statuses: Arc<dyn TopicStatusRepository>,
        lectures: Arc<dyn LectureRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        roles: Arc<dyn RoleDirectory>,
    ) -> Self {
        Self {
            subjects,
            chapters,
            topics,
            statuses,
            lectures,
            enrollments,
            roles,
        }
    }

    async fn require_teacher(&self, actor: UserId) -> Result<(), SyllabusError> {
        if self.roles.is_teacher(actor).await? {
            Ok(())
        } else {
            warn!(actor = actor.value(), "rejected syllabus change from non-teacher");
            Err(SyllabusError::PermissionDenied)
        }
    }

    async fn load_subject(&self, subject: SubjectId) -> Result<Subject, SyllabusError> {
        self.subjects
            .get_subject(subject)
            .await?
            .ok_or(SyllabusError::NotFound)
    }

    async fn load_chapter(&self, chapter: ChapterId) -> Result<Chapter, SyllabusError> {
        self.chapters
            .get_chapter(chapter)
            .await?
            .ok_or(SyllabusError::NotFound)
    }

    /// Append a chapter to a subject owned by `actor`.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError::PermissionDenied` unless `actor` is a teacher
    /// who owns the subject.
    /// Returns `SyllabusError::InvalidInput` if the title is blank.
    /// Returns `SyllabusError::NotFound` if the subject does not exist.
    pub async fn add_chapter(
        &self,
        subject: SubjectId,
        title: &str,
        actor: UserId,
    ) -> Result<Chapter, SyllabusError> {
        self.require_teacher(actor).await?;
        let owned = self.load_subject(subject).await?;
        if !owned.is_taught_by(actor) {
            warn!(
                subject = subject.value(),
                actor = actor.value(),
                "rejected chapter from teacher who does not own the subject"
            );
            return Err(SyllabusError::PermissionDenied);
        }
        if title.trim().is_empty() {
            return Err(SyllabusError::InvalidInput("title is required"));
        }

        let existing = self.chapters.chapters_for_subject(subject).await?;
        let order = next_order(existing.len());
        let draft = Chapter::new(ChapterId::new(1), subject, title, order)?;
        let id = self
            .chapters
            .insert_chapter(NewChapterRecord::from_chapter(&draft))
            .await?;
        info!(subject = subject.value(), chapter = id.value(), order, "added chapter");

        Ok(Chapter::new(id, subject, draft.title(), order)?)
    }

    /// Rename a chapter.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError::PermissionDenied` unless `actor` is a teacher.
    /// Returns `SyllabusError::InvalidInput` if the title is blank.
    /// Returns `SyllabusError::NotFound` if the chapter does not exist.
    pub async fn edit_chapter(
        &self,
        chapter: ChapterId,
        title: &str,
        actor: UserId,
    ) -> Result<Chapter, SyllabusError> {
        self.require_teacher(actor).await?;
        let mut current = self.load_chapter(chapter).await?;
        if title.trim().is_empty() {
            return Err(SyllabusError::InvalidInput("title is required"));
        }

        current.rename(title)?;
        self.chapters.update_chapter(&current).await?;
        info!(chapter = chapter.value(), "renamed chapter");
        Ok(current)
    }

    /// Delete a chapter together with its topics and their progress.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError::PermissionDenied` unless `actor` is a teacher.
    /// Returns `SyllabusError::NotFound` if the chapter does not exist.
    pub async fn delete_chapter(&self, chapter: ChapterId, actor: UserId) -> Result<(), SyllabusError> {
        self.require_teacher(actor).await?;
        match self.chapters.delete_chapter(chapter).await {
            Ok(()) => {
                info!(chapter = chapter.value(), "deleted chapter");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(SyllabusError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a topic to a chapter.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError::PermissionDenied` unless `actor` is a teacher.
    /// Returns `SyllabusError::InvalidInput` if the title is blank.
    /// Returns `SyllabusError::DuplicateTopic` if the chapter already has a
    /// topic with this title.
    /// Returns `SyllabusError::NotFound` if the chapter does not exist.
    pub async fn add_topic(
        &self,
        chapter: ChapterId,
        title: &str,
        actor: UserId,
    ) -> Result<Topic, SyllabusError> {
        self.require_teacher(actor).await?;
        self.load_chapter(chapter).await?;
        if title.trim().is_empty() {
            return Err(SyllabusError::InvalidInput("title is required"));
        }

        let existing = self.topics.topics_for_chapter(chapter).await?;
        let order = next_order(existing.len());
        let draft = Topic::new(TopicId::new(1), chapter, title, order)?;
        let id = match self
            .topics
            .insert_topic(NewTopicRecord::from_topic(&draft))
            .await
        {
            Ok(id) => id,
            Err(StorageError::Conflict) => {
                return Err(SyllabusError::DuplicateTopic {
                    title: draft.title().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        info!(chapter = chapter.value(), topic = id.value(), order, "added topic");

        Ok(Topic::new(id, chapter, draft.title(), order)?)
    }

    /// Full subject page for `viewer`.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError::PermissionDenied` if `viewer` is a teacher who
    /// does not own the subject.
    /// Returns `SyllabusError::NotFound` if the subject does not exist.
    pub async fn subject_detail(
        &self,
        subject: SubjectId,
        viewer: UserId,
    ) -> Result<SubjectDetail, SyllabusError> {
        let record = self.load_subject(subject).await?;
        let viewer_is_teacher = self.roles.is_teacher(viewer).await?;
        if viewer_is_teacher && !record.is_taught_by(viewer) {
            warn!(
                subject = subject.value(),
                viewer = viewer.value(),
                "rejected subject detail for teacher who does not own it"
            );
            return Err(SyllabusError::PermissionDenied);
        }

        let conducted = self.lectures.count_sessions(subject).await?;
        let remaining = record.remaining_lectures(u32::try_from(conducted).unwrap_or(u32::MAX));
        let recent_sessions = self.lectures.recent_sessions(subject, RECENT_SESSIONS).await?;
        let report = self.build_report(record).await?;

        Ok(SubjectDetail {
            report,
            conducted_lectures: conducted,
            remaining_lectures: remaining,
            recent_sessions,
            viewer_is_teacher,
        })
    }

    /// Printable chapter tree; readable by anyone.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError::NotFound` if the subject does not exist.
    pub async fn subject_report(&self, subject: SubjectId) -> Result<SubjectReport, SyllabusError> {
        let record = self.load_subject(subject).await?;
        self.build_report(record).await
    }

    /// Record an enrollment on behalf of a teacher.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError::PermissionDenied` if `actor` is not a teacher.
    /// Returns `SyllabusError::AlreadyEnrolled` for a duplicate triple.
    /// Returns `SyllabusError::NotFound` if the user or subject is missing.
    pub async fn enroll(
        &self,
        user: UserId,
        subject: SubjectId,
        role: Role,
        actor: UserId,
    ) -> Result<(), SyllabusError> {
        self.require_teacher(actor).await?;
        match self
            .enrollments
            .enroll(Enrollment::new(user, subject, role))
            .await
        {
            Ok(()) => {
                info!(
                    user = user.value(),
                    subject = subject.value(),
                    %role,
                    actor = actor.value(),
                    "enrolled"
                );
                Ok(())
            }
            Err(StorageError::Conflict) => Err(SyllabusError::AlreadyEnrolled),
            Err(StorageError::NotFound) => Err(SyllabusError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn build_report(&self, subject: Subject) -> Result<SubjectReport, SyllabusError> {
        let statuses: HashMap<TopicId, TopicStatus> = self
            .statuses
            .statuses_for_subject(subject.id())
            .await?
            .into_iter()
            .map(|s| (s.topic_id(), s))
            .collect();

        let mut names: HashMap<UserId, Option<String>> = HashMap::new();
        let mut chapters = Vec::new();
        for chapter in self.chapters.chapters_for_subject(subject.id()).await? {
            let mut topics = Vec::new();
            for topic in self.topics.topics_for_chapter(chapter.id()).await? {
                let status = statuses.get(&topic.id());
                let updated_by = match status.and_then(TopicStatus::updated_by) {
                    Some(user) => self.username(&mut names, user).await?,
                    None => None,
                };
                topics.push(TopicRow {
                    topic_id: topic.id(),
                    title: topic.title().to_string(),
                    order: topic.order(),
                    completed: status.is_some_and(TopicStatus::completed),
                    updated_by,
                });
            }
            chapters.push(ChapterOutline {
                chapter_id: chapter.id(),
                title: chapter.title().to_string(),
                order: chapter.order(),
                topics,
            });
        }

        Ok(SubjectReport { subject, chapters })
    }

    async fn username(
        &self,
        cache: &mut HashMap<UserId, Option<String>>,
        user: UserId,
    ) -> Result<Option<String>, SyllabusError> {
        if let Some(name) = cache.get(&user) {
            return Ok(name.clone());
        }
        let name = self
            .roles
            .find_user(user)
            .await?
            .map(|u| u.username().to_string());
        cache.insert(user, name.clone());
        Ok(name)
    }
}

fn next_order(existing: usize) -> u32 {
    u32::try_from(existing).unwrap_or(u32::MAX).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::{
        ClassStatusPersistence, InMemoryRepository, NewLectureRecord, NewSubjectRecord,
        NewUserRecord, ProgressRepository, UserRepository,
    };
    use syllabus_core::model::{ProgressStatus, STUDENT_GROUP, TEACHER_GROUP, TopicProgress};
    use syllabus_core::time::fixed_now;

    use crate::config::FanOutScope;
    use crate::roles::GroupRoles;

    struct Fixture {
        repo: InMemoryRepository,
        service: SyllabusService,
        owner: UserId,
        other_teacher: UserId,
        student: UserId,
        subject: SubjectId,
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

    async fn fixture() -> Fixture {
        let repo = InMemoryRepository::new();
        let owner = user(&repo, "alice", TEACHER_GROUP).await;
        let other_teacher = user(&repo, "oscar", TEACHER_GROUP).await;
        let student = user(&repo, "bob", STUDENT_GROUP).await;
        let subject = repo
            .insert_subject(NewSubjectRecord {
                name: "Operating Systems".into(),
                class_name: String::new(),
                planned_lectures: 12,
                start_date: fixed_now().date_naive(),
                end_date: None,
                teacher: Some(owner),
            })
            .await
            .unwrap();

        let shared = Arc::new(repo.clone());
        let roles = Arc::new(GroupRoles::new(
            shared.clone(),
            shared.clone(),
            FanOutScope::AllStudents,
        ));
        let service = SyllabusService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared,
            roles,
        );
        Fixture {
            repo,
            service,
            owner,
            other_teacher,
            student,
            subject,
        }
    }

    #[tokio::test]
    async fn chapters_and_topics_are_appended_in_order() {
        let f = fixture().await;
        let first = f
            .service
            .add_chapter(f.subject, "Processes", f.owner)
            .await
            .unwrap();
        let second = f
            .service
            .add_chapter(f.subject, "Memory", f.owner)
            .await
            .unwrap();
        assert_eq!(first.order(), 1);
        assert_eq!(second.order(), 2);

        let a = f.service.add_topic(first.id(), "Scheduling", f.owner).await.unwrap();
        let b = f.service.add_topic(first.id(), "Signals", f.owner).await.unwrap();
        assert_eq!((a.order(), b.order()), (1, 2));

        let dup = f
            .service
            .add_topic(first.id(), "Scheduling", f.owner)
            .await
            .unwrap_err();
        assert!(matches!(dup, SyllabusError::DuplicateTopic { .. }));

        let report = f.service.subject_report(f.subject).await.unwrap();
        let titles: Vec<&str> = report.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Processes", "Memory"]);
        assert_eq!(report.chapters[0].topics.len(), 2);
        assert!(report.chapters[1].topics.is_empty());
    }

    #[tokio::test]
    async fn chapter_changes_require_teacher_and_title() {
        let f = fixture().await;

        let denied = f
            .service
            .add_chapter(f.subject, "Files", f.student)
            .await
            .unwrap_err();
        assert!(matches!(denied, SyllabusError::PermissionDenied));

        let not_owner = f
            .service
            .add_chapter(f.subject, "Files", f.other_teacher)
            .await
            .unwrap_err();
        assert!(matches!(not_owner, SyllabusError::PermissionDenied));

        let blank = f
            .service
            .add_chapter(f.subject, "   ", f.owner)
            .await
            .unwrap_err();
        assert!(matches!(blank, SyllabusError::InvalidInput(_)));

        let chapter = f
            .service
            .add_chapter(f.subject, "Files", f.owner)
            .await
            .unwrap();
        let renamed = f
            .service
            .edit_chapter(chapter.id(), "File systems", f.owner)
            .await
            .unwrap();
        assert_eq!(renamed.title(), "File systems");

        let blank = f
            .service
            .edit_chapter(chapter.id(), "", f.owner)
            .await
            .unwrap_err();
        assert!(matches!(blank, SyllabusError::InvalidInput(_)));

        let missing = f
            .service
            .add_topic(ChapterId::new(404), "Inodes", f.owner)
            .await
            .unwrap_err();
        assert!(matches!(missing, SyllabusError::NotFound));
    }

    #[tokio::test]
    async fn delete_chapter_removes_topics_and_progress() {
        let f = fixture().await;
        let chapter = f
            .service
            .add_chapter(f.subject, "Processes", f.owner)
            .await
            .unwrap();
        let topic = f
            .service
            .add_topic(chapter.id(), "Threads", f.owner)
            .await
            .unwrap();
        f.repo
            .upsert_progress(&TopicProgress::new(
                f.student,
                topic.id(),
                ProgressStatus::Completed,
                fixed_now(),
            ))
            .await
            .unwrap();

        f.service.delete_chapter(chapter.id(), f.owner).await.unwrap();

        assert_eq!(f.repo.count_topics_for_subject(f.subject).await.unwrap(), 0);
        assert_eq!(
            f.repo.subject_status_counts(f.subject).await.unwrap().recorded(),
            0
        );
        let again = f
            .service
            .delete_chapter(chapter.id(), f.owner)
            .await
            .unwrap_err();
        assert!(matches!(again, SyllabusError::NotFound));
    }

    #[tokio::test]
    async fn detail_shows_status_sessions_and_guards_other_teachers() {
        let f = fixture().await;
        let chapter = f
            .service
            .add_chapter(f.subject, "Processes", f.owner)
            .await
            .unwrap();
        let topic = f
            .service
            .add_topic(chapter.id(), "Threads", f.owner)
            .await
            .unwrap();
        let mut status = TopicStatus::pending(topic.id(), fixed_now());
        status.toggle(f.owner, fixed_now());
        f.repo
            .apply_class_status(&status, &[f.student], fixed_now())
            .await
            .unwrap();
        for day in 0..12 {
            f.repo
                .insert_session(NewLectureRecord {
                    subject_id: f.subject,
                    date: fixed_now().date_naive() + chrono::Duration::days(day),
                    attendees: 10,
                    notes: String::new(),
                })
                .await
                .unwrap();
        }

        let detail = f
            .service
            .subject_detail(f.subject, f.student)
            .await
            .unwrap();
        assert!(!detail.viewer_is_teacher);
        assert_eq!(detail.conducted_lectures, 12);
        assert_eq!(detail.remaining_lectures, 0);
        assert_eq!(detail.recent_sessions.len(), 10);
        let row = &detail.report.chapters[0].topics[0];
        assert!(row.completed);
        assert_eq!(row.updated_by.as_deref(), Some("alice"));

        let owner_view = f.service.subject_detail(f.subject, f.owner).await.unwrap();
        assert!(owner_view.viewer_is_teacher);

        let denied = f
            .service
            .subject_detail(f.subject, f.other_teacher)
            .await
            .unwrap_err();
        assert!(matches!(denied, SyllabusError::PermissionDenied));

        // the printable report has no owner check
        let report = f.service.subject_report(f.subject).await.unwrap();
        assert_eq!(report.chapters.len(), 1);
    }

    #[tokio::test]
    async fn enrolling_twice_is_rejected() {
        let f = fixture().await;
        f.service
            .enroll(f.student, f.subject, Role::Student, f.owner)
            .await
            .unwrap();
        let dup = f
            .service
            .enroll(f.student, f.subject, Role::Student, f.other_teacher)
            .await
            .unwrap_err();
        assert!(matches!(dup, SyllabusError::AlreadyEnrolled));
        f.service
            .enroll(f.student, f.subject, Role::Teacher, f.owner)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn students_cannot_enroll_anyone() {
        let f = fixture().await;
        let denied = f
            .service
            .enroll(f.student, f.subject, Role::Teacher, f.student)
            .await
            .unwrap_err();
        assert!(matches!(denied, SyllabusError::PermissionDenied));
        assert!(
            f.repo
                .enrolled_users(f.subject, Role::Teacher)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
