use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use syllabus_core::model::{
    Chapter, ChapterId, Enrollment, LectureSession, LectureSessionId, ProgressStatus, Role,
    Subject, SubjectId, Topic, TopicId, TopicProgress, TopicStatus, User, UserId,
};
use syllabus_core::progress::StatusCounts;
use thiserror::Error;

pub use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint was violated.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── INSERT RECORDS ────────────────────────────────────────────────────────────
//

/// Fields for a user that has not been assigned an ID yet.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub email: Option<String>,
    pub is_staff: bool,
    pub groups: Vec<String>,
}

/// Fields for a subject that has not been assigned an ID yet.
#[derive(Debug, Clone)]
pub struct NewSubjectRecord {
    pub name: String,
    pub class_name: String,
    pub planned_lectures: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub teacher: Option<UserId>,
}

impl NewSubjectRecord {
    /// Build an insert record from a validated subject; its ID is ignored.
    #[must_use]
    pub fn from_subject(subject: &Subject) -> Self {
        Self {
            name: subject.name().to_string(),
            class_name: subject.class_name().to_string(),
            planned_lectures: subject.planned_lectures(),
            start_date: subject.start_date(),
            end_date: subject.end_date(),
            teacher: subject.teacher(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewChapterRecord {
    pub subject_id: SubjectId,
    pub title: String,
    pub order: u32,
}

impl NewChapterRecord {
    #[must_use]
    pub fn from_chapter(chapter: &Chapter) -> Self {
        Self {
            subject_id: chapter.subject_id(),
            title: chapter.title().to_string(),
            order: chapter.order(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTopicRecord {
    pub chapter_id: ChapterId,
    pub title: String,
    pub order: u32,
}

impl NewTopicRecord {
    #[must_use]
    pub fn from_topic(topic: &Topic) -> Self {
        Self {
            chapter_id: topic.chapter_id(),
            title: topic.title().to_string(),
            order: topic.order(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewLectureRecord {
    pub subject_id: SubjectId,
    pub date: NaiveDate,
    pub attendees: u32,
    pub notes: String,
}

impl NewLectureRecord {
    #[must_use]
    pub fn from_session(session: &LectureSession) -> Self {
        Self {
            subject_id: session.subject_id(),
            date: session.date(),
            attendees: session.attendees(),
            notes: session.notes().to_string(),
        }
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user with its initial groups.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username is taken.
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError>;

    /// Fetch a user with its group memberships.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Add a user to a group; adding an existing membership is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn add_to_group(&self, id: UserId, group: &str) -> Result<(), StorageError>;

    /// IDs of every user in the group (case-insensitive), ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn users_in_group(&self, group: &str) -> Result<Vec<UserId>, StorageError>;
}

#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the subject name is taken.
    async fn insert_subject(&self, subject: NewSubjectRecord) -> Result<SubjectId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, StorageError>;

    /// All subjects ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError>;

    /// Subjects owned by a teacher, ordered by class label then name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn subjects_for_teacher(&self, teacher: UserId) -> Result<Vec<Subject>, StorageError>;
}

#[async_trait]
pub trait ChapterRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the subject does not exist.
    async fn insert_chapter(&self, chapter: NewChapterRecord) -> Result<ChapterId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError>;

    /// Persist title and order changes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the chapter does not exist.
    async fn update_chapter(&self, chapter: &Chapter) -> Result<(), StorageError>;

    /// Delete a chapter together with its topics, their class statuses and
    /// student progress rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the chapter does not exist.
    async fn delete_chapter(&self, id: ChapterId) -> Result<(), StorageError>;

    /// Chapters of a subject ordered by `(order, id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn chapters_for_subject(&self, subject: SubjectId) -> Result<Vec<Chapter>, StorageError>;
}

#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the chapter already has a topic
    /// with this title, `StorageError::NotFound` if the chapter is missing.
    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;

    /// Topics of a chapter ordered by `(order, id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn topics_for_chapter(&self, chapter: ChapterId) -> Result<Vec<Topic>, StorageError>;

    /// Number of topics across every chapter of a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_topics_for_subject(&self, subject: SubjectId) -> Result<u64, StorageError>;

    /// Subject a topic belongs to, through its chapter.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn subject_of_topic(&self, topic: TopicId) -> Result<Option<SubjectId>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Status counts of one student's rows for a subject's topics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn student_status_counts(
        &self,
        subject: SubjectId,
        student: UserId,
    ) -> Result<StatusCounts, StorageError>;

    /// Status counts of every student's rows for a subject's topics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn subject_status_counts(&self, subject: SubjectId) -> Result<StatusCounts, StorageError>;

    /// Status counts of the listed students' rows for a subject's topics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn subject_status_counts_for(
        &self,
        subject: SubjectId,
        students: &[UserId],
    ) -> Result<StatusCounts, StorageError>;

    /// A student's status for a topic; `NotStarted` when no row exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn progress_status(
        &self,
        student: UserId,
        topic: TopicId,
    ) -> Result<ProgressStatus, StorageError>;

    /// Insert or replace the `(student, topic)` row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the student or topic is missing.
    async fn upsert_progress(&self, progress: &TopicProgress) -> Result<(), StorageError>;
}

#[async_trait]
pub trait TopicStatusRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_status(&self, topic: TopicId) -> Result<Option<TopicStatus>, StorageError>;

    /// Class statuses recorded for topics of a subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn statuses_for_subject(&self, subject: SubjectId)
    -> Result<Vec<TopicStatus>, StorageError>;
}

/// Atomic write of a class-wide status change and its fan-out.
#[async_trait]
pub trait ClassStatusPersistence: Send + Sync {
    /// Persist `status` once and set every listed student's progress for the
    /// topic to the status implied by the class flag, in one unit of work.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; nothing is persisted then.
    async fn apply_class_status(
        &self,
        status: &TopicStatus,
        students: &[UserId],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait LectureRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the subject does not exist.
    async fn insert_session(
        &self,
        session: NewLectureRecord,
    ) -> Result<LectureSessionId, StorageError>;

    /// Most recent sessions first, by `(date, id)` descending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn recent_sessions(
        &self,
        subject: SubjectId,
        limit: u32,
    ) -> Result<Vec<LectureSession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_sessions(&self, subject: SubjectId) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the exact triple already exists.
    async fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError>;

    /// Users enrolled in a subject with the given role, ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn enrolled_users(
        &self,
        subject: SubjectId,
        role: Role,
    ) -> Result<Vec<UserId>, StorageError>;
}

//
// ─── STORAGE ───────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub subjects: Arc<dyn SubjectRepository>,
    pub chapters: Arc<dyn ChapterRepository>,
    pub topics: Arc<dyn TopicRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub topic_status: Arc<dyn TopicStatusRepository>,
    pub class_status: Arc<dyn ClassStatusPersistence>,
    pub lectures: Arc<dyn LectureRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryRepository::new())
    }

    /// Wire every repository to the same backend.
    pub fn from_backend<R>(repo: R) -> Self
    where
        R: UserRepository
            + SubjectRepository
            + ChapterRepository
            + TopicRepository
            + ProgressRepository
            + TopicStatusRepository
            + ClassStatusPersistence
            + LectureRepository
            + EnrollmentRepository
            + Clone
            + 'static,
    {
        Self {
            users: Arc::new(repo.clone()),
            subjects: Arc::new(repo.clone()),
            chapters: Arc::new(repo.clone()),
            topics: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            topic_status: Arc::new(repo.clone()),
            class_status: Arc::new(repo.clone()),
            lectures: Arc::new(repo.clone()),
            enrollments: Arc::new(repo),
        }
    }
}
