use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use syllabus_core::model::{
    Chapter, ChapterId, Enrollment, LectureSession, LectureSessionId, ProgressStatus, Role,
    Subject, SubjectId, Topic, TopicId, TopicProgress, TopicStatus, User, UserId,
};
use syllabus_core::progress::StatusCounts;

use crate::repository::{
    ChapterRepository, ClassStatusPersistence, EnrollmentRepository, LectureRepository,
    NewChapterRecord, NewLectureRecord, NewSubjectRecord, NewTopicRecord, NewUserRecord,
    ProgressRepository, StorageError, SubjectRepository, TopicRepository, TopicStatusRepository,
    UserRepository,
};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    users: BTreeMap<UserId, User>,
    subjects: BTreeMap<SubjectId, Subject>,
    chapters: BTreeMap<ChapterId, Chapter>,
    topics: BTreeMap<TopicId, Topic>,
    statuses: HashMap<TopicId, TopicStatus>,
    progress: HashMap<(UserId, TopicId), TopicProgress>,
    sessions: BTreeMap<LectureSessionId, LectureSession>,
    enrollments: BTreeSet<(UserId, SubjectId, &'static str)>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn topic_ids_for_subject(&self, subject: SubjectId) -> BTreeSet<TopicId> {
        self.topics
            .values()
            .filter(|t| {
                self.chapters
                    .get(&t.chapter_id())
                    .is_some_and(|c| c.subject_id() == subject)
            })
            .map(Topic::id)
            .collect()
    }

    fn upsert_progress(&mut self, progress: TopicProgress) -> Result<(), StorageError> {
        if !self.users.contains_key(&progress.student_id)
            || !self.topics.contains_key(&progress.topic_id)
        {
            return Err(StorageError::NotFound);
        }
        self.progress
            .insert((progress.student_id, progress.topic_id), progress);
        Ok(())
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Enforces the same uniqueness and cascade rules as the `SQLite` schema.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut guard = self.lock()?;
        if guard
            .users
            .values()
            .any(|u| u.username() == user.username.trim())
        {
            return Err(StorageError::Conflict);
        }
        let id = UserId::new(guard.allocate_id());
        let created = User::new(id, user.username, user.email, user.is_staff, user.groups)
            .map_err(ser)?;
        guard.users.insert(id, created);
        Ok(id)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn add_to_group(&self, id: UserId, group: &str) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let user = guard.users.get(&id).ok_or(StorageError::NotFound)?;
        if user.in_group(group) {
            return Ok(());
        }
        let mut groups = user.groups().to_vec();
        groups.push(group.to_string());
        let updated = User::new(
            id,
            user.username(),
            user.email().map(str::to_owned),
            user.is_staff(),
            groups,
        )
        .map_err(ser)?;
        guard.users.insert(id, updated);
        Ok(())
    }

    async fn users_in_group(&self, group: &str) -> Result<Vec<UserId>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.in_group(group))
            .map(User::id)
            .collect())
    }
}

#[async_trait]
impl SubjectRepository for InMemoryRepository {
    async fn insert_subject(&self, subject: NewSubjectRecord) -> Result<SubjectId, StorageError> {
        let mut guard = self.lock()?;
        if guard.subjects.values().any(|s| s.name() == subject.name) {
            return Err(StorageError::Conflict);
        }
        if let Some(teacher) = subject.teacher {
            if !guard.users.contains_key(&teacher) {
                return Err(StorageError::NotFound);
            }
        }
        let id = SubjectId::new(guard.allocate_id());
        let created = Subject::new(
            id,
            subject.name,
            subject.class_name,
            subject.planned_lectures,
            subject.start_date,
            subject.end_date,
            subject.teacher,
        )
        .map_err(ser)?;
        guard.subjects.insert(id, created);
        Ok(id)
    }

    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, StorageError> {
        Ok(self.lock()?.subjects.get(&id).cloned())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let mut subjects: Vec<Subject> = self.lock()?.subjects.values().cloned().collect();
        subjects.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(subjects)
    }

    async fn subjects_for_teacher(&self, teacher: UserId) -> Result<Vec<Subject>, StorageError> {
        let mut subjects: Vec<Subject> = self
            .lock()?
            .subjects
            .values()
            .filter(|s| s.is_taught_by(teacher))
            .cloned()
            .collect();
        subjects.sort_by(|a, b| {
            a.class_name()
                .cmp(b.class_name())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(subjects)
    }
}

#[async_trait]
impl ChapterRepository for InMemoryRepository {
    async fn insert_chapter(&self, chapter: NewChapterRecord) -> Result<ChapterId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.subjects.contains_key(&chapter.subject_id) {
            return Err(StorageError::NotFound);
        }
        let id = ChapterId::new(guard.allocate_id());
        let created =
            Chapter::new(id, chapter.subject_id, chapter.title, chapter.order).map_err(ser)?;
        guard.chapters.insert(id, created);
        Ok(id)
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError> {
        Ok(self.lock()?.chapters.get(&id).cloned())
    }

    async fn update_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard
            .chapters
            .get_mut(&chapter.id())
            .ok_or(StorageError::NotFound)?;
        *slot = chapter.clone();
        Ok(())
    }

    async fn delete_chapter(&self, id: ChapterId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.chapters.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        let doomed: BTreeSet<TopicId> = guard
            .topics
            .values()
            .filter(|t| t.chapter_id() == id)
            .map(Topic::id)
            .collect();
        guard.topics.retain(|topic_id, _| !doomed.contains(topic_id));
        guard.statuses.retain(|topic_id, _| !doomed.contains(topic_id));
        guard
            .progress
            .retain(|(_, topic_id), _| !doomed.contains(topic_id));
        Ok(())
    }

    async fn chapters_for_subject(&self, subject: SubjectId) -> Result<Vec<Chapter>, StorageError> {
        let mut chapters: Vec<Chapter> = self
            .lock()?
            .chapters
            .values()
            .filter(|c| c.subject_id() == subject)
            .cloned()
            .collect();
        chapters.sort_by_key(Chapter::sort_key);
        Ok(chapters)
    }
}

#[async_trait]
impl TopicRepository for InMemoryRepository {
    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.chapters.contains_key(&topic.chapter_id) {
            return Err(StorageError::NotFound);
        }
        let draft =
            Topic::new(TopicId::new(0), topic.chapter_id, topic.title, topic.order).map_err(ser)?;
        if guard
            .topics
            .values()
            .any(|t| t.chapter_id() == draft.chapter_id() && t.title() == draft.title())
        {
            return Err(StorageError::Conflict);
        }
        let id = TopicId::new(guard.allocate_id());
        let created = Topic::new(id, draft.chapter_id(), draft.title(), draft.order()).map_err(ser)?;
        guard.topics.insert(id, created);
        Ok(id)
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        Ok(self.lock()?.topics.get(&id).cloned())
    }

    async fn topics_for_chapter(&self, chapter: ChapterId) -> Result<Vec<Topic>, StorageError> {
        let mut topics: Vec<Topic> = self
            .lock()?
            .topics
            .values()
            .filter(|t| t.chapter_id() == chapter)
            .cloned()
            .collect();
        topics.sort_by_key(Topic::sort_key);
        Ok(topics)
    }

    async fn count_topics_for_subject(&self, subject: SubjectId) -> Result<u64, StorageError> {
        let guard = self.lock()?;
        Ok(guard.topic_ids_for_subject(subject).len() as u64)
    }

    async fn subject_of_topic(&self, topic: TopicId) -> Result<Option<SubjectId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .topics
            .get(&topic)
            .and_then(|t| guard.chapters.get(&t.chapter_id()))
            .map(Chapter::subject_id))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn student_status_counts(
        &self,
        subject: SubjectId,
        student: UserId,
    ) -> Result<StatusCounts, StorageError> {
        let guard = self.lock()?;
        let topics = guard.topic_ids_for_subject(subject);
        Ok(StatusCounts::from_grouped(
            guard
                .progress
                .values()
                .filter(|p| p.student_id == student && topics.contains(&p.topic_id))
                .map(|p| (p.status, 1)),
        ))
    }

    async fn subject_status_counts(&self, subject: SubjectId) -> Result<StatusCounts, StorageError> {
        let guard = self.lock()?;
        let topics = guard.topic_ids_for_subject(subject);
        Ok(StatusCounts::from_grouped(
            guard
                .progress
                .values()
                .filter(|p| topics.contains(&p.topic_id))
                .map(|p| (p.status, 1)),
        ))
    }

    async fn subject_status_counts_for(
        &self,
        subject: SubjectId,
        students: &[UserId],
    ) -> Result<StatusCounts, StorageError> {
        let guard = self.lock()?;
        let topics = guard.topic_ids_for_subject(subject);
        Ok(StatusCounts::from_grouped(
            guard
                .progress
                .values()
                .filter(|p| students.contains(&p.student_id) && topics.contains(&p.topic_id))
                .map(|p| (p.status, 1)),
        ))
    }

    async fn progress_status(
        &self,
        student: UserId,
        topic: TopicId,
    ) -> Result<ProgressStatus, StorageError> {
        Ok(self
            .lock()?
            .progress
            .get(&(student, topic))
            .map(|p| p.status)
            .unwrap_or_default())
    }

    async fn upsert_progress(&self, progress: &TopicProgress) -> Result<(), StorageError> {
        self.lock()?.upsert_progress(progress.clone())
    }
}

#[async_trait]
impl TopicStatusRepository for InMemoryRepository {
    async fn get_status(&self, topic: TopicId) -> Result<Option<TopicStatus>, StorageError> {
        Ok(self.lock()?.statuses.get(&topic).cloned())
    }

    async fn statuses_for_subject(
        &self,
        subject: SubjectId,
    ) -> Result<Vec<TopicStatus>, StorageError> {
        let guard = self.lock()?;
        let topics = guard.topic_ids_for_subject(subject);
        let mut statuses: Vec<TopicStatus> = guard
            .statuses
            .values()
            .filter(|s| topics.contains(&s.topic_id()))
            .cloned()
            .collect();
        statuses.sort_by_key(TopicStatus::topic_id);
        Ok(statuses)
    }
}

#[async_trait]
impl ClassStatusPersistence for InMemoryRepository {
    async fn apply_class_status(
        &self,
        status: &TopicStatus,
        students: &[UserId],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.topics.contains_key(&status.topic_id()) {
            return Err(StorageError::NotFound);
        }
        if students.iter().any(|s| !guard.users.contains_key(s)) {
            return Err(StorageError::NotFound);
        }

        let new_status = ProgressStatus::from_class_flag(status.completed());
        guard.statuses.insert(status.topic_id(), status.clone());
        for student in students {
            guard.upsert_progress(TopicProgress::new(
                *student,
                status.topic_id(),
                new_status,
                at,
            ))?;
        }
        Ok(())
    }
}

#[async_trait]
impl LectureRepository for InMemoryRepository {
    async fn insert_session(
        &self,
        session: NewLectureRecord,
    ) -> Result<LectureSessionId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.subjects.contains_key(&session.subject_id) {
            return Err(StorageError::NotFound);
        }
        let id = LectureSessionId::new(guard.allocate_id());
        let created = LectureSession::new(
            id,
            session.subject_id,
            session.date,
            session.attendees,
            session.notes,
        )
        .map_err(ser)?;
        guard.sessions.insert(id, created);
        Ok(id)
    }

    async fn recent_sessions(
        &self,
        subject: SubjectId,
        limit: u32,
    ) -> Result<Vec<LectureSession>, StorageError> {
        let mut sessions: Vec<LectureSession> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.subject_id() == subject)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| (b.date(), b.id()).cmp(&(a.date(), a.id())));
        sessions.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(sessions)
    }

    async fn count_sessions(&self, subject: SubjectId) -> Result<u64, StorageError> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.subject_id() == subject)
            .count() as u64)
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn enroll(&self, enrollment: Enrollment) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&enrollment.user_id)
            || !guard.subjects.contains_key(&enrollment.subject_id)
        {
            return Err(StorageError::NotFound);
        }
        let key = (
            enrollment.user_id,
            enrollment.subject_id,
            enrollment.role.as_str(),
        );
        if !guard.enrollments.insert(key) {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn enrolled_users(
        &self,
        subject: SubjectId,
        role: Role,
    ) -> Result<Vec<UserId>, StorageError> {
        Ok(self
            .lock()?
            .enrollments
            .iter()
            .filter(|(_, s, r)| *s == subject && *r == role.as_str())
            .map(|(u, _, _)| *u)
            .collect())
    }
}
