//! Role lookup used by every permission check.

use std::sync::Arc;

use async_trait::async_trait;
use storage::repository::{EnrollmentRepository, StorageError, UserRepository};
use syllabus_core::model::{Role, STUDENT_GROUP, SubjectId, User, UserId};

use crate::config::FanOutScope;

/// Resolves users and the students of a subject.
///
/// Capability checks are derived from [`RoleDirectory::find_user`]; an
/// unknown user holds no capability.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Students that a class-wide status change reaches, ascending by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn students_for(&self, subject: SubjectId) -> Result<Vec<UserId>, StorageError>;

    /// Which students [`RoleDirectory::students_for`] returns.
    fn fan_out_scope(&self) -> FanOutScope {
        FanOutScope::AllStudents
    }

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn is_teacher(&self, id: UserId) -> Result<bool, StorageError> {
        Ok(self.find_user(id).await?.is_some_and(|u| u.is_teacher()))
    }

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn is_student(&self, id: UserId) -> Result<bool, StorageError> {
        Ok(self.find_user(id).await?.is_some_and(|u| u.is_student()))
    }

    /// `Teacher`, `Student` or `User`; `None` for an unknown user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn role_label(&self, id: UserId) -> Result<Option<&'static str>, StorageError> {
        Ok(self.find_user(id).await?.map(|u| u.role_label()))
    }
}

/// Group-membership roles backed by the user and enrollment repositories.
#[derive(Clone)]
pub struct GroupRoles {
    users: Arc<dyn UserRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    scope: FanOutScope,
}

impl GroupRoles {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        scope: FanOutScope,
    ) -> Self {
        Self {
            users,
            enrollments,
            scope,
        }
    }

    #[must_use]
    pub fn scope(&self) -> FanOutScope {
        self.scope
    }
}

#[async_trait]
impl RoleDirectory for GroupRoles {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        self.users.get_user(id).await
    }

    fn fan_out_scope(&self) -> FanOutScope {
        self.scope
    }

    async fn students_for(&self, subject: SubjectId) -> Result<Vec<UserId>, StorageError> {
        match self.scope {
            FanOutScope::AllStudents => self.users.users_in_group(STUDENT_GROUP).await,
            FanOutScope::Enrolled => {
                let enrolled = self.enrollments.enrolled_users(subject, Role::Student).await?;
                let students = self.users.users_in_group(STUDENT_GROUP).await?;
                Ok(enrolled
                    .into_iter()
                    .filter(|id| students.contains(id))
                    .collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::{
        InMemoryRepository, NewSubjectRecord, NewUserRecord, SubjectRepository,
    };
    use syllabus_core::model::{Enrollment, TEACHER_GROUP};
    use syllabus_core::time::fixed_now;

    async fn add_user(repo: &InMemoryRepository, name: &str, staff: bool, groups: &[&str]) -> UserId {
        repo.insert_user(NewUserRecord {
            username: name.into(),
            email: None,
            is_staff: staff,
            groups: groups.iter().map(|g| (*g).to_string()).collect(),
        })
        .await
        .unwrap()
    }

    fn roles(repo: &InMemoryRepository, scope: FanOutScope) -> GroupRoles {
        GroupRoles::new(Arc::new(repo.clone()), Arc::new(repo.clone()), scope)
    }

    #[tokio::test]
    async fn staff_and_teacher_group_grant_teacher_capability() {
        let repo = InMemoryRepository::new();
        let staff = add_user(&repo, "admin", true, &[]).await;
        let teacher = add_user(&repo, "alice", false, &["teacher"]).await;
        let student = add_user(&repo, "bob", false, &[STUDENT_GROUP]).await;
        let roles = roles(&repo, FanOutScope::AllStudents);

        assert!(roles.is_teacher(staff).await.unwrap());
        assert!(roles.is_teacher(teacher).await.unwrap());
        assert!(!roles.is_teacher(student).await.unwrap());
        assert!(roles.is_student(student).await.unwrap());
        assert!(!roles.is_teacher(UserId::new(404)).await.unwrap());

        assert_eq!(roles.role_label(teacher).await.unwrap(), Some("Teacher"));
        assert_eq!(roles.role_label(student).await.unwrap(), Some("Student"));
        assert_eq!(roles.role_label(staff).await.unwrap(), Some("Teacher"));
        assert_eq!(roles.role_label(UserId::new(404)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn enrolled_scope_narrows_students_to_the_subject() {
        let repo = InMemoryRepository::new();
        let teacher = add_user(&repo, "alice", false, &[TEACHER_GROUP]).await;
        let bob = add_user(&repo, "bob", false, &[STUDENT_GROUP]).await;
        let carol = add_user(&repo, "carol", false, &[STUDENT_GROUP]).await;
        let subject = repo
            .insert_subject(NewSubjectRecord {
                name: "Java".into(),
                class_name: String::new(),
                planned_lectures: 24,
                start_date: fixed_now().date_naive(),
                end_date: None,
                teacher: Some(teacher),
            })
            .await
            .unwrap();
        repo.enroll(Enrollment::new(carol, subject, Role::Student))
            .await
            .unwrap();
        repo.enroll(Enrollment::new(teacher, subject, Role::Student))
            .await
            .unwrap();

        let all = roles(&repo, FanOutScope::AllStudents);
        assert_eq!(all.students_for(subject).await.unwrap(), vec![bob, carol]);

        let enrolled = roles(&repo, FanOutScope::Enrolled);
        assert_eq!(enrolled.students_for(subject).await.unwrap(), vec![carol]);
    }
}
