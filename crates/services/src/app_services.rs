use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::TrackerConfig;
use crate::dashboard_service::DashboardService;
use crate::error::AppServicesError;
use crate::lecture_service::LectureService;
use crate::progress_service::ProgressService;
use crate::roles::{GroupRoles, RoleDirectory};
use crate::syllabus_service::SyllabusService;
use crate::topic_status_service::TopicStatusService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    config: TrackerConfig,
    roles: Arc<dyn RoleDirectory>,
    progress: Arc<ProgressService>,
    topic_status: Arc<TopicStatusService>,
    syllabus: Arc<SyllabusService>,
    lectures: Arc<LectureService>,
    dashboard: Arc<DashboardService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: TrackerConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, config))
    }

    /// Wire every service to the repositories of `storage`.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, config: TrackerConfig) -> Self {
        let roles: Arc<dyn RoleDirectory> = Arc::new(GroupRoles::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.enrollments),
            config.fan_out,
        ));
        let progress = Arc::new(ProgressService::new(
            Arc::clone(&storage.subjects),
            Arc::clone(&storage.topics),
            Arc::clone(&storage.progress),
            Arc::clone(&roles),
        ));
        let topic_status = Arc::new(TopicStatusService::new(
            clock,
            Arc::clone(&storage.topics),
            Arc::clone(&storage.topic_status),
            Arc::clone(&storage.class_status),
            Arc::clone(&roles),
        ));
        let syllabus = Arc::new(SyllabusService::new(
            Arc::clone(&storage.subjects),
            Arc::clone(&storage.chapters),
            Arc::clone(&storage.topics),
            Arc::clone(&storage.topic_status),
            Arc::clone(&storage.lectures),
            Arc::clone(&storage.enrollments),
            Arc::clone(&roles),
        ));
        let lectures = Arc::new(LectureService::new(
            clock,
            Arc::clone(&storage.subjects),
            Arc::clone(&storage.lectures),
            Arc::clone(&roles),
        ));
        let dashboard = Arc::new(DashboardService::new(
            clock,
            config.pacing,
            Arc::clone(&storage.subjects),
            Arc::clone(&progress),
            Arc::clone(&roles),
        ));

        Self {
            config,
            roles,
            progress,
            topic_status,
            syllabus,
            lectures,
            dashboard,
        }
    }

    #[must_use]
    pub fn config(&self) -> TrackerConfig {
        self.config
    }

    #[must_use]
    pub fn roles(&self) -> Arc<dyn RoleDirectory> {
        Arc::clone(&self.roles)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn topic_status(&self) -> Arc<TopicStatusService> {
        Arc::clone(&self.topic_status)
    }

    #[must_use]
    pub fn syllabus(&self) -> Arc<SyllabusService> {
        Arc::clone(&self.syllabus)
    }

    #[must_use]
    pub fn lectures(&self) -> Arc<LectureService> {
        Arc::clone(&self.lectures)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }
}
