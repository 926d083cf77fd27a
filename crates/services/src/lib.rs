#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod dashboard_service;
pub mod error;
pub mod lecture_service;
pub mod progress_service;
pub mod roles;
pub mod syllabus_service;
pub mod topic_status_service;

pub use syllabus_core::Clock;

pub use app_services::AppServices;
pub use config::{FanOutScope, ParseFanOutError, TrackerConfig};
pub use dashboard_service::{DashboardService, SubjectProgress, TeacherDashboard};
pub use error::{
    AppServicesError, DashboardError, LectureServiceError, ProgressServiceError, SyllabusError,
    TopicStatusError,
};
pub use lecture_service::{LectureService, LectureSummary};
pub use progress_service::{ProgressService, Viewer};
pub use roles::{GroupRoles, RoleDirectory};
pub use syllabus_service::{
    ChapterOutline, SubjectDetail, SubjectReport, SyllabusService, TopicRow,
};
pub use topic_status_service::{TopicState, TopicStatusService};
