mod chapter;
mod enrollment;
mod ids;
mod lecture;
mod progress;
mod subject;
mod topic;
mod user;

pub use ids::{ChapterId, LectureSessionId, ParseIdError, SubjectId, TopicId, UserId};

pub use chapter::{Chapter, ChapterError};
pub use enrollment::Enrollment;
pub use lecture::{LectureError, LectureSession};
pub use progress::{ProgressStatus, ProgressStatusError, TopicProgress};
pub use subject::{DEFAULT_CLASS_NAME, DEFAULT_PLANNED_LECTURES, Subject, SubjectError};
pub use topic::{Topic, TopicError, TopicStatus};
pub use user::{Role, STUDENT_GROUP, TEACHER_GROUP, User, UserError};
