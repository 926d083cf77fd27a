use syllabus_core::model::{
    ProgressStatus, Role, STUDENT_GROUP, SubjectId, TEACHER_GROUP, TopicId, TopicProgress, UserId,
};
use syllabus_core::time::fixed_now;
use services::{AppServices, Clock, FanOutScope, TopicStatusError, TrackerConfig, Viewer};
use storage::repository::{
    NewSubjectRecord, NewUserRecord, ProgressRepository, Storage, SubjectRepository,
    TopicStatusRepository, UserRepository,
};

async fn user(storage: &Storage, name: &str, group: &str) -> UserId {
    storage
        .users
        .insert_user(NewUserRecord {
            username: name.into(),
            email: None,
            is_staff: false,
            groups: vec![group.into()],
        })
        .await
        .expect("insert user")
}

async fn subject_with_topics(
    services: &AppServices,
    storage: &Storage,
    teacher: UserId,
) -> (SubjectId, Vec<TopicId>) {
    let subject = storage
        .subjects
        .insert_subject(NewSubjectRecord {
            name: "Cyber Security".into(),
            class_name: "CSE-SEM-1".into(),
            planned_lectures: 24,
            start_date: fixed_now().date_naive(),
            end_date: None,
            teacher: Some(teacher),
        })
        .await
        .expect("insert subject");
    let syllabus = services.syllabus();
    let chapter = syllabus
        .add_chapter(subject, "Foundations", teacher)
        .await
        .expect("add chapter");
    let mut topics = Vec::new();
    for title in ["CIA triad", "Threat models", "Hashing", "Ciphers"] {
        let topic = syllabus
            .add_topic(chapter.id(), title, teacher)
            .await
            .expect("add topic");
        topics.push(topic.id());
    }
    (subject, topics)
}

async fn record(storage: &Storage, who: UserId, topic: TopicId, status: ProgressStatus) {
    storage
        .progress
        .upsert_progress(&TopicProgress::new(who, topic, status, fixed_now()))
        .await
        .expect("upsert progress");
}

#[tokio::test]
async fn student_and_class_views_over_sqlite() {
    let storage = Storage::sqlite("sqlite:file:memdb_progress_views?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let services =
        AppServices::from_storage(&storage, Clock::fixed(fixed_now()), TrackerConfig::default());
    let teacher = user(&storage, "alice", TEACHER_GROUP).await;
    let a = user(&storage, "bob", STUDENT_GROUP).await;
    let b = user(&storage, "carol", STUDENT_GROUP).await;
    let (subject, topics) = subject_with_topics(&services, &storage, teacher).await;

    record(&storage, a, topics[0], ProgressStatus::Completed).await;
    record(&storage, a, topics[1], ProgressStatus::Completed).await;
    record(&storage, a, topics[2], ProgressStatus::InProgress).await;
    record(&storage, b, topics[0], ProgressStatus::Completed).await;

    let progress = services.progress();
    let student = progress
        .compute_subject_progress(subject, Viewer::Student(a))
        .await
        .expect("student view")
        .summary();
    assert!((student.progress_percent - 62.5).abs() < 1e-9);
    assert_eq!(student.completed_topics, 2);
    assert_eq!(student.in_progress_topics, 1);
    assert_eq!(student.remaining_topics, 1);

    let class = progress
        .compute_subject_progress(subject, Viewer::Class)
        .await
        .expect("class view");
    assert!((class.completed - 1.5).abs() < 1e-9);
    assert!((class.in_progress - 0.5).abs() < 1e-9);
    assert!((class.percent - 43.8).abs() < 1e-9);

    let teacher_view = progress
        .progress_for_user(subject, teacher)
        .await
        .expect("teacher view");
    assert!((teacher_view.percent - 43.8).abs() < 1e-9);
}

#[tokio::test]
async fn toggling_twice_leaves_students_in_progress() {
    let storage = Storage::sqlite("sqlite:file:memdb_progress_toggle?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let services =
        AppServices::from_storage(&storage, Clock::fixed(fixed_now()), TrackerConfig::default());
    let teacher = user(&storage, "alice", TEACHER_GROUP).await;
    let a = user(&storage, "bob", STUDENT_GROUP).await;
    let b = user(&storage, "carol", STUDENT_GROUP).await;
    let (subject, topics) = subject_with_topics(&services, &storage, teacher).await;
    record(&storage, a, topics[0], ProgressStatus::NotStarted).await;

    let toggles = services.topic_status();
    let first = toggles
        .toggle_class_topic_status(topics[0], teacher)
        .await
        .expect("first toggle");
    assert!(first.completed);
    for s in [a, b] {
        let status = storage.progress.progress_status(s, topics[0]).await.unwrap();
        assert_eq!(status, ProgressStatus::Completed);
    }
    let class = services
        .progress()
        .compute_subject_progress(subject, Viewer::Class)
        .await
        .unwrap();
    assert!((class.percent - 25.0).abs() < 1e-9);

    let second = toggles
        .toggle_class_topic_status(topics[0], teacher)
        .await
        .expect("second toggle");
    assert!(!second.completed);
    for s in [a, b] {
        let status = storage.progress.progress_status(s, topics[0]).await.unwrap();
        assert_eq!(status, ProgressStatus::InProgress);
    }
    let stored = storage
        .topic_status
        .get_status(topics[0])
        .await
        .unwrap()
        .expect("status row");
    assert!(!stored.completed());
}

#[tokio::test]
async fn non_teacher_toggle_changes_nothing() {
    let storage = Storage::sqlite("sqlite:file:memdb_progress_denied?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let services =
        AppServices::from_storage(&storage, Clock::fixed(fixed_now()), TrackerConfig::default());
    let teacher = user(&storage, "alice", TEACHER_GROUP).await;
    let a = user(&storage, "bob", STUDENT_GROUP).await;
    let (subject, topics) = subject_with_topics(&services, &storage, teacher).await;
    record(&storage, a, topics[1], ProgressStatus::InProgress).await;

    let err = services
        .topic_status()
        .toggle_class_topic_status(topics[0], a)
        .await
        .unwrap_err();
    assert!(matches!(err, TopicStatusError::PermissionDenied));

    assert!(storage.topic_status.get_status(topics[0]).await.unwrap().is_none());
    let counts = storage.progress.subject_status_counts(subject).await.unwrap();
    assert_eq!(counts.recorded(), 1);
    assert_eq!(counts.in_progress, 1);
}

#[tokio::test]
async fn enrolled_class_view_counts_only_enrolled_rows() {
    let storage = Storage::sqlite("sqlite:file:memdb_progress_enrolled?mode=memory&cache=shared")
        .await
        .expect("connect sqlite");
    let school_wide =
        AppServices::from_storage(&storage, Clock::fixed(fixed_now()), TrackerConfig::default());
    let teacher = user(&storage, "alice", TEACHER_GROUP).await;
    let a = user(&storage, "bob", STUDENT_GROUP).await;
    let b = user(&storage, "carol", STUDENT_GROUP).await;
    let (subject, topics) = subject_with_topics(&school_wide, &storage, teacher).await;
    school_wide
        .syllabus()
        .enroll(a, subject, Role::Student, teacher)
        .await
        .expect("enroll");

    let state = school_wide
        .topic_status()
        .toggle_class_topic_status(topics[0], teacher)
        .await
        .expect("toggle");
    assert_eq!(state.students_updated, 2);
    assert_eq!(
        storage.progress.progress_status(b, topics[0]).await.unwrap(),
        ProgressStatus::Completed
    );

    let enrolled = AppServices::from_storage(
        &storage,
        Clock::fixed(fixed_now()),
        TrackerConfig::default().with_fan_out(FanOutScope::Enrolled),
    );
    let class = enrolled
        .progress()
        .compute_subject_progress(subject, Viewer::Class)
        .await
        .expect("class view");
    let own = enrolled
        .progress()
        .compute_subject_progress(subject, Viewer::Student(a))
        .await
        .expect("student view");
    assert!((class.completed - 1.0).abs() < 1e-9);
    assert!((class.percent - 25.0).abs() < 1e-9);
    assert!((class.percent - own.percent).abs() < 1e-9);
}
