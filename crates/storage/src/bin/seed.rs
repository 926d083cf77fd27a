use std::fmt;

use chrono::{DateTime, Duration, Utc};
use syllabus_core::model::{
    Chapter, ChapterId, Enrollment, LectureSession, LectureSessionId, Role, STUDENT_GROUP,
    Subject, SubjectId, TEACHER_GROUP, Topic, TopicId,
};
use storage::repository::{
    ChapterRepository, EnrollmentRepository, LectureRepository, NewChapterRecord,
    NewLectureRecord, NewSubjectRecord, NewTopicRecord, NewUserRecord, Storage,
    SubjectRepository, TopicRepository, UserRepository,
};

const SUBJECT_NAME: &str = "Java Programming";
const CLASS_NAME: &str = "B.Tech CSE (Data Science) Sem 5";

const STUDENTS: [&str; 4] = ["bob_student", "carol_student", "dave_student", "eve_student"];

const UNITS: [(&str, &[&str]); 4] = [
    (
        "Unit I: Basic Syntactical Constructs",
        &[
            "Java features and programming environment",
            "Defining classes and creating objects",
            "Tokens, identifiers and data types",
            "Operators and expressions",
            "Control flow and loops",
        ],
    ),
    (
        "Unit II: Inheritance, Interfaces and Packages",
        &[
            "Single and multilevel inheritance",
            "Method overriding and super",
            "Abstract classes",
            "Interfaces",
            "Creating and importing packages",
        ],
    ),
    (
        "Unit III: Exception Handling and Multithreading",
        &[
            "try, catch and finally",
            "Custom exceptions",
            "Thread lifecycle",
            "Synchronization",
        ],
    ),
    (
        "Unit IV: Collections and Generics",
        &[
            "List, Set and Map",
            "Iterators",
            "Generic methods and bounded types",
        ],
    ),
];

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    sessions: u32,
    weeks: i64,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidSessions { raw: String },
    InvalidWeeks { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSessions { raw } => write!(f, "invalid --sessions value: {raw}"),
            ArgsError::InvalidWeeks { raw } => write!(f, "invalid --weeks value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("SYLLABUS_DB_URL")
            .unwrap_or_else(|_| "sqlite://syllabus.sqlite3".into());
        let mut sessions = std::env::var("SYLLABUS_SEED_SESSIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(6);
        let mut weeks = std::env::var("SYLLABUS_SEED_WEEKS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(16);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--sessions" => {
                    let value = require_value(&mut args, "--sessions")?;
                    sessions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSessions { raw: value.clone() })?;
                }
                "--weeks" => {
                    let value = require_value(&mut args, "--weeks")?;
                    weeks = value
                        .parse::<i64>()
                        .ok()
                        .filter(|w| *w > 0)
                        .ok_or_else(|| ArgsError::InvalidWeeks { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            sessions,
            weeks,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://syllabus.sqlite3)");
    eprintln!("  --sessions <n>            Lecture sessions to record (default: 6)");
    eprintln!("  --weeks <n>               Term length in weeks from the start date (default: 16)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  SYLLABUS_DB_URL, SYLLABUS_SEED_SESSIONS, SYLLABUS_SEED_WEEKS");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);
    let today = now.date_naive();

    let existing = storage.subjects.list_subjects().await?;
    if existing.iter().any(|s| s.name() == SUBJECT_NAME) {
        println!("{SUBJECT_NAME} already present in {}, nothing to do", args.db_url);
        return Ok(());
    }

    let teacher = storage
        .users
        .insert_user(NewUserRecord {
            username: "alice_teacher".into(),
            email: Some("alice@example.com".into()),
            is_staff: false,
            groups: vec![TEACHER_GROUP.into()],
        })
        .await?;

    let mut students = Vec::with_capacity(STUDENTS.len());
    for username in STUDENTS {
        let id = storage
            .users
            .insert_user(NewUserRecord {
                username: username.into(),
                email: Some(format!("{username}@example.com")),
                is_staff: false,
                groups: vec![STUDENT_GROUP.into()],
            })
            .await?;
        students.push(id);
    }

    let start_date = today - Duration::days(30);
    let draft = Subject::new(
        SubjectId::new(1),
        SUBJECT_NAME,
        CLASS_NAME,
        45,
        start_date,
        Some(start_date + Duration::weeks(args.weeks)),
        Some(teacher),
    )?;
    let subject_id = storage
        .subjects
        .insert_subject(NewSubjectRecord::from_subject(&draft))
        .await?;

    storage
        .enrollments
        .enroll(Enrollment::new(teacher, subject_id, Role::Teacher))
        .await?;
    for student in &students {
        storage
            .enrollments
            .enroll(Enrollment::new(*student, subject_id, Role::Student))
            .await?;
    }

    let mut topic_count = 0_u32;
    for (chapter_idx, (title, topics)) in (1_u32..).zip(UNITS) {
        let chapter = Chapter::new(ChapterId::new(1), subject_id, title, chapter_idx)?;
        let chapter_id = storage
            .chapters
            .insert_chapter(NewChapterRecord::from_chapter(&chapter))
            .await?;

        for (topic_idx, topic_title) in (1_u32..).zip(topics.iter()) {
            let topic = Topic::new(TopicId::new(1), chapter_id, *topic_title, topic_idx)?;
            storage
                .topics
                .insert_topic(NewTopicRecord::from_topic(&topic))
                .await?;
            topic_count += 1;
        }
    }

    for i in 0..args.sessions {
        let days_ago = i64::from(args.sessions - i) * 3;
        let session = LectureSession::new(
            LectureSessionId::new(1),
            subject_id,
            today - Duration::days(days_ago),
            30,
            format!("Lecture {}", i + 1),
        )?;
        storage
            .lectures
            .insert_session(NewLectureRecord::from_session(&session))
            .await?;
    }

    println!(
        "Seeded subject {} with {} students, {} topics and {} sessions into {}",
        subject_id.value(),
        students.len(),
        topic_count,
        args.sessions,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
