use std::fmt;

use serde::Serialize;
use serde_json::json;
use services::{AppServices, Clock, FanOutScope, RoleDirectory, TrackerConfig, Viewer};
use syllabus_core::model::{ChapterId, Role, SubjectId, TopicId, UserId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { command: &'static str, flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidFanOut { raw: String },
    InvalidPace { raw: String },
    InvalidAttendees { raw: String },
    InvalidRole { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { command, flag } => write!(f, "{command} requires {flag}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidFanOut { raw } => {
                write!(f, "invalid --fanout value (expected all or enrolled): {raw}")
            }
            ArgsError::InvalidPace { raw } => write!(f, "invalid --pace value: {raw}"),
            ArgsError::InvalidAttendees { raw } => write!(f, "invalid --attendees value: {raw}"),
            ArgsError::InvalidRole { raw } => {
                write!(f, "invalid --role value (expected teacher or student): {raw}")
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

fn parse_id<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  progress       --subject <id> (--user <id> | --class)");
    eprintln!("  toggle         --topic <id> --user <id>");
    eprintln!("  alert          --subject <id>");
    eprintln!("  dashboard      --user <id>");
    eprintln!("  detail         --subject <id> --user <id>");
    eprintln!("  report         --subject <id>");
    eprintln!("  add-chapter    --subject <id> --title <text> --user <id>");
    eprintln!("  edit-chapter   --chapter <id> --title <text> --user <id>");
    eprintln!("  delete-chapter --chapter <id> --user <id>");
    eprintln!("  add-topic      --chapter <id> --title <text> --user <id>");
    eprintln!("  add-session    --subject <id> --user <id> [--attendees <n>] [--notes <text>]");
    eprintln!("  lectures       --subject <id>");
    eprintln!("  enroll         --subject <id> --member <id> --role <teacher|student> --user <id>");
    eprintln!("  whoami         --user <id>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://syllabus.sqlite3)");
    eprintln!("  --fanout <all|enrolled>   Students reached by a class status toggle (default: all)");
    eprintln!("  --pace <percent>          Expected syllabus percent per week (default: 5)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SYLLABUS_DB_URL, SYLLABUS_FANOUT, SYLLABUS_PACE_PER_WEEK, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Progress,
    Toggle,
    Alert,
    Dashboard,
    Detail,
    Report,
    AddChapter,
    EditChapter,
    DeleteChapter,
    AddTopic,
    AddSession,
    Lectures,
    Enroll,
    WhoAmI,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "progress" => Some(Self::Progress),
            "toggle" => Some(Self::Toggle),
            "alert" => Some(Self::Alert),
            "dashboard" => Some(Self::Dashboard),
            "detail" => Some(Self::Detail),
            "report" => Some(Self::Report),
            "add-chapter" => Some(Self::AddChapter),
            "edit-chapter" => Some(Self::EditChapter),
            "delete-chapter" => Some(Self::DeleteChapter),
            "add-topic" => Some(Self::AddTopic),
            "add-session" => Some(Self::AddSession),
            "lectures" => Some(Self::Lectures),
            "enroll" => Some(Self::Enroll),
            "whoami" => Some(Self::WhoAmI),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Toggle => "toggle",
            Self::Alert => "alert",
            Self::Dashboard => "dashboard",
            Self::Detail => "detail",
            Self::Report => "report",
            Self::AddChapter => "add-chapter",
            Self::EditChapter => "edit-chapter",
            Self::DeleteChapter => "delete-chapter",
            Self::AddTopic => "add-topic",
            Self::AddSession => "add-session",
            Self::Lectures => "lectures",
            Self::Enroll => "enroll",
            Self::WhoAmI => "whoami",
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: String,
    config: TrackerConfig,
    subject: Option<SubjectId>,
    chapter: Option<ChapterId>,
    topic: Option<TopicId>,
    user: Option<UserId>,
    member: Option<UserId>,
    class: bool,
    title: Option<String>,
    notes: String,
    attendees: u32,
    role: Option<Role>,
}

impl Args {
    fn from_env() -> Result<Self, ArgsError> {
        let db_url = std::env::var("SYLLABUS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://syllabus.sqlite3".into(), normalize_sqlite_url);
        let mut config = TrackerConfig::default();
        if let Ok(raw) = std::env::var("SYLLABUS_FANOUT") {
            config.fan_out = parse_fan_out(raw)?;
        }
        if let Ok(raw) = std::env::var("SYLLABUS_PACE_PER_WEEK") {
            config.pacing.percent_per_week = parse_pace(raw)?;
        }
        Ok(Self {
            db_url,
            config,
            ..Self::default()
        })
    }

    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::from_env()?;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--fanout" => {
                    parsed.config.fan_out = parse_fan_out(require_value(args, "--fanout")?)?;
                }
                "--pace" => {
                    parsed.config.pacing.percent_per_week =
                        parse_pace(require_value(args, "--pace")?)?;
                }
                "--subject" => {
                    parsed.subject = Some(parse_id("--subject", require_value(args, "--subject")?)?);
                }
                "--chapter" => {
                    parsed.chapter = Some(parse_id("--chapter", require_value(args, "--chapter")?)?);
                }
                "--topic" => {
                    parsed.topic = Some(parse_id("--topic", require_value(args, "--topic")?)?);
                }
                "--user" => {
                    parsed.user = Some(parse_id("--user", require_value(args, "--user")?)?);
                }
                "--member" => {
                    parsed.member = Some(parse_id("--member", require_value(args, "--member")?)?);
                }
                "--class" => parsed.class = true,
                "--title" => parsed.title = Some(require_value(args, "--title")?),
                "--notes" => parsed.notes = require_value(args, "--notes")?,
                "--attendees" => {
                    let value = require_value(args, "--attendees")?;
                    parsed.attendees = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidAttendees { raw: value.clone() })?;
                }
                "--role" => {
                    let value = require_value(args, "--role")?;
                    parsed.role = Some(
                        value
                            .parse()
                            .map_err(|_| ArgsError::InvalidRole { raw: value.clone() })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }
}

fn parse_fan_out(raw: String) -> Result<FanOutScope, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidFanOut { raw })
}

fn parse_pace(raw: String) -> Result<f64, ArgsError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|pace| pace.is_finite() && *pace > 0.0)
        .ok_or(ArgsError::InvalidPace { raw })
}

fn required<T>(value: Option<T>, command: Command, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag {
        command: command.name(),
        flag,
    })
}

fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim().to_string();
    if trimmed == "sqlite::memory:"
        || trimmed.starts_with("sqlite://")
        || trimmed.starts_with("sqlite:file:")
    {
        return trimmed;
    }

    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn emit<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute(
    cmd: Command,
    args: Args,
    services: &AppServices,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Command::Progress => {
            let subject = required(args.subject, cmd, "--subject")?;
            let report = if args.class {
                services
                    .progress()
                    .compute_subject_progress(subject, Viewer::Class)
                    .await?
            } else {
                let user = required(args.user, cmd, "--user or --class")?;
                services.progress().progress_for_user(subject, user).await?
            };
            emit(&json!({
                "subject_id": subject,
                "total_topics": report.total_topics,
                "progress": report.summary(),
            }))
        }
        Command::Toggle => {
            let topic = required(args.topic, cmd, "--topic")?;
            let user = required(args.user, cmd, "--user")?;
            let state = services
                .topic_status()
                .toggle_class_topic_status(topic, user)
                .await?;
            emit(&state)
        }
        Command::Alert => {
            let subject = required(args.subject, cmd, "--subject")?;
            let alert = services
                .dashboard()
                .dashboard_alert(subject, Clock::default().today())
                .await?;
            emit(&json!({
                "subject_id": subject,
                "alert": alert.map(|a| a.message()),
            }))
        }
        Command::Dashboard => {
            let user = required(args.user, cmd, "--user")?;
            let dashboard = services.dashboard();
            if services.roles().is_teacher(user).await? {
                let view = dashboard.teacher_dashboard(user).await?;
                let messages: Vec<String> = view.alerts.iter().map(|a| a.message()).collect();
                emit(&json!({
                    "role": "Teacher",
                    "subjects": view.subjects,
                    "alerts": messages,
                }))
            } else {
                let subjects = dashboard.student_dashboard(user).await?;
                emit(&json!({ "role": "Student", "subjects": subjects }))
            }
        }
        Command::Detail => {
            let subject = required(args.subject, cmd, "--subject")?;
            let user = required(args.user, cmd, "--user")?;
            emit(&services.syllabus().subject_detail(subject, user).await?)
        }
        Command::Report => {
            let subject = required(args.subject, cmd, "--subject")?;
            emit(&services.syllabus().subject_report(subject).await?)
        }
        Command::AddChapter => {
            let subject = required(args.subject, cmd, "--subject")?;
            let title = required(args.title, cmd, "--title")?;
            let user = required(args.user, cmd, "--user")?;
            emit(&services.syllabus().add_chapter(subject, &title, user).await?)
        }
        Command::EditChapter => {
            let chapter = required(args.chapter, cmd, "--chapter")?;
            let title = required(args.title, cmd, "--title")?;
            let user = required(args.user, cmd, "--user")?;
            emit(&services.syllabus().edit_chapter(chapter, &title, user).await?)
        }
        Command::DeleteChapter => {
            let chapter = required(args.chapter, cmd, "--chapter")?;
            let user = required(args.user, cmd, "--user")?;
            services.syllabus().delete_chapter(chapter, user).await?;
            emit(&json!({ "deleted": chapter }))
        }
        Command::AddTopic => {
            let chapter = required(args.chapter, cmd, "--chapter")?;
            let title = required(args.title, cmd, "--title")?;
            let user = required(args.user, cmd, "--user")?;
            emit(&services.syllabus().add_topic(chapter, &title, user).await?)
        }
        Command::AddSession => {
            let subject = required(args.subject, cmd, "--subject")?;
            let user = required(args.user, cmd, "--user")?;
            let session = services
                .lectures()
                .add_session(subject, args.attendees, &args.notes, user)
                .await?;
            emit(&session)
        }
        Command::Lectures => {
            let subject = required(args.subject, cmd, "--subject")?;
            emit(&services.lectures().lecture_summary(subject).await?)
        }
        Command::Enroll => {
            let subject = required(args.subject, cmd, "--subject")?;
            let member = required(args.member, cmd, "--member")?;
            let role = required(args.role, cmd, "--role")?;
            let user = required(args.user, cmd, "--user")?;
            services.syllabus().enroll(member, subject, role, user).await?;
            emit(&json!({ "user_id": member, "subject_id": subject, "role": role }))
        }
        Command::WhoAmI => {
            let user = required(args.user, cmd, "--user")?;
            let label = services.roles().role_label(user).await?;
            emit(&json!({ "user_id": user, "role": label }))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            print_usage();
            ArgsError::UnknownCommand(first)
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let services = AppServices::new_sqlite(&args.db_url, Clock::default(), args.config).await?;
    execute(cmd, args, &services).await
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(items: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = items.iter().map(|s| (*s).to_string());
        Args::parse(&mut iter)
    }

    #[test]
    fn parses_ids_and_options() {
        let args = parse(&[
            "--subject", "3", "--user", "7", "--fanout", "enrolled", "--pace", "2.5",
        ])
        .unwrap();
        assert_eq!(args.subject, Some(SubjectId::new(3)));
        assert_eq!(args.user, Some(UserId::new(7)));
        assert_eq!(args.config.fan_out, FanOutScope::Enrolled);
        assert!((args.config.pacing.percent_per_week - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn enroll_takes_member_separately_from_acting_user() {
        let args = parse(&["--member", "9", "--user", "2", "--role", "student"]).unwrap();
        assert_eq!(args.member, Some(UserId::new(9)));
        assert_eq!(args.user, Some(UserId::new(2)));
        assert_eq!(args.role, Some(Role::Student));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse(&["--topic", "abc"]),
            Err(ArgsError::InvalidId { flag: "--topic", .. })
        ));
        assert!(matches!(
            parse(&["--pace", "-1"]),
            Err(ArgsError::InvalidPace { .. })
        ));
        assert!(matches!(parse(&["--user"]), Err(ArgsError::MissingValue { .. })));
        assert!(matches!(parse(&["--nope"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn keeps_memory_and_url_forms() {
        assert_eq!(
            normalize_sqlite_url("sqlite::memory:".into()),
            "sqlite::memory:"
        );
        assert_eq!(
            normalize_sqlite_url("sqlite://tmp/a.db".into()),
            "sqlite://tmp/a.db"
        );
        assert!(normalize_sqlite_url("data/x.sqlite3".into()).starts_with("sqlite:///"));
    }

    #[test]
    fn commands_round_trip_through_names() {
        for name in ["progress", "toggle", "add-topic", "whoami"] {
            assert_eq!(Command::from_arg(name).map(Command::name), Some(name));
        }
        assert!(Command::from_arg("launch").is_none());
    }
}
