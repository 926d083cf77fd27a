use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT,
            is_staff INTEGER NOT NULL DEFAULT 0 CHECK (is_staff IN (0, 1))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS user_groups (
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL COLLATE NOCASE,
            PRIMARY KEY (user_id, name),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS subjects (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            class_name TEXT NOT NULL,
            planned_lectures INTEGER NOT NULL CHECK (planned_lectures >= 0),
            start_date TEXT NOT NULL,
            end_date TEXT,
            teacher_id INTEGER,
            FOREIGN KEY (teacher_id) REFERENCES users(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS chapters (
            id INTEGER PRIMARY KEY,
            subject_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            ord INTEGER NOT NULL CHECK (ord >= 0),
            FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY,
            chapter_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            ord INTEGER NOT NULL CHECK (ord >= 0),
            UNIQUE (chapter_id, title),
            FOREIGN KEY (chapter_id) REFERENCES chapters(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS topic_status (
            topic_id INTEGER PRIMARY KEY,
            completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
            updated_by INTEGER,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
            FOREIGN KEY (updated_by) REFERENCES users(id) ON DELETE SET NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS topic_progress (
            id INTEGER PRIMARY KEY,
            student_id INTEGER NOT NULL,
            topic_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('not_started', 'in_progress', 'completed')),
            updated_at TEXT NOT NULL,
            UNIQUE (student_id, topic_id),
            FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lecture_sessions (
            id INTEGER PRIMARY KEY,
            subject_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            attendees INTEGER NOT NULL CHECK (attendees >= 0),
            notes TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('teacher', 'student')),
            UNIQUE (user_id, subject_id, role),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (subject_id) REFERENCES subjects(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_chapters_subject_ord
            ON chapters(subject_id, ord, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_topics_chapter_ord
            ON topics(chapter_id, ord, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_topic_progress_topic_status
            ON topic_progress(topic_id, status);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lecture_sessions_subject_date
            ON lecture_sessions(subject_id, date, id);
    ",
];

/// Runs the versioned migrations for the current schema.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: users, syllabus tree, progress and attendance.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(version = 1, "applied schema migration");
    }

    Ok(())
}
