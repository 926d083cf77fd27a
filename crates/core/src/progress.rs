//! Weighted syllabus progress.
//!
//! A completed topic earns full credit, an in-progress topic half credit and
//! an untouched topic none. Percentages are reported to one decimal place.
//! Degenerate inputs (no topics, no students) produce an all-zero report
//! instead of dividing by zero.

use serde::Serialize;

use crate::model::ProgressStatus;

/// Credit given to a topic that has been started but not finished.
pub const IN_PROGRESS_CREDIT: f64 = 0.5;

//
// ─── STATUS COUNTS ─────────────────────────────────────────────────────────────
//

/// Number of progress rows per status. Statuses with no rows count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub completed: u64,
    pub in_progress: u64,
    pub not_started: u64,
}

impl StatusCounts {
    #[must_use]
    pub fn new(completed: u64, in_progress: u64, not_started: u64) -> Self {
        Self {
            completed,
            in_progress,
            not_started,
        }
    }

    /// Build counts from `(status, count)` pairs as returned by a group-by query.
    ///
    /// Repeated statuses accumulate.
    #[must_use]
    pub fn from_grouped<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (ProgressStatus, u64)>,
    {
        let mut counts = Self::default();
        for (status, count) in rows {
            counts.add(status, count);
        }
        counts
    }

    pub fn add(&mut self, status: ProgressStatus, count: u64) {
        match status {
            ProgressStatus::Completed => self.completed += count,
            ProgressStatus::InProgress => self.in_progress += count,
            ProgressStatus::NotStarted => self.not_started += count,
        }
    }

    #[must_use]
    pub fn get(&self, status: ProgressStatus) -> u64 {
        match status {
            ProgressStatus::Completed => self.completed,
            ProgressStatus::InProgress => self.in_progress,
            ProgressStatus::NotStarted => self.not_started,
        }
    }

    #[must_use]
    pub fn recorded(&self) -> u64 {
        self.completed + self.in_progress + self.not_started
    }
}

//
// ─── REPORT ────────────────────────────────────────────────────────────────────
//

/// Progress for one subject as seen by one viewer.
///
/// Counts stay fractional: the class view averages over students, and only
/// [`ProgressReport::summary`] rounds them for display.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressReport {
    pub total_topics: u64,
    pub percent: f64,
    pub completed: f64,
    pub in_progress: f64,
    pub remaining: f64,
}

/// Display form of a [`ProgressReport`] with whole-topic counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub progress_percent: f64,
    pub completed_topics: u64,
    pub in_progress_topics: u64,
    pub remaining_topics: u64,
}

impl ProgressReport {
    #[must_use]
    pub fn zero(total_topics: u64) -> Self {
        Self {
            total_topics,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.percent == 0.0
            && self.completed == 0.0
            && self.in_progress == 0.0
            && self.remaining == 0.0
    }

    /// Percentage of the syllabus not yet covered.
    #[must_use]
    pub fn left_percent(&self) -> f64 {
        100.0 - self.percent
    }

    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            progress_percent: self.percent,
            completed_topics: round_count(self.completed),
            in_progress_topics: round_count(self.in_progress),
            remaining_topics: round_count(self.remaining),
        }
    }
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

/// Progress of a single student.
///
/// Topics without a progress row are attributed to `not_started` so the three
/// counts cover every topic of the subject.
#[must_use]
pub fn student_progress(total_topics: u64, counts: StatusCounts) -> ProgressReport {
    if total_topics == 0 {
        return ProgressReport::zero(0);
    }

    let mut remaining = counts.not_started;
    if counts.recorded() < total_topics {
        remaining = total_topics - (counts.completed + counts.in_progress);
    }

    #[allow(clippy::cast_precision_loss)]
    let (completed, in_progress, remaining) = (
        counts.completed as f64,
        counts.in_progress as f64,
        remaining as f64,
    );

    ProgressReport {
        total_topics,
        percent: weighted_percent(total_topics, completed, in_progress),
        completed,
        in_progress,
        remaining,
    }
}

/// Average progress across the class.
///
/// `counts` holds the rows of every student; each status is divided by the
/// number of students to obtain a per-student figure.
#[must_use]
pub fn class_progress(total_topics: u64, counts: StatusCounts, student_count: u64) -> ProgressReport {
    if total_topics == 0 || student_count == 0 {
        return ProgressReport::zero(total_topics);
    }

    #[allow(clippy::cast_precision_loss)]
    let per_student = |n: u64| n as f64 / student_count as f64;

    let completed = per_student(counts.completed);
    let in_progress = per_student(counts.in_progress);
    let remaining = per_student(counts.not_started);

    ProgressReport {
        total_topics,
        percent: weighted_percent(total_topics, completed, in_progress),
        completed,
        in_progress,
        remaining,
    }
}

/// `((completed + 0.5 * in_progress) / total) * 100`, rounded to one decimal.
///
/// Clamped to `[0, 100]`: stale rows from users who no longer hold the
/// student role can push the class average above the topic count.
#[must_use]
pub fn weighted_percent(total_topics: u64, completed: f64, in_progress: f64) -> f64 {
    if total_topics == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let total = total_topics as f64;
    let raw = (completed + in_progress * IN_PROGRESS_CREDIT) / total * 100.0;
    round_one_decimal(raw.clamp(0.0, 100.0))
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_count(value: f64) -> u64 {
    value.max(0.0).round_ties_even() as u64
}
