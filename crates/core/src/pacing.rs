use chrono::NaiveDate;
use serde::Serialize;

use crate::model::SubjectId;

/// Heuristic that nudges a teacher when the syllabus is behind schedule.
///
/// An alert fires when the uncovered share of the syllabus exceeds
/// `percent_per_week` for every remaining week.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingPolicy {
    pub percent_per_week: f64,
    /// Weeks assumed when a subject has no end date.
    pub default_weeks: i64,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            percent_per_week: 5.0,
            default_weeks: 12,
        }
    }
}

/// Advisory raised for a subject that is falling behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacingAlert {
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub left_percent: f64,
    pub weeks_left: i64,
}

impl PacingAlert {
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "{}: {:.0}% syllabus left but only ~{} weeks remain.",
            self.subject_name, self.left_percent, self.weeks_left
        )
    }
}

impl PacingPolicy {
    /// Whole weeks until `end_date`, never less than one.
    #[must_use]
    pub fn weeks_left(&self, end_date: Option<NaiveDate>, today: NaiveDate) -> i64 {
        end_date
            .map_or(self.default_weeks, |end| {
                (end - today).num_days().div_euclid(7)
            })
            .max(1)
    }

    #[must_use]
    pub fn assess(
        &self,
        subject_id: SubjectId,
        subject_name: &str,
        end_date: Option<NaiveDate>,
        today: NaiveDate,
        progress_percent: f64,
    ) -> Option<PacingAlert> {
        let weeks_left = self.weeks_left(end_date, today);
        let left_percent = 100.0 - progress_percent;
        #[allow(clippy::cast_precision_loss)]
        let budget = weeks_left as f64 * self.percent_per_week;
        (left_percent > budget).then(|| PacingAlert {
            subject_id,
            subject_name: subject_name.to_string(),
            left_percent,
            weeks_left,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weeks_left_defaults_to_twelve() {
        let policy = PacingPolicy::default();
        assert_eq!(policy.weeks_left(None, date(2024, 1, 1)), 12);
    }

    #[test]
    fn weeks_left_floors_and_is_at_least_one() {
        let policy = PacingPolicy::default();
        let today = date(2024, 1, 1);
        assert_eq!(policy.weeks_left(Some(date(2024, 1, 21)), today), 2);
        assert_eq!(policy.weeks_left(Some(date(2024, 1, 3)), today), 1);
        assert_eq!(policy.weeks_left(Some(date(2023, 12, 1)), today), 1);
    }

    #[test]
    fn alerts_when_behind_schedule() {
        let policy = PacingPolicy::default();
        let today = date(2024, 1, 1);
        // 2 weeks left allows 10%; 60% left is far behind.
        let alert = policy
            .assess(SubjectId::new(1), "Networks", Some(date(2024, 1, 15)), today, 40.0)
            .expect("alert");
        assert_eq!(alert.weeks_left, 2);
        assert_eq!(
            alert.message(),
            "Networks: 60% syllabus left but only ~2 weeks remain."
        );
    }

    #[test]
    fn no_alert_on_pace() {
        let policy = PacingPolicy::default();
        let today = date(2024, 1, 1);
        // 12 weeks allow 60%; exactly 60% left is not over budget.
        assert!(
            policy
                .assess(SubjectId::new(1), "Networks", None, today, 40.0)
                .is_none()
        );
    }

    #[test]
    fn threshold_is_configurable() {
        let policy = PacingPolicy {
            percent_per_week: 10.0,
            ..PacingPolicy::default()
        };
        let today = date(2024, 1, 1);
        assert!(
            policy
                .assess(SubjectId::new(1), "Networks", Some(date(2024, 1, 15)), today, 85.0)
                .is_none()
        );
    }
}
