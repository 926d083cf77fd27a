use std::fmt;
use std::str::FromStr;

use syllabus_core::pacing::PacingPolicy;

/// Which students receive progress rows when a class status changes, and who
/// counts as the class when averaging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FanOutScope {
    /// Every user in the `Student` group, regardless of enrollment.
    #[default]
    AllStudents,
    /// Only users enrolled in the subject as students.
    Enrolled,
}

impl FanOutScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FanOutScope::AllStudents => "all",
            FanOutScope::Enrolled => "enrolled",
        }
    }
}

impl fmt::Display for FanOutScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised fan-out scope name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fan-out scope: {0} (expected `all` or `enrolled`)")]
pub struct ParseFanOutError(pub String);

impl FromStr for FanOutScope {
    type Err = ParseFanOutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all_students" => Ok(FanOutScope::AllStudents),
            "enrolled" => Ok(FanOutScope::Enrolled),
            _ => Err(ParseFanOutError(s.to_string())),
        }
    }
}

/// Service-level knobs for the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackerConfig {
    pub fan_out: FanOutScope,
    pub pacing: PacingPolicy,
}

impl TrackerConfig {
    #[must_use]
    pub fn with_fan_out(mut self, fan_out: FanOutScope) -> Self {
        self.fan_out = fan_out;
        self
    }

    #[must_use]
    pub fn with_percent_per_week(mut self, percent_per_week: f64) -> Self {
        self.pacing.percent_per_week = percent_per_week;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_parses_known_names() {
        assert_eq!("all".parse::<FanOutScope>().unwrap(), FanOutScope::AllStudents);
        assert_eq!(" Enrolled ".parse::<FanOutScope>().unwrap(), FanOutScope::Enrolled);
        assert!("everyone".parse::<FanOutScope>().is_err());
    }

    #[test]
    fn defaults_fan_out_to_every_student() {
        let config = TrackerConfig::default();
        assert_eq!(config.fan_out, FanOutScope::AllStudents);
        assert!((config.pacing.percent_per_week - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.pacing.default_weeks, 12);
    }
}
