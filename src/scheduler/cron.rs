//! Five-field cron expression parsing and matching.
//!
//! Supports the minimal dialect used by job schedules: each of the five
//! fields (minute, hour, day-of-month, month, day-of-week) is either a
//! literal integer or `*`. Lists, ranges, and step values are not supported.

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::BatonError;

/// One field of a cron expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    /// `*`, matching any value.
    Any,
    /// A literal value that must match exactly.
    Literal(u32),
}

impl CronField {
    fn matches(self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Literal(expected) => expected == value,
        }
    }
}

impl std::fmt::Display for CronField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Literal(n) => write!(f, "{n}"),
        }
    }
}

/// A parsed five-field cron expression.
///
/// Field order is minute, hour, day-of-month, month, day-of-week
/// (0 = Sunday). Serializes to and from its string form, so a malformed
/// expression is rejected wherever a schedule is deserialized.
///
/// Literals are not range-checked: `61 * * * *` parses but can never match,
/// the same way the expression would simply never fire on a real clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronSchedule {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

/// Names used in parse error messages, in field order.
const FIELD_NAMES: [&str; 5] = ["minute", "hour", "day-of-month", "month", "day-of-week"];

impl CronSchedule {
    /// Returns `true` when every field matches the given instant.
    ///
    /// Day-of-week is numbered with 0 = Sunday, matching classic cron.
    pub fn matches_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day_of_month.matches(at.day())
            && self.month.matches(at.month())
            && self.day_of_week.matches(at.weekday().num_days_from_sunday())
    }
}

impl std::str::FromStr for CronSchedule {
    type Err = BatonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() != 5 {
            return Err(BatonError::Schedule(format!(
                "expected 5 fields, got {} in {s:?}",
                tokens.len()
            )));
        }

        let mut fields = [CronField::Any; 5];
        for (i, token) in tokens.iter().enumerate() {
            fields[i] = if *token == "*" {
                CronField::Any
            } else {
                let value = token.parse::<u32>().map_err(|_| {
                    BatonError::Schedule(format!(
                        "{} field must be an integer or '*', got {token:?}",
                        FIELD_NAMES[i]
                    ))
                })?;
                CronField::Literal(value)
            };
        }

        Ok(Self {
            minute: fields[0],
            hour: fields[1],
            day_of_month: fields[2],
            month: fields[3],
            day_of_week: fields[4],
        })
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }
}

impl TryFrom<String> for CronSchedule {
    type Error = BatonError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CronSchedule> for String {
    fn from(schedule: CronSchedule) -> Self {
        schedule.to_string()
    }
}
