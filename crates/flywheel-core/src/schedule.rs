use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Timelike, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FlywheelError;

/// A workflow's recurrence: either a well-known unit or a cron expression.
///
/// Well-known units fire on their natural boundary (daily at midnight UTC,
/// weekly on Monday midnight, and so on).
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
    Cron(CronSchedule),
}

impl Schedule {
    /// The first schedule boundary strictly after the given time.
    ///
    /// Returns `None` when the schedule has no upcoming occurrence (a cron
    /// expression can run out) or the arithmetic overflows.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Hours => {
                let boundary = after
                    .date_naive()
                    .and_time(NaiveTime::MIN)
                    .and_utc()
                    .checked_add_signed(Duration::hours(i64::from(after.time().hour())))?;
                boundary.checked_add_signed(Duration::hours(1))
            }
            Self::Days => truncate_to_day(after).checked_add_signed(Duration::days(1)),
            Self::Weeks => {
                let days_into_week = i64::from(after.weekday().num_days_from_monday());
                let week_start =
                    truncate_to_day(after).checked_sub_signed(Duration::days(days_into_week))?;
                week_start.checked_add_signed(Duration::days(7))
            }
            Self::Months => {
                let first = NaiveDate::from_ymd_opt(after.year(), after.month(), 1)?
                    .and_time(NaiveTime::MIN)
                    .and_utc();
                first.checked_add_months(Months::new(1))
            }
            Self::Years => NaiveDate::from_ymd_opt(after.year() + 1, 1, 1)
                .map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            Self::Cron(cron) => cron.next_after(after),
        }
    }
}

fn truncate_to_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

impl FromStr for Schedule {
    type Err = FlywheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "@hourly" | "hourly" | "hours" => Ok(Self::Hours),
            "@daily" | "daily" | "days" => Ok(Self::Days),
            "@weekly" | "weekly" | "weeks" => Ok(Self::Weeks),
            "@monthly" | "monthly" | "months" => Ok(Self::Months),
            "@annually" | "@yearly" | "yearly" | "years" => Ok(Self::Years),
            _ => CronSchedule::new(s).map(Self::Cron),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hours => write!(f, "hours"),
            Self::Days => write!(f, "days"),
            Self::Weeks => write!(f, "weeks"),
            Self::Months => write!(f, "months"),
            Self::Years => write!(f, "years"),
            Self::Cron(cron) => write!(f, "{}", cron.expression()),
        }
    }
}

impl Serialize for Schedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Schedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// A parsed cron schedule.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    /// The cron expression string, normalized to six fields.
    expression: String,
    /// Parsed schedule.
    schedule: cron::Schedule,
}

impl CronSchedule {
    /// Create a new cron schedule from an expression.
    pub fn new(expression: &str) -> Result<Self, FlywheelError> {
        // Normalize expression (add seconds if missing)
        let normalized = normalize_cron_expression(expression);

        let schedule = cron::Schedule::from_str(&normalized)
            .map_err(|e| FlywheelError::Schedule(format!("Invalid cron expression: {}", e)))?;

        Ok(Self {
            expression: normalized,
            schedule,
        })
    }

    /// Get the cron expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Get the next scheduled time strictly after the given time.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

/// Normalize a cron expression to include seconds.
fn normalize_cron_expression(expr: &str) -> String {
    let parts: Vec<&str> = expr.split_whitespace().collect();

    match parts.len() {
        5 => format!("0 {}", expr), // Add "0" for seconds
        _ => expr.to_string(),      // Already has seconds, or let the parser reject it
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_daily_advances_past_exact_boundary() {
        let next = Schedule::Days.next_after(at("2016-10-01T00:00:00Z")).unwrap();
        assert_eq!(next, at("2016-10-02T00:00:00Z"));
    }

    #[test]
    fn test_daily_truncates_mid_day() {
        let next = Schedule::Days.next_after(at("2016-10-10T13:11:11Z")).unwrap();
        assert_eq!(next, at("2016-10-11T00:00:00Z"));
    }

    #[test]
    fn test_hourly() {
        let next = Schedule::Hours.next_after(at("2016-10-10T13:11:11Z")).unwrap();
        assert_eq!(next, at("2016-10-10T14:00:00Z"));
    }

    #[test]
    fn test_weekly_lands_on_monday() {
        // 2016-10-05 was a Wednesday
        let next = Schedule::Weeks.next_after(at("2016-10-05T10:00:00Z")).unwrap();
        assert_eq!(next, at("2016-10-10T00:00:00Z"));
    }

    #[test]
    fn test_monthly_and_yearly() {
        let next = Schedule::Months.next_after(at("2016-10-10T13:00:00Z")).unwrap();
        assert_eq!(next, at("2016-11-01T00:00:00Z"));

        let next = Schedule::Years.next_after(at("2016-10-10T13:00:00Z")).unwrap();
        assert_eq!(next, at("2017-01-01T00:00:00Z"));
    }

    #[test]
    fn test_parse_well_known_aliases() {
        assert_eq!("@daily".parse::<Schedule>().unwrap(), Schedule::Days);
        assert_eq!("Hourly".parse::<Schedule>().unwrap(), Schedule::Hours);
        assert_eq!("weeks".parse::<Schedule>().unwrap(), Schedule::Weeks);
    }

    #[test]
    fn test_parse_five_part_cron() {
        let schedule = CronSchedule::new("*/5 * * * *").unwrap();
        assert_eq!(schedule.expression(), "0 */5 * * * *");
    }

    #[test]
    fn test_cron_next_after() {
        let schedule: Schedule = "0 0 * * *".parse().unwrap(); // Daily at midnight
        let next = schedule.next_after(at("2016-10-01T00:00:00Z")).unwrap();
        assert_eq!(next, at("2016-10-02T00:00:00Z"));
    }

    #[test]
    fn test_invalid_cron() {
        assert!("not a schedule".parse::<Schedule>().is_err());
    }

    #[test]
    fn test_schedule_serde_round_trip() {
        let schedule: Schedule = serde_json::from_str("\"@daily\"").unwrap();
        assert_eq!(schedule, Schedule::Days);
        assert_eq!(serde_json::to_string(&schedule).unwrap(), "\"days\"");

        let schedule: Schedule = serde_json::from_str("\"0 0 * * * *\"").unwrap();
        assert!(matches!(schedule, Schedule::Cron(_)));
    }
}
