//! Next-run computation and cron cadence.
//!
//! Two views of a 5-field cron expression live here:
//!
//! - [`compute_next_run`] produces the `nextRun` stored on a job. It only
//!   evaluates the minute and hour fields; day-of-month, month and weekday
//!   are accepted but do not constrain the result.
//! - [`CronCadence`] is the full cron matcher that drives firing, backed by
//!   the `cron` crate and evaluated in the job's zone.
//!
//! Next-run computation never fails on a well-formed 5-field expression. It
//! runs an ordered sequence of steps and records every recovery taken:
//!
//! ```text
//! split fields ──▶ resolve zone ──(unknown)──▶ UTC
//!                       │
//!                       ▼
//!                 exact next run ──(error)──▶ now + 1 minute
//! ```

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::error::{ErrorCode, HookcronError};
use crate::telemetry::JobMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure to interpret a schedule or a zone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("expected 5 cron fields, found {found}")]
    FieldCount { found: usize },

    #[error("unsupported {field} field: {value}")]
    UnsupportedField { field: &'static str, value: String },

    #[error("step of zero in {field} field")]
    ZeroStep { field: &'static str },

    #[error("{field} value {value} out of range")]
    OutOfRange { field: &'static str, value: u32 },

    #[error("local time {0} does not exist in the requested zone")]
    NonexistentLocalTime(String),

    #[error("invalid cron expression: {0}")]
    Cron(String),

    #[error("unknown time zone: {0}")]
    UnknownTimeZone(String),
}

impl From<ScheduleError> for HookcronError {
    fn from(error: ScheduleError) -> Self {
        match &error {
            ScheduleError::UnknownTimeZone(name) => HookcronError::timezone_resolution(name.clone()),
            _ => HookcronError::with_internal(
                ErrorCode::InvalidSchedule,
                "Invalid CRON expression",
                error.to_string(),
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Fields
// ═══════════════════════════════════════════════════════════════════════════════

/// The five whitespace-separated fields of a cron expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronFields<'a> {
    pub minute: &'a str,
    pub hour: &'a str,
    pub day_of_month: &'a str,
    pub month: &'a str,
    pub day_of_week: &'a str,
}

impl<'a> CronFields<'a> {
    pub fn split(expression: &'a str) -> Result<Self, ScheduleError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        match parts.as_slice() {
            [minute, hour, day_of_month, month, day_of_week] => Ok(Self {
                minute,
                hour,
                day_of_month,
                month,
                day_of_week,
            }),
            _ => Err(ScheduleError::FieldCount { found: parts.len() }),
        }
    }

    fn is_every_minute(&self) -> bool {
        self.minute == "*" && self.hour == "*"
    }
}

/// A minute or hour field as understood by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldSpec {
    Any,
    Every(u32),
    At(u32),
}

impl FieldSpec {
    fn parse(field: &'static str, raw: &str, max: u32) -> Result<Self, ScheduleError> {
        if raw == "*" {
            return Ok(Self::Any);
        }
        if let Some(step) = raw.strip_prefix("*/") {
            let step: u32 = step.parse().map_err(|_| ScheduleError::UnsupportedField {
                field,
                value: raw.to_string(),
            })?;
            if step == 0 {
                return Err(ScheduleError::ZeroStep { field });
            }
            return Ok(Self::Every(step));
        }
        let value: u32 = raw.parse().map_err(|_| ScheduleError::UnsupportedField {
            field,
            value: raw.to_string(),
        })?;
        if value > max {
            return Err(ScheduleError::OutOfRange { field, value });
        }
        Ok(Self::At(value))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Time Zones
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolve an IANA zone name.
pub fn resolve_time_zone(name: &str) -> Result<Tz, ScheduleError> {
    Tz::from_str(name.trim()).map_err(|_| ScheduleError::UnknownTimeZone(name.to_string()))
}

/// Resolve a local wall-clock time to the first instant after `after`.
///
/// An ambiguous time (DST fold) takes the earlier instant unless that one has
/// already passed. A time inside a DST gap moves forward one hour.
fn local_at(
    tz: &Tz,
    date: NaiveDate,
    hour: u32,
    minute: u32,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let naive = date
        .and_hms_opt(hour, minute, 0)
        .ok_or(ScheduleError::OutOfRange { field: "hour", value: hour })?;

    let resolved = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(early, late) => {
            if early.with_timezone(&Utc) > after {
                Some(early)
            } else {
                Some(late)
            }
        }
        LocalResult::None => tz.from_local_datetime(&(naive + Duration::hours(1))).earliest(),
    };

    resolved
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ScheduleError::NonexistentLocalTime(naive.to_string()))
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, ScheduleError> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| ScheduleError::NonexistentLocalTime(date.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Next Run
// ═══════════════════════════════════════════════════════════════════════════════

/// A recovery step taken while computing a next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// The requested zone did not resolve; UTC was used.
    TimeZone { requested: String },
    /// The exact computation failed; one minute from now was used.
    OneMinute { reason: String },
}

impl fmt::Display for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeZone { requested } => write!(f, "time zone {} replaced by UTC", requested),
            Self::OneMinute { reason } => write!(f, "one-minute fallback ({})", reason),
        }
    }
}

/// Result of [`compute_next_run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextRun {
    pub at: DateTime<Utc>,
    pub recovery: Vec<Recovery>,
}

impl NextRun {
    /// True when no recovery step was needed.
    pub fn is_exact(&self) -> bool {
        self.recovery.is_empty()
    }
}

/// Compute the next fire instant for `schedule` in `time_zone` as of `now`.
///
/// Fails only when the expression does not have exactly five fields.
pub fn compute_next_run(
    schedule: &str,
    time_zone: &str,
    now: DateTime<Utc>,
) -> Result<NextRun, ScheduleError> {
    let fields = CronFields::split(schedule)?;
    let mut recovery = Vec::new();

    let tz = match resolve_time_zone(time_zone) {
        Ok(tz) => tz,
        Err(err) => {
            warn!(time_zone = %time_zone, error = %err, "Time zone did not resolve, using UTC");
            JobMetrics::record_fallback("time_zone");
            recovery.push(Recovery::TimeZone {
                requested: time_zone.to_string(),
            });
            Tz::UTC
        }
    };

    let at = match exact_next_run(&fields, &tz, now) {
        Ok(at) => at,
        Err(err) => {
            warn!(
                schedule = %schedule,
                time_zone = %tz,
                error = %err,
                "Next run calculation failed, falling back to one minute"
            );
            JobMetrics::record_fallback("calculation");
            recovery.push(Recovery::OneMinute {
                reason: err.to_string(),
            });
            now + Duration::minutes(1)
        }
    };

    Ok(NextRun { at, recovery })
}

/// Minute/hour arithmetic anchored in `tz`.
fn exact_next_run(fields: &CronFields<'_>, tz: &Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
    let local = now.with_timezone(tz);
    let minute = FieldSpec::parse("minute", fields.minute, 59)?;
    let hour = FieldSpec::parse("hour", fields.hour, 23)?;

    let cur_minute = local.minute();
    let cur_hour = local.hour();
    let today = local.date_naive();

    let next_minute_boundary = || {
        let secs = i64::from(local.second());
        let nanos = i64::from(local.nanosecond());
        now + Duration::minutes(1) - Duration::seconds(secs) - Duration::nanoseconds(nanos)
    };
    let hour_start = || {
        let secs = i64::from(cur_minute * 60 + local.second());
        let nanos = i64::from(local.nanosecond());
        now - Duration::seconds(secs) - Duration::nanoseconds(nanos)
    };

    if fields.is_every_minute() {
        return Ok(next_minute_boundary());
    }

    match (minute, hour) {
        // A minute step decides the result on its own.
        (FieldSpec::Every(step), _) => {
            let next = (cur_minute + 1).div_ceil(step) * step;
            Ok(hour_start() + Duration::minutes(i64::from(next)))
        }

        (FieldSpec::At(m), FieldSpec::Any) => {
            if m > cur_minute {
                Ok(hour_start() + Duration::minutes(i64::from(m)))
            } else {
                Ok(hour_start() + Duration::hours(1) + Duration::minutes(i64::from(m)))
            }
        }

        (FieldSpec::At(m), FieldSpec::At(h)) => {
            if h > cur_hour || (h == cur_hour && m > cur_minute) {
                local_at(tz, today, h, m, now)
            } else {
                local_at(tz, add_days(today, 1)?, h, m, now)
            }
        }

        (FieldSpec::Any, FieldSpec::At(h)) => {
            if h > cur_hour {
                local_at(tz, today, h, 0, now)
            } else if h == cur_hour {
                Ok(next_minute_boundary())
            } else {
                local_at(tz, add_days(today, 1)?, h, 0, now)
            }
        }

        (m, FieldSpec::Every(step)) => {
            let next_hour = (cur_hour + 1).div_ceil(step) * step;
            let minute = match m {
                FieldSpec::At(m) => m,
                _ => 0,
            };
            let date = add_days(today, u64::from(next_hour / 24))?;
            local_at(tz, date, next_hour % 24, minute, now)
        }

        (FieldSpec::Any, FieldSpec::Any) => Ok(next_minute_boundary()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cron Cadence
// ═══════════════════════════════════════════════════════════════════════════════

/// Full 5-field cron matcher used to fire jobs.
///
/// Weekdays follow the usual convention (0 and 7 are Sunday). When both
/// day-of-month and day-of-week are restricted, a day must satisfy both.
#[derive(Debug, Clone)]
pub struct CronCadence {
    expression: String,
    schedule: cron::Schedule,
}

impl CronCadence {
    /// Parse and validate a 5-field expression.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let fields = CronFields::split(expression)?;
        let day_of_week = translate_day_of_week(fields.day_of_week)?;
        let six_field = format!(
            "0 {} {} {} {} {}",
            fields.minute, fields.hour, fields.day_of_month, fields.month, day_of_week
        );

        let schedule = cron::Schedule::from_str(&six_field)
            .map_err(|e| ScheduleError::Cron(e.to_string()))?;

        Ok(Self {
            expression: expression.trim().to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First matching instant strictly after `after`, evaluated in `tz`.
    pub fn next_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&tz))
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Validate a schedule the way create/update do.
pub fn validate_schedule(expression: &str) -> Result<(), ScheduleError> {
    CronCadence::parse(expression).map(|_| ())
}

const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

fn parse_weekday(raw: &str) -> Result<u32, ScheduleError> {
    let lower = raw.to_ascii_lowercase();
    if let Some(pos) = DAY_NAMES.iter().position(|d| *d == lower) {
        return Ok(pos as u32);
    }
    match raw.parse::<u32>() {
        Ok(day) if day <= 7 => Ok(day),
        Ok(day) => Err(ScheduleError::OutOfRange {
            field: "day-of-week",
            value: day,
        }),
        Err(_) => Err(ScheduleError::UnsupportedField {
            field: "day-of-week",
            value: raw.to_string(),
        }),
    }
}

/// Rewrite a weekday field (0-7, names, ranges, steps) into the `cron`
/// crate's 1 = Sunday ordinals as an explicit list.
fn translate_day_of_week(field: &str) -> Result<String, ScheduleError> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| ScheduleError::UnsupportedField {
                    field: "day-of-week",
                    value: item.to_string(),
                })?;
                if step == 0 {
                    return Err(ScheduleError::ZeroStep { field: "day-of-week" });
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = if range == "*" {
            (0, 6)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_weekday(a)?, parse_weekday(b)?)
        } else {
            let start = parse_weekday(range)?;
            // `a/N` runs to the end of the week
            if item.contains('/') {
                (start, 6)
            } else {
                (start, start)
            }
        };

        if start > end {
            return Err(ScheduleError::UnsupportedField {
                field: "day-of-week",
                value: item.to_string(),
            });
        }

        let mut day = start;
        while day <= end {
            days.insert((day % 7) + 1);
            day += step;
        }
    }

    Ok(days
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn next(schedule: &str, tz: &str, now: DateTime<Utc>) -> NextRun {
        compute_next_run(schedule, tz, now).unwrap()
    }

    #[test]
    fn test_field_count_is_rejected() {
        assert_eq!(
            compute_next_run("bad cron", "UTC", Utc::now()),
            Err(ScheduleError::FieldCount { found: 2 })
        );
        assert!(compute_next_run("0 0 * * * *", "UTC", Utc::now()).is_err());
    }

    #[test]
    fn test_every_minute_zeroes_seconds() {
        let run = next("* * * * *", "UTC", utc(2024, 1, 1, 10, 2, 30));
        assert_eq!(run.at, utc(2024, 1, 1, 10, 3, 0));
        assert!(run.is_exact());
    }

    #[test]
    fn test_minute_step() {
        assert_eq!(next("*/5 * * * *", "UTC", utc(2024, 1, 1, 10, 2, 0)).at, utc(2024, 1, 1, 10, 5, 0));
        assert_eq!(next("*/5 * * * *", "UTC", utc(2024, 1, 1, 10, 5, 0)).at, utc(2024, 1, 1, 10, 10, 0));
        assert_eq!(next("*/15 * * * *", "UTC", utc(2024, 1, 1, 10, 50, 0)).at, utc(2024, 1, 1, 11, 0, 0));
        assert_eq!(next("*/15 * * * *", "UTC", utc(2024, 1, 1, 23, 59, 0)).at, utc(2024, 1, 2, 0, 0, 0));
    }

    #[test]
    fn test_minute_step_ignores_hour_field() {
        let run = next("*/10 9 * * *", "UTC", utc(2024, 1, 1, 14, 3, 0));
        assert_eq!(run.at, utc(2024, 1, 1, 14, 10, 0));
    }

    #[test]
    fn test_fixed_minute() {
        assert_eq!(next("45 * * * *", "UTC", utc(2024, 1, 1, 10, 30, 0)).at, utc(2024, 1, 1, 10, 45, 0));
        assert_eq!(next("30 * * * *", "UTC", utc(2024, 1, 1, 10, 45, 0)).at, utc(2024, 1, 1, 11, 30, 0));
        assert_eq!(next("30 * * * *", "UTC", utc(2024, 1, 1, 10, 30, 0)).at, utc(2024, 1, 1, 11, 30, 0));
    }

    #[test]
    fn test_fixed_hour_and_minute() {
        assert_eq!(next("0 9 * * *", "UTC", utc(2024, 1, 1, 10, 0, 0)).at, utc(2024, 1, 2, 9, 0, 0));
        assert_eq!(next("0 12 * * *", "UTC", utc(2024, 1, 1, 10, 0, 0)).at, utc(2024, 1, 1, 12, 0, 0));
        assert_eq!(next("30 10 * * *", "UTC", utc(2024, 1, 1, 10, 15, 0)).at, utc(2024, 1, 1, 10, 30, 0));
        assert_eq!(next("15 9 * * *", "UTC", utc(2024, 1, 1, 23, 30, 0)).at, utc(2024, 1, 2, 9, 15, 0));
    }

    #[test]
    fn test_fixed_hour_any_minute() {
        assert_eq!(next("* 14 * * *", "UTC", utc(2024, 1, 1, 10, 20, 0)).at, utc(2024, 1, 1, 14, 0, 0));
        assert_eq!(next("* 10 * * *", "UTC", utc(2024, 1, 1, 10, 20, 10)).at, utc(2024, 1, 1, 10, 21, 0));
        assert_eq!(next("* 8 * * *", "UTC", utc(2024, 1, 1, 10, 20, 0)).at, utc(2024, 1, 2, 8, 0, 0));
    }

    #[test]
    fn test_hour_step() {
        assert_eq!(next("0 */6 * * *", "UTC", utc(2024, 1, 1, 10, 0, 0)).at, utc(2024, 1, 1, 12, 0, 0));
        assert_eq!(next("0 */6 * * *", "UTC", utc(2024, 1, 1, 20, 0, 0)).at, utc(2024, 1, 2, 0, 0, 0));
        assert_eq!(next("15 */4 * * *", "UTC", utc(2024, 1, 1, 10, 40, 0)).at, utc(2024, 1, 1, 12, 15, 0));
        assert_eq!(next("* */2 * * *", "UTC", utc(2024, 1, 1, 10, 40, 0)).at, utc(2024, 1, 1, 12, 0, 0));
    }

    #[test]
    fn test_day_fields_do_not_constrain() {
        // 2024-01-01 is a Monday; a Friday-only expression still lands the same day
        let run = next("0 12 * * 5", "UTC", utc(2024, 1, 1, 10, 0, 0));
        assert_eq!(run.at, utc(2024, 1, 1, 12, 0, 0));
    }

    #[test]
    fn test_wildcard_minute_and_hour_with_day_fields() {
        let run = next("* * 15 * *", "UTC", utc(2024, 1, 1, 10, 0, 5));
        assert_eq!(run.at, utc(2024, 1, 1, 10, 1, 0));
    }

    #[test]
    fn test_time_zone_anchoring() {
        // 10:00Z is 05:00 in New York (EST, UTC-5)
        let run = next("0 9 * * *", "America/New_York", utc(2024, 1, 1, 10, 0, 0));
        assert_eq!(run.at, utc(2024, 1, 1, 14, 0, 0));

        // 10:00Z is 15:30 in Kolkata; the hour boundary is local
        let run = next("45 * * * *", "Asia/Kolkata", utc(2024, 1, 1, 10, 0, 0));
        assert_eq!(run.at, utc(2024, 1, 1, 10, 15, 0));
    }

    #[test]
    fn test_dst_gap_moves_forward() {
        // 2024-03-10 02:30 does not exist in New York; 06:00Z is 01:00 EST
        let run = next("30 2 * * *", "America/New_York", utc(2024, 3, 10, 6, 0, 0));
        assert_eq!(run.at, utc(2024, 3, 10, 7, 30, 0));
        assert!(run.is_exact());
    }

    #[test]
    fn test_unknown_time_zone_falls_back_to_utc() {
        let run = next("0 12 * * *", "Mars/Olympus", utc(2024, 1, 1, 10, 0, 0));
        assert_eq!(run.at, utc(2024, 1, 1, 12, 0, 0));
        assert_eq!(
            run.recovery,
            vec![Recovery::TimeZone {
                requested: "Mars/Olympus".to_string()
            }]
        );
    }

    #[test]
    fn test_unsupported_fields_fall_back_to_one_minute() {
        let now = utc(2024, 1, 1, 10, 2, 30);
        for schedule in ["1,2 * * * *", "0-10 * * * *", "*/0 * * * *", "0 25 * * *", "x 1 * * *"] {
            let run = next(schedule, "UTC", now);
            assert_eq!(run.at, now + Duration::minutes(1), "schedule {}", schedule);
            assert!(matches!(run.recovery.as_slice(), [Recovery::OneMinute { .. }]));
        }
    }

    #[test]
    fn test_both_recoveries_are_recorded_in_order() {
        let run = next("1,2 * * * *", "Nowhere/City", utc(2024, 1, 1, 10, 0, 0));
        assert!(matches!(
            run.recovery.as_slice(),
            [Recovery::TimeZone { .. }, Recovery::OneMinute { .. }]
        ));
    }

    #[test]
    fn test_result_is_always_after_now() {
        let schedules = [
            "* * * * *", "*/5 * * * *", "*/7 * * * *", "0 * * * *", "59 * * * *",
            "0 0 * * *", "30 12 * * *", "* 0 * * *", "* 23 * * *", "0 */3 * * *",
            "5 */5 * * 1",
        ];
        let zones = ["UTC", "America/New_York", "Asia/Kolkata", "Australia/Lord_Howe"];
        let mut now = utc(2024, 1, 1, 0, 0, 0);
        for i in 0..60 {
            now += Duration::minutes(37 * i + 11) + Duration::seconds(i);
            for schedule in schedules {
                for tz in zones {
                    let run = next(schedule, tz, now);
                    assert!(run.at > now, "{} in {} at {} gave {}", schedule, tz, now, run.at);
                }
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Cadence
    // ───────────────────────────────────────────────────────────────────────

    #[test]
    fn test_cadence_minute_step() {
        let cadence = CronCadence::parse("*/5 * * * *").unwrap();
        assert_eq!(
            cadence.next_after(utc(2024, 1, 1, 10, 2, 0), Tz::UTC),
            Some(utc(2024, 1, 1, 10, 5, 0))
        );
        assert_eq!(
            cadence.next_after(utc(2024, 1, 1, 10, 5, 0), Tz::UTC),
            Some(utc(2024, 1, 1, 10, 10, 0))
        );
    }

    #[test]
    fn test_cadence_weekdays() {
        // 2024-01-06 is a Saturday
        let cadence = CronCadence::parse("0 9 * * 1-5").unwrap();
        assert_eq!(
            cadence.next_after(utc(2024, 1, 6, 12, 0, 0), Tz::UTC),
            Some(utc(2024, 1, 8, 9, 0, 0))
        );
    }

    #[test]
    fn test_cadence_sunday_aliases() {
        let from = utc(2024, 1, 1, 0, 0, 0);
        let expected = Some(utc(2024, 1, 7, 0, 0, 0));
        for expr in ["0 0 * * 0", "0 0 * * 7", "0 0 * * sun", "0 0 * * SUN"] {
            let cadence = CronCadence::parse(expr).unwrap();
            assert_eq!(cadence.next_after(from, Tz::UTC), expected, "{}", expr);
        }
    }

    #[test]
    fn test_cadence_in_zone() {
        let cadence = CronCadence::parse("0 9 * * *").unwrap();
        let tz = resolve_time_zone("America/New_York").unwrap();
        assert_eq!(
            cadence.next_after(utc(2024, 1, 1, 10, 0, 0), tz),
            Some(utc(2024, 1, 1, 14, 0, 0))
        );
    }

    #[test]
    fn test_translate_day_of_week() {
        assert_eq!(translate_day_of_week("*").unwrap(), "*");
        assert_eq!(translate_day_of_week("0").unwrap(), "1");
        assert_eq!(translate_day_of_week("1-5").unwrap(), "2,3,4,5,6");
        assert_eq!(translate_day_of_week("5-7").unwrap(), "1,6,7");
        assert_eq!(translate_day_of_week("*/2").unwrap(), "1,3,5,7");
        assert_eq!(translate_day_of_week("mon,wed").unwrap(), "2,4");
        assert!(translate_day_of_week("8").is_err());
        assert!(translate_day_of_week("fri-mon").is_err());
    }

    #[test]
    fn test_validate_schedule() {
        assert!(validate_schedule("*/5 * * * *").is_ok());
        assert!(validate_schedule("0 9 1,15 * mon-fri").is_ok());
        assert!(validate_schedule("bad cron").is_err());
        assert!(validate_schedule("61 * * * *").is_err());
        assert!(validate_schedule("0 0 0 0 0 0").is_err());
    }

    #[test]
    fn test_resolve_time_zone() {
        assert_eq!(resolve_time_zone("UTC").unwrap(), Tz::UTC);
        assert!(resolve_time_zone("Europe/Berlin").is_ok());
        assert!(resolve_time_zone("Not/AZone").is_err());
    }
}
