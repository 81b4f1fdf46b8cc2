//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Field syntax: *, */N, N, N-M, comma lists. DOW is 0-6 with 0 = Sunday.
//!
//! No cron crate dependency; the two schedules this bot runs do not need
//! one.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// Compute the next run time strictly after `after`.
pub fn next_run(expression: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let spec = CronSpec::parse(expression)?;

    let mut candidate = (after + Duration::minutes(1))
        .with_second(0)
        .and_then(|c| c.with_nanosecond(0))
        .unwrap_or(after);

    // Minute stepping with whole-day skips keeps the scan cheap even for
    // schedules that fire once a year.
    let limit = after + Duration::days(400);
    while candidate <= limit {
        if !spec.matches_day(candidate) {
            candidate = (candidate + Duration::days(1))
                .with_hour(0)
                .and_then(|c| c.with_minute(0))
                .unwrap_or(candidate + Duration::days(1));
            continue;
        }
        if spec.minutes.contains(&candidate.minute()) && spec.hours.contains(&candidate.hour()) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Gap between the next two firings after `from`. The scheduler checks the
/// executor's worst-case budget against this at startup.
pub fn tick_gap(expression: &str, from: DateTime<Utc>) -> Option<Duration> {
    let first = next_run(expression, from)?;
    let second = next_run(expression, first)?;
    Some(second - first)
}

struct CronSpec {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
}

impl CronSpec {
    fn parse(expression: &str) -> Option<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            tracing::warn!(
                "Invalid cron expression: '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
                expression
            );
            return None;
        }

        Some(Self {
            minutes: parse_field(parts[0], 0, 59)?,
            hours: parse_field(parts[1], 0, 23)?,
            days_of_month: parse_field(parts[2], 1, 31)?,
            months: parse_field(parts[3], 1, 12)?,
            days_of_week: parse_field(parts[4], 0, 6)?,
        })
    }

    fn matches_day(&self, at: DateTime<Utc>) -> bool {
        self.months.contains(&at.month())
            && self.days_of_month.contains(&at.day())
            && self.days_of_week.contains(&at.weekday().num_days_from_sunday())
    }
}

/// Parse a cron field into the list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N, every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    // Comma list: "0,15,30,45", entries may be ranges
    let mut values = Vec::new();
    for part in field.split(',') {
        let part = part.trim();
        if let Some((lo, hi)) = part.split_once('-') {
            let lo: u32 = lo.parse().ok()?;
            let hi: u32 = hi.parse().ok()?;
            if lo > hi || lo < min || hi > max {
                return None;
            }
            values.extend(lo..=hi);
        } else {
            let n: u32 = part.parse().ok()?;
            if n < min || n > max {
                return None;
            }
            values.push(n);
        }
    }
    values.sort_unstable();
    values.dedup();
    if values.is_empty() { None } else { Some(values) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_every_hour() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 30, 0).unwrap();
        let next = next_run("0 * * * *", after).unwrap();
        assert_eq!(next.hour(), 11);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_specific_time() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 7, 0, 0).unwrap();
        let next = next_run("0 8 * * *", after).unwrap();
        assert_eq!(next.hour(), 8);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_every_15_minutes() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 2, 0).unwrap();
        let next = next_run("*/15 * * * *", after).unwrap();
        assert_eq!(next.minute(), 15);
    }

    #[test]
    fn test_day_of_week() {
        // 2026-02-22 is a Sunday; next Monday 08:00 is the 23rd.
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap();
        let next = next_run("0 8 * * 1", after).unwrap();
        assert_eq!(next.day(), 23);
        assert_eq!(next.hour(), 8);
    }

    #[test]
    fn test_day_of_month_rolls_over() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap();
        let next = next_run("30 6 1 * *", after).unwrap();
        assert_eq!((next.month(), next.day()), (3, 1));
        assert_eq!((next.hour(), next.minute()), (6, 30));
    }

    #[test]
    fn test_range_field() {
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 10, 59, 0).unwrap();
        let next = next_run("0 9-11 * * *", after).unwrap();
        assert_eq!(next.hour(), 11);
        let next = next_run("0 9-11 * * *", next).unwrap();
        assert_eq!(next.hour(), 9);
        assert_eq!(next.day(), 23);
    }

    #[test]
    fn test_invalid_expression() {
        let after = Utc::now();
        assert!(next_run("bad", after).is_none());
        assert!(next_run("61 * * * *", after).is_none());
        assert!(next_run("*/0 * * * *", after).is_none());
    }

    #[test]
    fn test_tick_gap_hourly() {
        let from = Utc.with_ymd_and_hms(2026, 2, 22, 10, 30, 0).unwrap();
        assert_eq!(tick_gap("0 * * * *", from), Some(Duration::hours(1)));
    }
}
