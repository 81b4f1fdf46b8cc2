//! Daily usage summary computed from one day of balance readings.
//!
//! Usage between two readings is the balance drop; a balance that goes UP
//! (a top-up) counts as zero usage, not negative.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use wattwatch_core::types::ReadingRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInterval {
    pub at: DateTime<Utc>,
    /// Amount consumed since the previous reading.
    pub usage: f64,
    /// Balance at this reading.
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_usage: f64,
    pub start_balance: f64,
    pub end_balance: f64,
    pub intervals: Vec<UsageInterval>,
}

impl DailySummary {
    /// Build a summary from a day of readings, oldest first.
    /// Returns None below two readings; there is no usage to derive.
    pub fn from_records(date: NaiveDate, records: &[ReadingRecord]) -> Option<Self> {
        if records.len() < 2 {
            return None;
        }

        let mut intervals = Vec::with_capacity(records.len() - 1);
        let mut total_usage = 0.0;
        for pair in records.windows(2) {
            let usage = (pair[0].balance - pair[1].balance).max(0.0);
            total_usage += usage;
            intervals.push(UsageInterval {
                at: pair[1].recorded_at,
                usage,
                balance: pair[1].balance,
            });
        }

        Some(Self {
            date,
            total_usage,
            start_balance: records[0].balance,
            end_balance: records[records.len() - 1].balance,
            intervals,
        })
    }

    pub fn has_usage(&self) -> bool {
        self.total_usage > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reading(balance: f64, hour: u32) -> ReadingRecord {
        ReadingRecord {
            id: None,
            balance,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 10, hour, 0, 0).unwrap(),
            run_id: format!("run-{hour}"),
        }
    }

    #[test]
    fn test_summary_totals_balance_drops() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let records = vec![reading(500.0, 0), reading(497.5, 1), reading(493.0, 2)];
        let summary = DailySummary::from_records(date, &records).unwrap();
        assert_eq!(summary.start_balance, 500.0);
        assert_eq!(summary.end_balance, 493.0);
        assert!((summary.total_usage - 7.0).abs() < 1e-9);
        assert_eq!(summary.intervals.len(), 2);
        assert!((summary.intervals[0].usage - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_topup_does_not_count_as_usage() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        // 500 -> 495 (5 used), 495 -> 995 (top-up), 995 -> 990 (5 used)
        let records = vec![
            reading(500.0, 0),
            reading(495.0, 1),
            reading(995.0, 2),
            reading(990.0, 3),
        ];
        let summary = DailySummary::from_records(date, &records).unwrap();
        assert!((summary.total_usage - 10.0).abs() < 1e-9);
        assert_eq!(summary.intervals[1].usage, 0.0);
    }

    #[test]
    fn test_insufficient_data() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(DailySummary::from_records(date, &[]).is_none());
        assert!(DailySummary::from_records(date, &[reading(500.0, 0)]).is_none());
    }

    #[test]
    fn test_interval_timestamps_follow_readings() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let records = vec![reading(100.0, 5), reading(99.0, 6)];
        let summary = DailySummary::from_records(date, &records).unwrap();
        assert_eq!(
            summary.intervals[0].at,
            records[0].recorded_at + Duration::hours(1)
        );
    }
}
