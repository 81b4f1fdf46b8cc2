//! The shared notification skeleton. Channels reshape this into their wire
//! format; they never build message text or pick severities themselves.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use wattwatch_core::types::{ReadingRecord, RunStatus, TaskOutcome};
use wattwatch_store::DailySummary;

use crate::levels::NotifyLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub level: NotifyLevel,
    /// Which path produced this (scheduler, manual, rollup, startup).
    pub source: String,
    pub timestamp: DateTime<Utc>,
    /// Reading attached to success notifications, shown by richer channels.
    pub record: Option<ReadingRecord>,
}

impl Notification {
    pub fn new(title: &str, body: &str, level: NotifyLevel, source: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            level,
            source: source.to_string(),
            timestamp: Utc::now(),
            record: None,
        }
    }

    pub fn with_record(mut self, record: ReadingRecord) -> Self {
        self.record = Some(record);
        self
    }

    /// The one notification a finished run produces, severity derived from
    /// the outcome status.
    pub fn from_outcome(outcome: &TaskOutcome, source: &str) -> Self {
        let level = NotifyLevel::for_status(outcome.status);
        match outcome.status {
            RunStatus::Success => {
                let balance = outcome.balance().unwrap_or(0.0);
                let mut n = Self::new(
                    "💰 Balance check succeeded",
                    &format!(
                        "Current balance: {balance:.2}\nAttempts: {} in {:.2}s",
                        outcome.attempts,
                        outcome.duration.as_secs_f64()
                    ),
                    level,
                    source,
                );
                if let Some(record) = outcome.records.first() {
                    n = n.with_record(record.clone());
                }
                n
            }
            RunStatus::Partial => Self::new(
                "🟡 Balance check partially succeeded",
                &format!(
                    "Balance was read but not fully processed: {}\nAttempts: {} in {:.2}s",
                    outcome.error.as_deref().unwrap_or("unknown cause"),
                    outcome.attempts,
                    outcome.duration.as_secs_f64()
                ),
                level,
                source,
            ),
            RunStatus::Error => {
                let mut body = format!(
                    "Balance check failed: {}\nAttempts: {} in {:.2}s",
                    outcome.error.as_deref().unwrap_or("unknown error"),
                    outcome.attempts,
                    outcome.duration.as_secs_f64()
                );
                if let Some(diag) = &outcome.diagnostic {
                    body.push_str(&format!("\nSnapshot: {}", diag.display()));
                }
                Self::new("🔴 Balance check failed", &body, level, source)
            }
        }
    }

    pub fn startup() -> Self {
        Self::new(
            "🚀 WattWatch started",
            "Balance monitor is up; scheduled checks are active",
            NotifyLevel::Info,
            "startup",
        )
    }

    /// Daily rollup message. Info severity with usage, Success when the day
    /// had no measurable usage (nothing is wrong, there is just nothing to
    /// report in detail).
    pub fn daily_summary(summary: Option<&DailySummary>) -> Self {
        match summary {
            Some(s) if s.has_usage() => Self::new(
                "📊 Daily usage report",
                &format!(
                    "Date: {}\nTotal usage: {:.2}\nStart balance: {:.2}\nEnd balance: {:.2}\nReadings: {}",
                    s.date,
                    s.total_usage,
                    s.start_balance,
                    s.end_balance,
                    s.intervals.len() + 1
                ),
                NotifyLevel::Info,
                "rollup",
            ),
            Some(s) => Self::new(
                "📊 Daily usage report",
                &format!("Date: {}\nNo measurable usage recorded", s.date),
                NotifyLevel::Success,
                "rollup",
            ),
            None => Self::new(
                "📊 Daily usage report",
                "Not enough readings yesterday to compute usage",
                NotifyLevel::Info,
                "rollup",
            ),
        }
    }

    /// Timestamp in local display format, used by channel footers.
    pub fn local_time(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_outcome_notifications_carry_status_severity() {
        let rec = ReadingRecord::new(88.5, "run-x");
        let ok = TaskOutcome::success("run-x".into(), 1, Duration::from_secs(30), rec);
        let n = Notification::from_outcome(&ok, "scheduler");
        assert_eq!(n.level, NotifyLevel::Success);
        assert!(n.body.contains("88.50"));
        assert!(n.record.is_some());

        let err = TaskOutcome::error(
            "run-y".into(),
            3,
            Duration::from_secs(200),
            "login timeout",
            Some("snap.html".into()),
        );
        let n = Notification::from_outcome(&err, "scheduler");
        assert_eq!(n.level, NotifyLevel::Error);
        assert!(n.body.contains("login timeout"));
        assert!(n.body.contains("snap.html"));
    }

    #[test]
    fn test_rollup_without_data_is_info() {
        let n = Notification::daily_summary(None);
        assert_eq!(n.level, NotifyLevel::Info);
        assert!(n.body.contains("Not enough readings"));
    }
}
