//! Collaborator traits. The scheduler core only ever talks to these;
//! concrete portal/storage/chart implementations live in their own crates.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{BalanceReading, ExtractFailure, PortalCredentials, ReadingRecord, RunLog};

/// Performs one login + navigation + balance extraction against the portal.
/// Treated as a black box bounded by `timeout`; failures carry their own
/// retryability classification.
#[async_trait]
pub trait BalanceExtractor: Send + Sync {
    async fn extract(
        &self,
        credentials: &PortalCredentials,
        timeout: Duration,
    ) -> std::result::Result<BalanceReading, ExtractFailure>;

    /// Capture a debugging artifact for the last failed attempt, when the
    /// implementation has one to give. Never fails the run.
    async fn capture_diagnostic(&self) -> Option<PathBuf> {
        None
    }
}

/// Append-only reading history plus run logs.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Append one reading. Returns the stored record with its row id set.
    async fn append(&self, record: &ReadingRecord) -> Result<ReadingRecord>;

    /// All readings recorded on the given local calendar day, oldest first.
    async fn query_day(&self, day: NaiveDate) -> Result<Vec<ReadingRecord>>;

    /// All readings recorded yesterday (local time), oldest first.
    async fn query_yesterday(&self) -> Result<Vec<ReadingRecord>>;

    /// Most recent readings, newest first.
    async fn latest(&self, limit: u32) -> Result<Vec<ReadingRecord>>;

    /// Most recently recorded balance, if any reading exists.
    async fn latest_balance(&self) -> Result<Option<f64>>;

    /// Append one run-history row.
    async fn append_run_log(&self, log: &RunLog) -> Result<()>;
}

/// Renders a day of readings into an image artifact for chart-capable
/// notification channels.
pub trait ChartRenderer: Send + Sync {
    /// Returns the path of the rendered artifact.
    fn render(&self, date: NaiveDate, records: &[ReadingRecord]) -> Result<PathBuf>;
}
