//! Shared data model: balance readings, run outcomes, run logs.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portal login credentials, passed through to the extractor per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalCredentials {
    pub username: String,
    pub password: String,
}

/// One observed balance, as read off the portal page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceReading {
    /// Raw text the balance was parsed from, kept for diagnostics.
    pub raw_text: String,
    /// Parsed currency amount.
    pub amount: f64,
}

/// One persisted balance observation. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingRecord {
    /// Row id, assigned by storage on insert.
    pub id: Option<i64>,
    pub balance: f64,
    pub recorded_at: DateTime<Utc>,
    /// Id of the run that produced this reading.
    pub run_id: String,
}

impl ReadingRecord {
    pub fn new(balance: f64, run_id: &str) -> Self {
        Self {
            id: None,
            balance,
            recorded_at: Utc::now(),
            run_id: run_id.to_string(),
        }
    }
}

/// Why an extraction attempt failed, classified once at the portal boundary.
/// The executor never re-derives this; it only reads `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Captured page snapshot, when the portal client managed to save one.
    pub diagnostic: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Network or timeout class. Retrying without changing inputs may fix it.
    Transient,
    /// Rejected credentials or structural page change. Retrying cannot fix it.
    NonRetryable,
}

impl ExtractFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NonRetryable,
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, path: PathBuf) -> Self {
        self.diagnostic = Some(path);
        self
    }
}

impl std::fmt::Display for ExtractFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FailureKind::Transient => write!(f, "transient: {}", self.message),
            FailureKind::NonRetryable => write!(f, "non-retryable: {}", self.message),
        }
    }
}

/// Terminal status of one executor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Balance extracted and durably stored.
    Success,
    /// Balance extracted but not durably stored (or a downstream step failed).
    Partial,
    /// No balance obtained.
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Error => "error",
        }
    }
}

/// Result of one Task Executor invocation. Constructed once, immutable,
/// consumed by the notification router; only its ReadingRecord persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: RunStatus,
    pub run_id: String,
    pub attempts: u32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub records: Vec<ReadingRecord>,
    pub error: Option<String>,
    pub diagnostic: Option<PathBuf>,
}

impl TaskOutcome {
    pub fn success(run_id: String, attempts: u32, duration: Duration, record: ReadingRecord) -> Self {
        Self {
            status: RunStatus::Success,
            run_id,
            attempts,
            duration,
            records: vec![record],
            error: None,
            diagnostic: None,
        }
    }

    pub fn partial(
        run_id: String,
        attempts: u32,
        duration: Duration,
        record: ReadingRecord,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: RunStatus::Partial,
            run_id,
            attempts,
            duration,
            records: vec![record],
            error: Some(error.into()),
            diagnostic: None,
        }
    }

    pub fn error(
        run_id: String,
        attempts: u32,
        duration: Duration,
        error: impl Into<String>,
        diagnostic: Option<PathBuf>,
    ) -> Self {
        Self {
            status: RunStatus::Error,
            run_id,
            attempts,
            duration,
            records: Vec::new(),
            error: Some(error.into()),
            diagnostic,
        }
    }

    /// Outcome for an executor task that crashed instead of returning.
    /// Keeps ScheduleState consistent when a run panics.
    pub fn crashed(run_id: String, duration: Duration, reason: impl Into<String>) -> Self {
        Self::error(run_id, 0, duration, format!("executor crashed: {}", reason.into()), None)
    }

    /// First extracted balance, when the run produced one.
    pub fn balance(&self) -> Option<f64> {
        self.records.first().map(|r| r.balance)
    }
}

/// One row of run history, appended after every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub id: Option<i64>,
    pub at: DateTime<Utc>,
    pub status: RunStatus,
    pub records_count: u32,
    pub error: Option<String>,
    pub duration_secs: f64,
}

impl RunLog {
    pub fn from_outcome(outcome: &TaskOutcome) -> Self {
        Self {
            id: None,
            at: Utc::now(),
            status: outcome.status,
            records_count: outcome.records.len() as u32,
            error: outcome.error.clone(),
            duration_secs: outcome.duration.as_secs_f64(),
        }
    }
}

/// Run id generator. Wall-clock based, unique enough for log correlation.
pub fn run_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("run-{:x}-{:x}", t.as_secs(), t.subsec_nanos())
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
