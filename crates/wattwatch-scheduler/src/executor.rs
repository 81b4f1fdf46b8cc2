//! Task executor: one crawl run as a bounded retry loop.
//!
//! The loop is the whole control flow. Each attempt is timeout-bounded; the
//! failure's own classification decides retry vs short-circuit. Individual
//! failed attempts are not reported anywhere, only the terminal outcome is.

use std::sync::Arc;
use std::time::Instant;

use wattwatch_core::config::RetryConfig;
use wattwatch_core::types::{
    run_id, ExtractFailure, FailureKind, PortalCredentials, ReadingRecord, TaskOutcome,
};
use wattwatch_core::{BalanceExtractor, ReadingStore};

#[derive(Clone)]
pub struct TaskExecutor {
    extractor: Arc<dyn BalanceExtractor>,
    store: Arc<dyn ReadingStore>,
    retry: RetryConfig,
}

impl TaskExecutor {
    pub fn new(
        extractor: Arc<dyn BalanceExtractor>,
        store: Arc<dyn ReadingStore>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            extractor,
            store,
            retry,
        }
    }

    /// Run one crawl. Never blocks past the configured budget: the sum of
    /// attempt timeouts plus backoffs is `retry.total_budget()`.
    pub async fn execute(&self, credentials: &PortalCredentials) -> TaskOutcome {
        let id = run_id();
        let started = Instant::now();
        tracing::info!("🕷️ Crawl {id} started");

        let mut attempts = 0u32;
        let mut last_failure: Option<ExtractFailure> = None;
        let mut reading = None;

        for attempt in 1..=self.retry.max_attempts {
            attempts = attempt;
            if attempt > 1 {
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }

            let budget = self.retry.attempt_timeout();
            match tokio::time::timeout(budget, self.extractor.extract(credentials, budget)).await {
                Ok(Ok(value)) => {
                    reading = Some(value);
                    break;
                }
                Ok(Err(failure)) => {
                    tracing::debug!("Attempt {attempt} failed: {failure}");
                    let short_circuit = failure.kind == FailureKind::NonRetryable;
                    last_failure = Some(failure);
                    if short_circuit {
                        break;
                    }
                }
                Err(_) => {
                    tracing::debug!("Attempt {attempt} timed out after {budget:?}");
                    last_failure = Some(ExtractFailure::transient(format!(
                        "attempt timed out after {budget:?}"
                    )));
                }
            }
        }

        let Some(reading) = reading else {
            let failure = last_failure
                .unwrap_or_else(|| ExtractFailure::transient("no extraction attempt was made"));
            // Prefer the artifact the failure already carries; otherwise ask
            // the extractor for one last capture.
            let diagnostic = match failure.diagnostic.clone() {
                Some(path) => Some(path),
                None => self.extractor.capture_diagnostic().await,
            };
            let outcome =
                TaskOutcome::error(id, attempts, started.elapsed(), failure.to_string(), diagnostic);
            tracing::error!(
                "❌ Crawl {} failed after {} attempt(s): {}",
                outcome.run_id,
                attempts,
                failure
            );
            return outcome;
        };

        // Exactly one storage write attempt per obtained value. A failed
        // write is Partial, never a re-extraction.
        let record = ReadingRecord::new(reading.amount, &id);
        match self.store.append(&record).await {
            Ok(stored) => {
                tracing::info!(
                    "✅ Crawl {id} succeeded: balance {:.2} ({} attempt(s), {:.2}s)",
                    stored.balance,
                    attempts,
                    started.elapsed().as_secs_f64()
                );
                TaskOutcome::success(id, attempts, started.elapsed(), stored)
            }
            Err(e) => {
                tracing::error!("🟡 Crawl {id}: balance read but storage failed: {e}");
                TaskOutcome::partial(
                    id,
                    attempts,
                    started.elapsed(),
                    record,
                    format!("storage append failed: {e}"),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use wattwatch_core::error::{Result, WattError};
    use wattwatch_core::types::{BalanceReading, RunLog, RunStatus};

    struct ScriptedExtractor {
        script: Mutex<VecDeque<std::result::Result<BalanceReading, ExtractFailure>>>,
        calls: AtomicU32,
        diagnostic: Option<PathBuf>,
    }

    impl ScriptedExtractor {
        fn new(script: Vec<std::result::Result<BalanceReading, ExtractFailure>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
                diagnostic: None,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BalanceExtractor for ScriptedExtractor {
        async fn extract(
            &self,
            _credentials: &PortalCredentials,
            _timeout: Duration,
        ) -> std::result::Result<BalanceReading, ExtractFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ExtractFailure::transient("script exhausted")))
        }

        async fn capture_diagnostic(&self) -> Option<PathBuf> {
            self.diagnostic.clone()
        }
    }

    struct MemStore {
        records: Mutex<Vec<ReadingRecord>>,
        fail_append: bool,
    }

    impl MemStore {
        fn new(fail_append: bool) -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                fail_append,
            }
        }
    }

    #[async_trait]
    impl ReadingStore for MemStore {
        async fn append(&self, record: &ReadingRecord) -> Result<ReadingRecord> {
            if self.fail_append {
                return Err(WattError::Storage("disk full".into()));
            }
            let mut records = self.records.lock().unwrap();
            let mut stored = record.clone();
            stored.id = Some(records.len() as i64 + 1);
            records.push(stored.clone());
            Ok(stored)
        }

        async fn query_day(&self, day: NaiveDate) -> Result<Vec<ReadingRecord>> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.recorded_at.date_naive() == day)
                .cloned()
                .collect())
        }

        async fn query_yesterday(&self) -> Result<Vec<ReadingRecord>> {
            Ok(Vec::new())
        }

        async fn latest(&self, limit: u32) -> Result<Vec<ReadingRecord>> {
            let records = self.records.lock().unwrap();
            Ok(records.iter().rev().take(limit as usize).cloned().collect())
        }

        async fn latest_balance(&self) -> Result<Option<f64>> {
            Ok(self.records.lock().unwrap().last().map(|r| r.balance))
        }

        async fn append_run_log(&self, _log: &RunLog) -> Result<()> {
            Ok(())
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            attempt_timeout_secs: 5,
            backoff_base_secs: 0,
            backoff_max_secs: 0,
        }
    }

    fn reading(amount: f64) -> std::result::Result<BalanceReading, ExtractFailure> {
        Ok(BalanceReading {
            raw_text: format!("{amount}"),
            amount,
        })
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Err(ExtractFailure::transient("timeout")),
            Err(ExtractFailure::transient("connection reset")),
            reading(1234.56),
        ]));
        let store = Arc::new(MemStore::new(false));
        let executor = TaskExecutor::new(extractor.clone(), store.clone(), fast_retry(3));

        let outcome = executor
            .execute(&PortalCredentials {
                username: "u".into(),
                password: "p".into(),
            })
            .await;

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(extractor.calls(), 3);
        assert_eq!(outcome.balance(), Some(1234.56));
        let stored = store.records.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].balance, 1234.56);
    }

    #[tokio::test]
    async fn test_storage_failure_is_partial() {
        let extractor = Arc::new(ScriptedExtractor::new(vec![reading(500.0)]));
        let store = Arc::new(MemStore::new(true));
        let executor = TaskExecutor::new(extractor, store.clone(), fast_retry(3));

        let outcome = executor
            .execute(&PortalCredentials {
                username: "u".into(),
                password: "p".into(),
            })
            .await;

        assert_eq!(outcome.status, RunStatus::Partial);
        assert_eq!(outcome.balance(), Some(500.0));
        assert!(outcome.error.as_deref().unwrap().contains("storage append failed"));
        // Nothing visible to a later day query.
        let day = store
            .query_day(chrono::Utc::now().date_naive())
            .await
            .unwrap();
        assert!(day.is_empty());
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let extractor = Arc::new(ScriptedExtractor::new(vec![
            Err(ExtractFailure::non_retryable("invalid credentials")),
            reading(999.0),
        ]));
        let store = Arc::new(MemStore::new(false));
        let executor = TaskExecutor::new(extractor.clone(), store.clone(), fast_retry(3));

        let outcome = executor
            .execute(&PortalCredentials {
                username: "u".into(),
                password: "bad".into(),
            })
            .await;

        assert_eq!(outcome.status, RunStatus::Error);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(extractor.calls(), 1);
        assert!(outcome.error.as_deref().unwrap().contains("non-retryable"));
        assert!(outcome.error.as_deref().unwrap().contains("invalid credentials"));
        assert!(outcome.records.is_empty());
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_transient_attempts_exhausted() {
        let extractor = Arc::new(ScriptedExtractor {
            script: Mutex::new(
                vec![
                    Err(ExtractFailure::transient("t1")),
                    Err(ExtractFailure::transient("t2")),
                    Err(ExtractFailure::transient("t3")),
                ]
                .into(),
            ),
            calls: AtomicU32::new(0),
            diagnostic: Some(PathBuf::from("/tmp/snapshot.html")),
        });
        let store = Arc::new(MemStore::new(false));
        let executor = TaskExecutor::new(extractor.clone(), store, fast_retry(3));

        let outcome = executor
            .execute(&PortalCredentials {
                username: "u".into(),
                password: "p".into(),
            })
            .await;

        assert_eq!(outcome.status, RunStatus::Error);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(extractor.calls(), 3);
        // Final failure pulled a diagnostic capture from the extractor.
        assert_eq!(outcome.diagnostic, Some(PathBuf::from("/tmp/snapshot.html")));
    }
}
