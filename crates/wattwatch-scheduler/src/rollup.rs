//! Daily rollup: aggregate yesterday's readings, chart them, and send the
//! summary. Read-only against storage, so it does not take the crawl guard.

use chrono::{Duration, Local};

use wattwatch_core::error::Result;
use wattwatch_core::{ChartRenderer, ReadingStore};
use wattwatch_notify::NotifyRouter;
use wattwatch_store::DailySummary;

pub async fn run_rollup(
    store: &dyn ReadingStore,
    renderer: Option<&dyn ChartRenderer>,
    router: &NotifyRouter,
) -> Result<()> {
    let yesterday = Local::now().date_naive() - Duration::days(1);
    let records = store.query_yesterday().await?;
    tracing::info!("📊 Rollup for {}: {} reading(s)", yesterday, records.len());

    let summary = DailySummary::from_records(yesterday, &records);

    let chart = match (&summary, renderer) {
        (Some(s), Some(r)) if s.has_usage() => match r.render(yesterday, &records) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("⚠️ Chart rendering failed, sending summary without it: {e}");
                None
            }
        },
        _ => None,
    };

    router.notify_summary(summary.as_ref(), chart.as_deref()).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use wattwatch_core::error::WattError;
    use wattwatch_core::types::{ReadingRecord, RunLog};
    use wattwatch_notify::{Notification, NotifyChannel, NotifyLevel, NotifyPolicy};

    struct YesterdayStore {
        records: Vec<ReadingRecord>,
    }

    #[async_trait]
    impl ReadingStore for YesterdayStore {
        async fn append(&self, _r: &ReadingRecord) -> wattwatch_core::error::Result<ReadingRecord> {
            Err(WattError::Storage("read-only".into()))
        }

        async fn query_day(
            &self,
            _day: NaiveDate,
        ) -> wattwatch_core::error::Result<Vec<ReadingRecord>> {
            Ok(self.records.clone())
        }

        async fn query_yesterday(&self) -> wattwatch_core::error::Result<Vec<ReadingRecord>> {
            Ok(self.records.clone())
        }

        async fn latest(&self, _limit: u32) -> wattwatch_core::error::Result<Vec<ReadingRecord>> {
            Ok(Vec::new())
        }

        async fn latest_balance(&self) -> wattwatch_core::error::Result<Option<f64>> {
            Ok(None)
        }

        async fn append_run_log(&self, _log: &RunLog) -> wattwatch_core::error::Result<()> {
            Ok(())
        }
    }

    struct RecordingChannel {
        texts: Arc<AtomicU32>,
        charts: Arc<AtomicU32>,
        last_body: Arc<Mutex<String>>,
    }

    #[async_trait]
    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn min_level(&self) -> NotifyLevel {
            NotifyLevel::Debug
        }

        async fn deliver(&self, n: &Notification) -> wattwatch_core::error::Result<()> {
            self.texts.fetch_add(1, Ordering::SeqCst);
            *self.last_body.lock().unwrap() = n.body.clone();
            Ok(())
        }

        async fn deliver_chart(
            &self,
            _path: &Path,
            _description: &str,
        ) -> wattwatch_core::error::Result<()> {
            self.charts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FixedChart {
        path: PathBuf,
    }

    impl ChartRenderer for FixedChart {
        fn render(
            &self,
            _date: NaiveDate,
            _records: &[ReadingRecord],
        ) -> wattwatch_core::error::Result<PathBuf> {
            Ok(self.path.clone())
        }
    }

    fn reading(balance: f64, hours_ago: i64) -> ReadingRecord {
        ReadingRecord {
            id: None,
            balance,
            recorded_at: Utc::now() - Duration::hours(hours_ago),
            run_id: "run-r".into(),
        }
    }

    fn recording_router() -> (NotifyRouter, Arc<AtomicU32>, Arc<AtomicU32>, Arc<Mutex<String>>) {
        let texts = Arc::new(AtomicU32::new(0));
        let charts = Arc::new(AtomicU32::new(0));
        let last_body = Arc::new(Mutex::new(String::new()));
        let mut router = NotifyRouter::new(NotifyPolicy::always(), std::time::Duration::from_secs(1));
        router.register(Arc::new(RecordingChannel {
            texts: texts.clone(),
            charts: charts.clone(),
            last_body: last_body.clone(),
        }));
        (router, texts, charts, last_body)
    }

    #[tokio::test]
    async fn test_rollup_sends_summary_and_chart() {
        let store = YesterdayStore {
            records: vec![reading(500.0, 26), reading(495.0, 25)],
        };
        let chart = FixedChart {
            path: PathBuf::from("/tmp/chart.svg"),
        };
        let (router, texts, charts, body) = recording_router();

        run_rollup(&store, Some(&chart), &router).await.unwrap();

        assert_eq!(texts.load(Ordering::SeqCst), 1);
        assert_eq!(charts.load(Ordering::SeqCst), 1);
        assert!(body.lock().unwrap().contains("Total usage: 5.00"));
    }

    #[tokio::test]
    async fn test_rollup_without_data_still_notifies() {
        let store = YesterdayStore { records: vec![] };
        let (router, texts, charts, body) = recording_router();

        run_rollup(&store, None, &router).await.unwrap();

        assert_eq!(texts.load(Ordering::SeqCst), 1);
        assert_eq!(charts.load(Ordering::SeqCst), 0);
        assert!(body.lock().unwrap().contains("Not enough readings"));
    }
}
