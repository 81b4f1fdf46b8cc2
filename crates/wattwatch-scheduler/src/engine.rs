//! Schedule engine: the single-flight runner behind both the cron tick and
//! manual triggers.
//!
//! The one correctness-critical invariant lives here: at most one crawl in
//! flight, enforced with an atomic test-and-set, never a check-then-set.
//! The guard is held for the whole executor call and released on every
//! path, including executor panics (normalized into a synthetic error
//! outcome so the run still logs and notifies).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use wattwatch_core::config::WattConfig;
use wattwatch_core::error::{Result, WattError};
use wattwatch_core::types::{run_id, PortalCredentials, RunLog, RunStatus, TaskOutcome};
use wattwatch_core::{ChartRenderer, ReadingStore};
use wattwatch_notify::NotifyRouter;

use crate::cron;
use crate::executor::TaskExecutor;
use crate::rollup;

/// Manual trigger rejected: a run is already in flight. Expected outcome,
/// not an error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyRunning;

impl std::fmt::Display for AlreadyRunning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a crawl is already running")
    }
}

/// Read-only copy of the schedule state for status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub stopped: bool,
    pub run_on_startup: bool,
    pub cron: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_status: Option<RunStatus>,
    pub last_error: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub next_rollup_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct RunState {
    last_run_at: Option<DateTime<Utc>>,
    last_status: Option<RunStatus>,
    last_error: Option<String>,
    next_run_at: Option<DateTime<Utc>>,
    next_rollup_at: Option<DateTime<Utc>>,
}

pub struct ScheduleEngine {
    cron_expr: String,
    rollup_expr: String,
    run_on_startup: bool,
    credentials: PortalCredentials,
    executor: TaskExecutor,
    router: Arc<NotifyRouter>,
    store: Arc<dyn ReadingStore>,
    renderer: Option<Arc<dyn ChartRenderer>>,
    /// The single-flight guard shared by tick and manual paths.
    running: AtomicBool,
    stopped: AtomicBool,
    shutdown: Notify,
    state: Mutex<RunState>,
}

impl ScheduleEngine {
    /// Build the engine, validating the schedule and the timeout budget
    /// ordering: per-attempt timeout < executor budget < tick gap.
    pub fn new(
        config: &WattConfig,
        executor: TaskExecutor,
        router: Arc<NotifyRouter>,
        store: Arc<dyn ReadingStore>,
        renderer: Option<Arc<dyn ChartRenderer>>,
    ) -> Result<Arc<Self>> {
        let now = Utc::now();
        for expr in [&config.schedule.cron, &config.schedule.rollup_cron] {
            if cron::next_run(expr, now).is_none() {
                return Err(WattError::Config(format!("invalid cron expression '{expr}'")));
            }
        }

        let budget = config.retry.total_budget();
        let gap = cron::tick_gap(&config.schedule.cron, now)
            .and_then(|g| g.to_std().ok())
            .ok_or_else(|| WattError::Config("could not derive schedule tick gap".into()))?;
        if budget >= gap {
            return Err(WattError::Config(format!(
                "executor budget {budget:?} exceeds the {gap:?} gap between scheduled runs; \
                 lower retry limits or widen the schedule"
            )));
        }

        Ok(Arc::new(Self {
            cron_expr: config.schedule.cron.clone(),
            rollup_expr: config.schedule.rollup_cron.clone(),
            run_on_startup: config.schedule.run_on_startup,
            credentials: config.credentials(),
            executor,
            router,
            store,
            renderer,
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown: Notify::new(),
            state: Mutex::new(RunState::default()),
        }))
    }

    /// The scheduler loop. Spawn this once; it exits after `stop()`.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            "⏰ Scheduler started (crawl '{}', rollup '{}')",
            self.cron_expr,
            self.rollup_expr
        );

        if self.run_on_startup {
            tracing::info!("🚀 Run-on-startup enabled, crawling now");
            if let Err(AlreadyRunning) = self.run_crawl("startup").await {
                tracing::warn!("Startup crawl skipped: already running");
            }
        }

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            let now = Utc::now();
            let next_crawl = cron::next_run(&self.cron_expr, now);
            let next_rollup = cron::next_run(&self.rollup_expr, now);
            {
                let mut state = self.state.lock().expect("state lock");
                state.next_run_at = next_crawl;
                state.next_rollup_at = next_rollup;
            }

            let (due_at, is_rollup) = match (next_crawl, next_rollup) {
                (Some(c), Some(r)) if r < c => (r, true),
                (Some(c), _) => (c, false),
                (None, Some(r)) => (r, true),
                (None, None) => {
                    tracing::error!("No further runs derivable from schedule, stopping loop");
                    break;
                }
            };

            let wait = (due_at - Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.shutdown.notified() => break,
            }
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            if is_rollup {
                self.run_rollup().await;
            } else if let Err(AlreadyRunning) = self.run_crawl("scheduler").await {
                // max one instance; a tick landing mid-run is dropped.
                tracing::warn!("⏭️ Scheduled crawl skipped: previous run still in flight");
            }
        }

        tracing::info!("⏹️ Scheduler stopped");
    }

    /// Trigger a crawl outside the schedule. Fails fast when one is in
    /// flight; never queues.
    pub async fn trigger_manual(&self) -> std::result::Result<TaskOutcome, AlreadyRunning> {
        tracing::info!("👆 Manual crawl triggered");
        self.run_crawl("manual").await
    }

    /// Run yesterday's rollup outside its schedule.
    pub async fn trigger_rollup(&self) -> Result<()> {
        tracing::info!("👆 Manual rollup triggered");
        rollup::run_rollup(
            self.store.as_ref(),
            self.renderer.as_deref(),
            &self.router,
        )
        .await
    }

    /// Snapshot of the schedule state. Never blocks on an in-flight run.
    pub fn status(&self) -> StatusSnapshot {
        let state = self.state.lock().expect("state lock");
        StatusSnapshot {
            is_running: self.running.load(Ordering::SeqCst),
            stopped: self.stopped.load(Ordering::SeqCst),
            run_on_startup: self.run_on_startup,
            cron: self.cron_expr.clone(),
            last_run_at: state.last_run_at,
            last_status: state.last_status,
            last_error: state.last_error.clone(),
            next_run_at: state.next_run_at,
            next_rollup_at: state.next_rollup_at,
        }
    }

    /// Stop honoring ticks. An in-flight run finishes on its own.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// One guarded crawl: acquire the flight guard, execute, release,
    /// record, notify. Tick, startup, and manual paths all come through
    /// here, so they can never overlap.
    async fn run_crawl(&self, source: &str) -> std::result::Result<TaskOutcome, AlreadyRunning> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AlreadyRunning);
        }

        let started = Instant::now();
        let executor = self.executor.clone();
        let credentials = self.credentials.clone();
        // Executed on its own task so a panic surfaces as a JoinError here
        // instead of tearing the loop down with the guard still held.
        let outcome = match tokio::spawn(async move { executor.execute(&credentials).await }).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("💥 Executor crashed: {e}");
                TaskOutcome::crashed(run_id(), started.elapsed(), e.to_string())
            }
        };
        self.running.store(false, Ordering::SeqCst);

        {
            let mut state = self.state.lock().expect("state lock");
            state.last_run_at = Some(Utc::now());
            state.last_status = Some(outcome.status);
            state.last_error = outcome.error.clone();
        }

        if let Err(e) = self.store.append_run_log(&RunLog::from_outcome(&outcome)).await {
            tracing::warn!("⚠️ Run log write failed: {e}");
        }
        self.router.notify_outcome(&outcome, source).await;

        Ok(outcome)
    }

    async fn run_rollup(&self) {
        if let Err(e) = rollup::run_rollup(
            self.store.as_ref(),
            self.renderer.as_deref(),
            &self.router,
        )
        .await
        {
            tracing::error!("❌ Daily rollup failed: {e}");
        }
    }
}
