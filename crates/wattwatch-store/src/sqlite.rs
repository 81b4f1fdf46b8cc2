//! SQLite storage backend. One connection behind a mutex; all timestamps
//! are stored as UTC RFC3339 text in a single format so range queries can
//! compare lexicographically.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, SecondsFormat, TimeZone, Utc};
use rusqlite::Connection;

use wattwatch_core::error::{Result, WattError};
use wattwatch_core::types::{ReadingRecord, RunLog};
use wattwatch_core::ReadingStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path).map_err(store_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                balance REAL NOT NULL,
                recorded_at TEXT NOT NULL,
                run_id TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_readings_recorded
                ON readings(recorded_at);
            CREATE TABLE IF NOT EXISTS run_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                at TEXT NOT NULL,
                status TEXT NOT NULL,
                records_count INTEGER DEFAULT 0,
                error TEXT,
                duration_secs REAL
            );",
        )
        .map_err(store_err)?;

        tracing::info!("🗄️ Reading store ready: {}", db_path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store. Test use.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                balance REAL NOT NULL,
                recorded_at TEXT NOT NULL,
                run_id TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                at TEXT NOT NULL,
                status TEXT NOT NULL,
                records_count INTEGER DEFAULT 0,
                error TEXT,
                duration_secs REAL
            );",
        )
        .map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_range(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<ReadingRecord>> {
        let conn = self.conn.lock().map_err(|e| WattError::Storage(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT id, balance, recorded_at, run_id FROM readings
                 WHERE recorded_at >= ?1 AND recorded_at < ?2
                 ORDER BY recorded_at ASC, id ASC",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map([fmt_ts(from), fmt_ts(until)], row_to_record)
            .map_err(store_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(store_err)
    }
}

#[async_trait]
impl ReadingStore for SqliteStore {
    async fn append(&self, record: &ReadingRecord) -> Result<ReadingRecord> {
        let conn = self.conn.lock().map_err(|e| WattError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO readings (balance, recorded_at, run_id) VALUES (?1, ?2, ?3)",
            rusqlite::params![record.balance, fmt_ts(record.recorded_at), record.run_id],
        )
        .map_err(store_err)?;
        let mut stored = record.clone();
        stored.id = Some(conn.last_insert_rowid());
        Ok(stored)
    }

    async fn query_day(&self, day: NaiveDate) -> Result<Vec<ReadingRecord>> {
        let (from, until) = local_day_bounds(day);
        self.query_range(from, until)
    }

    async fn query_yesterday(&self) -> Result<Vec<ReadingRecord>> {
        let yesterday = Local::now().date_naive() - Duration::days(1);
        self.query_day(yesterday).await
    }

    async fn latest(&self, limit: u32) -> Result<Vec<ReadingRecord>> {
        let conn = self.conn.lock().map_err(|e| WattError::Storage(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT id, balance, recorded_at, run_id FROM readings
                 ORDER BY recorded_at DESC, id DESC LIMIT ?1",
            )
            .map_err(store_err)?;
        let rows = stmt.query_map([limit], row_to_record).map_err(store_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn latest_balance(&self) -> Result<Option<f64>> {
        let conn = self.conn.lock().map_err(|e| WattError::Storage(e.to_string()))?;
        conn.query_row(
            "SELECT balance FROM readings ORDER BY recorded_at DESC, id DESC LIMIT 1",
            [],
            |r| r.get::<_, f64>(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(store_err(other)),
        })
    }

    async fn append_run_log(&self, log: &RunLog) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| WattError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO run_logs (at, status, records_count, error, duration_secs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                fmt_ts(log.at),
                log.status.as_str(),
                log.records_count,
                log.error,
                log.duration_secs,
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(e: rusqlite::Error) -> WattError {
    WattError::Storage(e.to_string())
}

/// Canonical timestamp format for storage and range bounds.
fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReadingRecord> {
    let ts: String = row.get(2)?;
    Ok(ReadingRecord {
        id: Some(row.get(0)?),
        balance: row.get(1)?,
        recorded_at: parse_ts(&ts),
        run_id: row.get(3)?,
    })
}

/// UTC bounds of one local calendar day.
fn local_day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let to_utc = |d: NaiveDate| {
        let midnight = d.and_hms_opt(0, 0, 0).expect("midnight is valid");
        Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
    };
    (to_utc(day), to_utc(day + Duration::days(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattwatch_core::types::RunStatus;

    fn record_at(balance: f64, at: DateTime<Utc>, run: &str) -> ReadingRecord {
        ReadingRecord {
            id: None,
            balance,
            recorded_at: at,
            run_id: run.into(),
        }
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stored = store
            .append(&ReadingRecord::new(432.1, "run-a"))
            .await
            .unwrap();
        assert!(stored.id.is_some());
        assert_eq!(store.latest_balance().await.unwrap(), Some(432.1));
        assert_eq!(store.latest(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_query_day_filters_and_orders() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (from, _) = local_day_bounds(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());

        store
            .append(&record_at(300.0, from + Duration::hours(9), "r1"))
            .await
            .unwrap();
        store
            .append(&record_at(310.0, from + Duration::hours(2), "r2"))
            .await
            .unwrap();
        // Next day, must not show up.
        store
            .append(&record_at(250.0, from + Duration::hours(30), "r3"))
            .await
            .unwrap();

        let day = store
            .query_day(NaiveDate::from_ymd_opt(2026, 3, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(day.len(), 2);
        // Oldest first regardless of insert order.
        assert_eq!(day[0].balance, 310.0);
        assert_eq!(day[1].balance, 300.0);
    }

    #[tokio::test]
    async fn test_empty_store_has_no_balance() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.latest_balance().await.unwrap(), None);
        assert!(store.latest(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_log_roundtrip_does_not_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let log = RunLog {
            id: None,
            at: Utc::now(),
            status: RunStatus::Error,
            records_count: 0,
            error: Some("login failed".into()),
            duration_secs: 12.5,
        };
        store.append_run_log(&log).await.unwrap();
    }
}
