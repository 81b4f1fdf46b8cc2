//! # WattWatch Store
//! Append-only reading history and run logs on SQLite, plus the daily
//! usage summary computed from a day of readings.

pub mod sqlite;
pub mod summary;

pub use sqlite::SqliteStore;
pub use summary::{DailySummary, UsageInterval};
