//! WattWatch error type. One variant per subsystem so callers can tell
//! a portal failure from a storage failure without string matching.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WattError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Portal error: {0}")]
    Portal(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notify error: {0}")]
    Notify(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WattError>;
