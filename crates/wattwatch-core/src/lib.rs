//! # WattWatch Core
//!
//! Shared foundation for the WattWatch balance monitor: configuration,
//! the error type, the reading/run data model, and the collaborator traits
//! every other crate implements or consumes.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::WattConfig;
pub use error::{Result, WattError};
pub use traits::{BalanceExtractor, ChartRenderer, ReadingStore};
pub use types::{
    BalanceReading, ExtractFailure, FailureKind, PortalCredentials, ReadingRecord, RunLog,
    RunStatus, TaskOutcome,
};
