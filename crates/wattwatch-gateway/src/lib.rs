//! # WattWatch Gateway
//! Small HTTP surface over the scheduler and the reading store: health,
//! status, manual crawl/rollup triggers, recent readings.

pub mod routes;
pub mod server;

pub use server::{build_router, serve, AppState};
