//! # WattWatch Extract
//! Portal-facing side of the bot: session login, balance page scrape,
//! failure classification, diagnostic snapshots.

pub mod portal;

pub use portal::PortalClient;
