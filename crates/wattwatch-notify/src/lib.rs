//! # WattWatch Notify
//!
//! Severity-filtered, multi-channel notification dispatch.
//!
//! ```text
//! TaskOutcome ──> Notification (shared skeleton, severity mapped once)
//!                    │
//!                    ▼
//!              NotifyRouter ── min-level filter per channel
//!                    ├── Discord (webhook embed, color lookup)
//!                    ├── Telegram (sendMessage, glyph prefix)
//!                    └── Webhook (plain JSON POST)
//! ```
//!
//! Channels only reshape the skeleton into their wire format; filtering,
//! severity mapping, and display attributes live in one place.

pub mod channel;
pub mod discord;
pub mod levels;
pub mod message;
pub mod router;
pub mod telegram;
pub mod webhook;

pub use channel::NotifyChannel;
pub use discord::DiscordChannel;
pub use levels::NotifyLevel;
pub use message::Notification;
pub use router::{DeliveryReport, NotifyPolicy, NotifyRouter};
pub use telegram::TelegramChannel;
pub use webhook::WebhookChannel;
