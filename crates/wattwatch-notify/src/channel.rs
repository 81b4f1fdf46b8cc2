//! Channel abstraction. A channel owns its destination and its minimum
//! severity; everything else (text, severity, colors) arrives prebuilt.

use std::path::Path;

use async_trait::async_trait;

use wattwatch_core::error::Result;

use crate::levels::NotifyLevel;
use crate::message::Notification;

#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliveries below this severity are filtered out by the router.
    fn min_level(&self) -> NotifyLevel;

    async fn deliver(&self, notification: &Notification) -> Result<()>;

    /// Deliver a chart artifact. Channels without attachment support
    /// silently skip; the rollup text notification already went out.
    async fn deliver_chart(&self, _path: &Path, _description: &str) -> Result<()> {
        Ok(())
    }
}

/// Escape Telegram MarkdownV1 special characters.
pub(crate) fn escape_markdown(s: &str) -> String {
    s.replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace('`', "\\`")
}
