//! Discord webhook channel. Embeds with the shared severity color, chart
//! upload via multipart attachment.

use std::path::Path;

use async_trait::async_trait;

use wattwatch_core::error::{Result, WattError};

use crate::channel::NotifyChannel;
use crate::levels::NotifyLevel;
use crate::message::Notification;

pub struct DiscordChannel {
    webhook_url: String,
    min_level: NotifyLevel,
    client: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(webhook_url: &str, min_level: NotifyLevel) -> Self {
        Self {
            webhook_url: webhook_url.to_string(),
            min_level,
            client: reqwest::Client::new(),
        }
    }

    fn embed(&self, notification: &Notification) -> serde_json::Value {
        let mut embed = serde_json::json!({
            "title": notification.title,
            "description": notification.body,
            "color": notification.level.color(),
            "timestamp": notification.timestamp.to_rfc3339(),
            "footer": { "text": format!("WattWatch • {}", notification.source) },
        });
        if let Some(record) = &notification.record {
            embed["fields"] = serde_json::json!([{
                "name": "Reading",
                "value": format!(
                    "Balance: {:.2}\nAt: {}",
                    record.balance, notification.local_time()
                ),
                "inline": false,
            }]);
        }
        embed
    }
}

#[async_trait]
impl NotifyChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn min_level(&self) -> NotifyLevel {
        self.min_level
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "embeds": [self.embed(notification)] }))
            .send()
            .await
            .map_err(|e| WattError::Notify(format!("Discord send failed: {e}")))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(WattError::Notify(format!("Discord webhook error {status}: {body}")))
        }
    }

    async fn deliver_chart(&self, path: &Path, description: &str) -> Result<()> {
        let bytes = std::fs::read(path)
            .map_err(|e| WattError::Notify(format!("chart file unreadable: {e}")))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.svg".to_string());

        let payload = serde_json::json!({
            "embeds": [{
                "title": description,
                "color": NotifyLevel::Success.color(),
                "image": { "url": format!("attachment://{filename}") },
                "footer": { "text": "WattWatch" },
            }]
        });

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            )
            .text("payload_json", payload.to_string());

        let resp = self
            .client
            .post(&self.webhook_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| WattError::Notify(format!("Discord chart upload failed: {e}")))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(WattError::Notify(format!(
                "Discord chart upload error {}",
                resp.status()
            )))
        }
    }
}
