//! Generic HTTP webhook channel. Plain JSON POST for anything that is not
//! Discord or Telegram shaped.

use async_trait::async_trait;

use wattwatch_core::error::{Result, WattError};

use crate::channel::NotifyChannel;
use crate::levels::NotifyLevel;
use crate::message::Notification;

pub struct WebhookChannel {
    url: String,
    headers: Vec<(String, String)>,
    min_level: NotifyLevel,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: &str, headers: Vec<(String, String)>, min_level: NotifyLevel) -> Self {
        Self {
            url: url.to_string(),
            headers,
            min_level,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn min_level(&self) -> NotifyLevel {
        self.min_level
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let mut payload = serde_json::json!({
            "timestamp": notification.timestamp.to_rfc3339(),
            "title": notification.title,
            "message": notification.body,
            "level": notification.level.label(),
            "source": notification.source,
            "bot_name": "WattWatch",
        });
        if let Some(record) = &notification.record {
            payload["data"] = serde_json::json!({
                "balance": record.balance,
                "recorded_at": record.recorded_at.to_rfc3339(),
                "run_id": record.run_id,
            });
        }

        let mut req = self.client.post(&self.url).json(&payload);
        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WattError::Notify(format!("Webhook send failed: {e}")))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(WattError::Notify(format!("Webhook error {}", resp.status())))
        }
    }
}
