//! Telegram Bot API channel. Severity shows as a glyph prefix since chat
//! text has no embed colors.

use std::path::Path;

use async_trait::async_trait;

use wattwatch_core::error::{Result, WattError};

use crate::channel::{escape_markdown, NotifyChannel};
use crate::levels::NotifyLevel;
use crate::message::Notification;

pub struct TelegramChannel {
    bot_token: String,
    chat_id: String,
    min_level: NotifyLevel,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: &str, chat_id: &str, min_level: NotifyLevel) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            min_level,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    async fn check_response(resp: reqwest::Response, what: &str) -> Result<()> {
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(WattError::Notify(format!("Telegram {what} error {status}: {body}")))
        }
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn min_level(&self) -> NotifyLevel {
        self.min_level
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let text = format!(
            "{} *{}*\n\n{}\n\n_{} • {}_",
            notification.level.glyph(),
            escape_markdown(&notification.title),
            escape_markdown(&notification.body),
            escape_markdown(&notification.source),
            notification.local_time(),
        );

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .map_err(|e| WattError::Notify(format!("Telegram send failed: {e}")))?;
        Self::check_response(resp, "sendMessage").await
    }

    async fn deliver_chart(&self, path: &Path, description: &str) -> Result<()> {
        let bytes = std::fs::read(path)
            .map_err(|e| WattError::Notify(format!("chart file unreadable: {e}")))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chart.svg".to_string());

        let form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", description.to_string())
            .part(
                "document",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            );

        let resp = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| WattError::Notify(format!("Telegram chart upload failed: {e}")))?;
        Self::check_response(resp, "sendDocument").await
    }
}
