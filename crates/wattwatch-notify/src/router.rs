//! Notification router: holds the registered channels, filters by severity,
//! fans deliveries out concurrently, and applies the success-notification
//! policy (quiet hours, low-balance threshold).
//!
//! Delivery failures are reported and logged, never raised; one channel
//! going dark must not silence the others or fail the run that notified.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use futures::future::join_all;

use wattwatch_core::config::NotifyConfig;
use wattwatch_core::error::Result;
use wattwatch_core::types::{RunStatus, TaskOutcome};
use wattwatch_store::DailySummary;

use crate::channel::NotifyChannel;
use crate::discord::DiscordChannel;
use crate::levels::NotifyLevel;
use crate::message::Notification;
use crate::telegram::TelegramChannel;
use crate::webhook::WebhookChannel;

/// Outcome of one delivery attempt to one channel.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub channel: String,
    pub ok: bool,
    pub error: Option<String>,
}

/// When success-level balance notifications may go out.
#[derive(Debug, Clone)]
pub struct NotifyPolicy {
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub balance_threshold: f64,
}

impl NotifyPolicy {
    pub fn always() -> Self {
        Self {
            window_start: NaiveTime::from_hms_opt(0, 0, 0).expect("valid time"),
            window_end: NaiveTime::from_hms_opt(23, 59, 59).expect("valid time"),
            balance_threshold: f64::INFINITY,
        }
    }

    /// Whether `now` falls inside the window. Windows may wrap midnight
    /// (23:00 to 06:00 means late evening through early morning).
    pub fn within_window(&self, now: NaiveTime) -> bool {
        if self.window_start <= self.window_end {
            self.window_start <= now && now <= self.window_end
        } else {
            now >= self.window_start || now <= self.window_end
        }
    }

    /// Whether a success notification for `balance` should go out now.
    pub fn allows_balance(&self, balance: f64, now: NaiveTime) -> bool {
        self.within_window(now) && balance < self.balance_threshold
    }
}

pub struct NotifyRouter {
    channels: Vec<Arc<dyn NotifyChannel>>,
    policy: NotifyPolicy,
    delivery_timeout: Duration,
}

impl NotifyRouter {
    pub fn new(policy: NotifyPolicy, delivery_timeout: Duration) -> Self {
        Self {
            channels: Vec::new(),
            policy,
            delivery_timeout,
        }
    }

    /// Build the router and its channels from config. Channels with empty
    /// destinations are skipped, not errors; running without any channel
    /// just means notifications land in the log only.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let (window_start, window_end) = config.policy.parse_window()?;
        let mut router = Self::new(
            NotifyPolicy {
                window_start,
                window_end,
                balance_threshold: config.policy.balance_threshold,
            },
            Duration::from_secs(config.delivery_timeout_secs),
        );

        if let Some(discord) = &config.discord
            && !discord.webhook_url.is_empty()
        {
            router.register(Arc::new(DiscordChannel::new(
                &discord.webhook_url,
                NotifyLevel::parse(&discord.min_level),
            )));
        }
        if let Some(telegram) = &config.telegram
            && !telegram.bot_token.is_empty()
            && !telegram.chat_id.is_empty()
        {
            router.register(Arc::new(TelegramChannel::new(
                &telegram.bot_token,
                &telegram.chat_id,
                NotifyLevel::parse(&telegram.min_level),
            )));
        }
        if let Some(webhook) = &config.webhook
            && !webhook.url.is_empty()
        {
            router.register(Arc::new(WebhookChannel::new(
                &webhook.url,
                webhook.headers.clone(),
                NotifyLevel::parse(&webhook.min_level),
            )));
        }

        Ok(router)
    }

    pub fn register(&mut self, channel: Arc<dyn NotifyChannel>) {
        tracing::info!(
            "📮 Notification channel registered: {} (min level {})",
            channel.name(),
            channel.min_level().label()
        );
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Dispatch to every channel whose threshold the severity meets.
    /// Deliveries run concurrently, each bounded by its own timeout; the
    /// call returns once all attempts finished or timed out.
    pub async fn notify(&self, notification: &Notification) -> Vec<DeliveryReport> {
        let eligible: Vec<_> = self
            .channels
            .iter()
            .filter(|c| c.min_level() <= notification.level)
            .cloned()
            .collect();

        if eligible.is_empty() {
            tracing::info!(
                "📭 No channel takes {} notifications, skipped: {}",
                notification.level.label(),
                notification.title
            );
            return Vec::new();
        }

        let timeout = self.delivery_timeout;
        let attempts = eligible.iter().map(|channel| {
            let channel = channel.clone();
            let notification = notification.clone();
            async move {
                let name = channel.name().to_string();
                match tokio::time::timeout(timeout, channel.deliver(&notification)).await {
                    Ok(Ok(())) => DeliveryReport {
                        channel: name,
                        ok: true,
                        error: None,
                    },
                    Ok(Err(e)) => DeliveryReport {
                        channel: name,
                        ok: false,
                        error: Some(e.to_string()),
                    },
                    Err(_) => DeliveryReport {
                        channel: name,
                        ok: false,
                        error: Some(format!("delivery timed out after {timeout:?}")),
                    },
                }
            }
        });

        let reports = join_all(attempts).await;
        for report in reports.iter().filter(|r| !r.ok) {
            tracing::warn!(
                "⚠️ Delivery to {} failed: {}",
                report.channel,
                report.error.as_deref().unwrap_or("unknown")
            );
        }
        reports
    }

    /// Dispatch the terminal notification for a finished run. Success
    /// notifications respect quiet hours and the balance threshold; partial
    /// and error outcomes always go out.
    pub async fn notify_outcome(&self, outcome: &TaskOutcome, source: &str) -> Vec<DeliveryReport> {
        if outcome.status == RunStatus::Success {
            let balance = outcome.balance().unwrap_or(0.0);
            let now = Local::now().time();
            if !self.policy.allows_balance(balance, now) {
                tracing::info!(
                    "🔕 Success notification suppressed (balance {:.2}, threshold {:.2}, window {}-{})",
                    balance,
                    self.policy.balance_threshold,
                    self.policy.window_start,
                    self.policy.window_end
                );
                return Vec::new();
            }
        }
        self.notify(&Notification::from_outcome(outcome, source)).await
    }

    pub async fn notify_startup(&self) -> Vec<DeliveryReport> {
        self.notify(&Notification::startup()).await
    }

    /// Dispatch the daily rollup; the chart, when present, goes to every
    /// chart-capable channel that received the text notification.
    pub async fn notify_summary(
        &self,
        summary: Option<&DailySummary>,
        chart: Option<&Path>,
    ) -> Vec<DeliveryReport> {
        let notification = Notification::daily_summary(summary);
        let reports = self.notify(&notification).await;

        if let (Some(path), Some(s)) = (chart, summary) {
            let description = format!("Usage chart {}", s.date);
            let delivered: Vec<_> = self
                .channels
                .iter()
                .filter(|c| c.min_level() <= notification.level)
                .cloned()
                .collect();
            let uploads = delivered.iter().map(|channel| {
                let channel = channel.clone();
                let path = path.to_path_buf();
                let description = description.clone();
                async move {
                    if let Err(e) = channel.deliver_chart(&path, &description).await {
                        tracing::warn!("⚠️ Chart upload to {} failed: {e}", channel.name());
                    }
                }
            });
            join_all(uploads).await;
        }

        reports
    }
}
