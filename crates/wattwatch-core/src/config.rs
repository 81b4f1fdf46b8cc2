//! WattWatch configuration system.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WattError};
use crate::types::PortalCredentials;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WattConfig {
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl WattConfig {
    /// Load config from the default path (~/.wattwatch/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WattError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| WattError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| WattError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the WattWatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wattwatch")
    }

    /// Startup validation. The cron-gap side of the timeout budget ordering
    /// is checked by the scheduler, which owns the cron parser.
    pub fn validate(&self) -> Result<()> {
        if self.portal.username.is_empty() || self.portal.password.is_empty() {
            return Err(WattError::Config(
                "portal.username and portal.password are required".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(WattError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.attempt_timeout_secs == 0 {
            return Err(WattError::Config("retry.attempt_timeout_secs must be nonzero".into()));
        }
        if self.retry.backoff_base_secs > self.retry.backoff_max_secs {
            return Err(WattError::Config(
                "retry.backoff_base_secs must not exceed retry.backoff_max_secs".into(),
            ));
        }
        self.notify.policy.parse_window()?;
        Ok(())
    }

    pub fn credentials(&self) -> PortalCredentials {
        PortalCredentials {
            username: self.portal.username.clone(),
            password: self.portal.password.clone(),
        }
    }
}

/// Portal endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_account_path")]
    pub account_path: String,
    /// Label preceding the balance figure on the account page.
    #[serde(default = "default_balance_marker")]
    pub balance_marker: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_base_url() -> String { "https://portal.example.edu".into() }
fn default_login_path() -> String { "/login".into() }
fn default_account_path() -> String { "/account".into() }
fn default_balance_marker() -> String { "Prepaid balance".into() }

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            account_path: default_account_path(),
            balance_marker: default_balance_marker(),
            username: String::new(),
            password: String::new(),
        }
    }
}

/// Recurrence rules for the crawl and the daily rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// 5-field cron expression for the balance crawl.
    #[serde(default = "default_cron")]
    pub cron: String,
    /// 5-field cron expression for the daily summary.
    #[serde(default = "default_rollup_cron")]
    pub rollup_cron: String,
    #[serde(default = "bool_true")]
    pub run_on_startup: bool,
}

fn default_cron() -> String { "0 * * * *".into() }
fn default_rollup_cron() -> String { "0 8 * * *".into() }
fn bool_true() -> bool { true }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            rollup_cron: default_rollup_cron(),
            run_on_startup: true,
        }
    }
}

/// Retry and timeout budget for one executor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Per-attempt extraction timeout.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
    /// Backoff before attempt N is base * 2^(N-2), capped at backoff_max.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

fn default_max_attempts() -> u32 { 3 }
fn default_attempt_timeout() -> u64 { 60 }
fn default_backoff_base() -> u64 { 5 }
fn default_backoff_max() -> u64 { 60 }

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Backoff delay before retry number `attempt` (2-based; attempt 1 has none).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(2).min(16);
        let secs = self
            .backoff_base_secs
            .saturating_mul(1u64 << exp)
            .min(self.backoff_max_secs);
        Duration::from_secs(secs)
    }

    /// Deterministic upper bound on one executor run: every attempt hits its
    /// timeout and every backoff hits the cap. The scheduler checks this
    /// against the tick gap at startup.
    pub fn total_budget(&self) -> Duration {
        let attempts = u64::from(self.max_attempts);
        let per_attempt = self.attempt_timeout_secs;
        let backoffs = attempts.saturating_sub(1).saturating_mul(self.backoff_max_secs);
        Duration::from_secs(attempts.saturating_mul(per_attempt).saturating_add(backoffs))
    }
}

/// Storage paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Where diagnostic snapshots and chart artifacts land.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: String,
}

fn default_db_path() -> String { "~/.wattwatch/readings.db".into() }
fn default_artifact_dir() -> String { "~/.wattwatch/artifacts".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

/// Notification channels and dispatch policy. `min_level` strings are parsed
/// by the notify crate at registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub discord: Option<DiscordChannelConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramChannelConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookChannelConfig>,
    #[serde(default)]
    pub policy: NotifyPolicyConfig,
    /// Per-channel delivery timeout.
    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,
}

fn default_delivery_timeout() -> u64 { 10 }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            discord: None,
            telegram: None,
            webhook: None,
            policy: NotifyPolicyConfig::default(),
            delivery_timeout_secs: default_delivery_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordChannelConfig {
    pub webhook_url: String,
    #[serde(default = "default_min_level")]
    pub min_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChannelConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_min_level")]
    pub min_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookChannelConfig {
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default = "default_min_level")]
    pub min_level: String,
}

fn default_min_level() -> String { "info".into() }

/// When success notifications are allowed out. Errors and warnings always go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyPolicyConfig {
    /// Local time, HH:MM. Window may wrap past midnight.
    #[serde(default = "default_window_start")]
    pub window_start: String,
    #[serde(default = "default_window_end")]
    pub window_end: String,
    /// Balance success notifications only go out below this amount.
    #[serde(default = "default_balance_threshold")]
    pub balance_threshold: f64,
}

fn default_window_start() -> String { "06:00".into() }
fn default_window_end() -> String { "23:00".into() }
fn default_balance_threshold() -> f64 { 100.0 }

impl Default for NotifyPolicyConfig {
    fn default() -> Self {
        Self {
            window_start: default_window_start(),
            window_end: default_window_end(),
            balance_threshold: default_balance_threshold(),
        }
    }
}

impl NotifyPolicyConfig {
    /// Parse the window bounds, erroring on malformed HH:MM strings.
    pub fn parse_window(&self) -> Result<(chrono::NaiveTime, chrono::NaiveTime)> {
        let parse = |s: &str| {
            chrono::NaiveTime::parse_from_str(s, "%H:%M")
                .map_err(|e| WattError::Config(format!("bad notify window time '{s}': {e}")))
        };
        Ok((parse(&self.window_start)?, parse(&self.window_end)?))
    }
}

/// HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 8600 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let cfg: WattConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.schedule.cron, "0 * * * *");
        assert_eq!(cfg.retry.max_attempts, 3);
        assert!(cfg.notify.discord.is_none());
        assert_eq!(cfg.gateway.port, 8600);
    }

    #[test]
    fn test_section_overrides() {
        let cfg: WattConfig = toml::from_str(
            r#"
            [portal]
            username = "b10123456"
            password = "secret"

            [retry]
            max_attempts = 5
            backoff_base_secs = 2

            [notify.discord]
            webhook_url = "https://discord.com/api/webhooks/x"
            min_level = "warning"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.notify.discord.as_ref().unwrap().min_level, "warning");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let cfg = WattConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_attempts: 5,
            attempt_timeout_secs: 30,
            backoff_base_secs: 5,
            backoff_max_secs: 15,
        };
        assert_eq!(retry.backoff(2), Duration::from_secs(5));
        assert_eq!(retry.backoff(3), Duration::from_secs(10));
        assert_eq!(retry.backoff(4), Duration::from_secs(15));
        assert_eq!(retry.backoff(5), Duration::from_secs(15));
    }

    #[test]
    fn test_total_budget_is_worst_case() {
        let retry = RetryConfig {
            max_attempts: 3,
            attempt_timeout_secs: 60,
            backoff_base_secs: 5,
            backoff_max_secs: 60,
        };
        // 3 * 60s attempts + 2 * 60s capped backoffs
        assert_eq!(retry.total_budget(), Duration::from_secs(300));
    }
}
