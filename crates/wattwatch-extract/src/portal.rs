//! Portal client: cookie-session login and balance extraction.
//!
//! Failures are classified here, once, at the boundary. The executor only
//! looks at `FailureKind` and never inspects raw HTTP errors.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;

use wattwatch_core::config::PortalConfig;
use wattwatch_core::types::{BalanceReading, ExtractFailure, PortalCredentials};
use wattwatch_core::BalanceExtractor;

/// Reqwest-backed portal session. One client, cookie jar enabled, so the
/// login cookie carries over to the account page fetch.
pub struct PortalClient {
    config: PortalConfig,
    client: reqwest::Client,
    artifact_dir: PathBuf,
    /// Body of the last page fetched, kept for diagnostic capture.
    last_page: Mutex<Option<String>>,
    /// Pacing delay bounds before submitting the login form, in ms.
    login_pacing_ms: (u64, u64),
}

impl PortalClient {
    pub fn new(config: PortalConfig, artifact_dir: &Path) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            client,
            artifact_dir: artifact_dir.to_path_buf(),
            last_page: Mutex::new(None),
            login_pacing_ms: (3000, 7000),
        }
    }

    /// Disable the anti-hammering login delay. Test use.
    pub fn without_pacing(mut self) -> Self {
        self.login_pacing_ms = (0, 0);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn remember_page(&self, body: &str) {
        if let Ok(mut guard) = self.last_page.lock() {
            *guard = Some(body.to_string());
        }
    }

    /// Classify a transport-level error. Timeouts and connection drops are
    /// worth retrying; anything else from the request builder is not.
    fn classify_transport(e: reqwest::Error, what: &str) -> ExtractFailure {
        if e.is_timeout() || e.is_connect() {
            ExtractFailure::transient(format!("{what}: {e}"))
        } else {
            ExtractFailure::non_retryable(format!("{what}: {e}"))
        }
    }

    /// Log in and leave the session cookie in the jar.
    async fn login(
        &self,
        credentials: &PortalCredentials,
        timeout: Duration,
    ) -> Result<(), ExtractFailure> {
        // Pace the form submit so the portal does not see instant logins.
        let (lo, hi) = self.login_pacing_ms;
        if hi > 0 {
            let wait = rand::thread_rng().gen_range(lo..=hi);
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }

        let resp = self
            .client
            .post(self.url(&self.config.login_path))
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::classify_transport(e, "login request failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Self::classify_transport(e, "login response unreadable"))?;
        self.remember_page(&body);

        if status.is_server_error() {
            return Err(ExtractFailure::transient(format!("login returned {status}")));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ExtractFailure::non_retryable(format!(
                "credentials rejected ({status})"
            )));
        }
        if !status.is_success() {
            return Err(ExtractFailure::non_retryable(format!("login returned {status}")));
        }

        // Some portals answer 200 with the login form re-rendered on bad
        // credentials. Treat an error banner as a rejection.
        let lower = body.to_lowercase();
        if lower.contains("invalid username") || lower.contains("invalid password") || lower.contains("login failed") {
            return Err(ExtractFailure::non_retryable("credentials rejected by portal"));
        }

        tracing::debug!("🔑 Portal login accepted ({status})");
        Ok(())
    }

    /// Fetch the account page and pull the balance out of it.
    async fn fetch_balance(&self, timeout: Duration) -> Result<BalanceReading, ExtractFailure> {
        let resp = self
            .client
            .get(self.url(&self.config.account_path))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::classify_transport(e, "account page fetch failed"))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Self::classify_transport(e, "account page unreadable"))?;
        self.remember_page(&body);

        if status.is_server_error() {
            return Err(ExtractFailure::transient(format!("account page returned {status}")));
        }
        if !status.is_success() {
            return Err(ExtractFailure::non_retryable(format!("account page returned {status}")));
        }

        match extract_amount(&body, &self.config.balance_marker) {
            Some(reading) => {
                tracing::info!("💡 Balance read: {} ({})", reading.amount, reading.raw_text.trim());
                Ok(reading)
            }
            None => Err(ExtractFailure::non_retryable(format!(
                "balance marker '{}' not found on account page",
                self.config.balance_marker
            ))),
        }
    }
}

#[async_trait]
impl BalanceExtractor for PortalClient {
    async fn extract(
        &self,
        credentials: &PortalCredentials,
        timeout: Duration,
    ) -> Result<BalanceReading, ExtractFailure> {
        self.login(credentials, timeout).await?;
        self.fetch_balance(timeout).await
    }

    async fn capture_diagnostic(&self) -> Option<PathBuf> {
        let body = self.last_page.lock().ok()?.clone()?;
        let name = format!("snapshot_{}.html", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.artifact_dir.join(name);
        if let Err(e) = std::fs::create_dir_all(&self.artifact_dir) {
            tracing::warn!("⚠️ Could not create artifact dir: {e}");
            return None;
        }
        match std::fs::write(&path, body) {
            Ok(()) => {
                tracing::info!("📸 Diagnostic snapshot saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("⚠️ Snapshot write failed: {e}");
                None
            }
        }
    }
}

/// Find the first currency amount after `marker` in the page text.
/// Falls back to the first amount anywhere when the marker carries the
/// figure inside the same tag and the offset search misses it.
pub fn extract_amount(page: &str, marker: &str) -> Option<BalanceReading> {
    let re = Regex::new(r"-?\d+(?:,\d{3})*(?:\.\d+)?").ok()?;

    let start = page.find(marker)? + marker.len();
    // Search only a short window after the marker; keep the cut on a char
    // boundary since portal pages mix in multi-byte text.
    let mut end = (start + 200).min(page.len());
    while !page.is_char_boundary(end) {
        end -= 1;
    }
    let scope = &page[start..end];

    let m = re.find(scope)?;
    let raw = m.as_str().to_string();
    let amount: f64 = raw.replace(',', "").parse().ok()?;
    Some(BalanceReading { raw_text: raw, amount })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_amount_plain() {
        let page = "<li><span>Prepaid balance</span><span>: 1234.56 NTD</span></li>";
        let reading = extract_amount(page, "Prepaid balance").unwrap();
        assert_eq!(reading.amount, 1234.56);
    }

    #[test]
    fn test_extract_amount_with_thousands_separator() {
        let page = "Prepaid balance: $12,345.60";
        let reading = extract_amount(page, "Prepaid balance").unwrap();
        assert_eq!(reading.amount, 12345.60);
        assert_eq!(reading.raw_text, "12,345.60");
    }

    #[test]
    fn test_extract_amount_negative() {
        let page = "Prepaid balance: -5.25";
        let reading = extract_amount(page, "Prepaid balance").unwrap();
        assert_eq!(reading.amount, -5.25);
    }

    #[test]
    fn test_extract_amount_missing_marker() {
        assert!(extract_amount("<html>maintenance page</html>", "Prepaid balance").is_none());
    }

    #[test]
    fn test_failure_classification_constructors() {
        use wattwatch_core::FailureKind;
        assert_eq!(ExtractFailure::transient("t").kind, FailureKind::Transient);
        assert_eq!(
            ExtractFailure::non_retryable("n").kind,
            FailureKind::NonRetryable
        );
    }
}
