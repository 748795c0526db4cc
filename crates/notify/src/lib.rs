//! Push notifications through an ntfy server.
//!
//! Every alert group gets its own topic, `{prefix}-{group}`, so subscribers
//! pick the groups they care about. Messages are plain-text POST bodies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use common::{AlertSignal, Config, Error, Notifier, Result};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Topic name for an alert group.
pub fn channel_name(prefix: &str, group: &str) -> String {
    format!("{prefix}-{group}")
}

/// Notification body: the signal text tagged with its group.
pub fn format_message(group: &str, signal: &AlertSignal) -> String {
    format!("[{group}] {}", signal.body())
}

pub struct NtfyNotifier {
    base_url: String,
    prefix: String,
    http: Client,
}

impl NtfyNotifier {
    pub fn new(base_url: impl Into<String>, prefix: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            prefix: prefix.into(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.ntfy_base_url, &config.ntfy_prefix)
    }

    pub fn topic_url(&self, group: &str) -> String {
        format!("{}/{}", self.base_url, channel_name(&self.prefix, group))
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn send(&self, group: &str, signal: &AlertSignal) -> Result<()> {
        let url = self.topic_url(group);
        let body = format_message(group, signal);
        debug!(%url, %body, "Posting notification");

        let resp = self
            .http
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Http(format!("HTTP {status} from {url}: {text}")));
        }
        Ok(())
    }
}
