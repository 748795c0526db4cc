use async_trait::async_trait;

use crate::{AlertSignal, Result};

/// Delivers alert signals to a notification channel.
///
/// `NtfyNotifier` in `crates/notify` posts to an ntfy topic per group.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one signal on behalf of an alert group.
    async fn send(&self, group: &str, signal: &AlertSignal) -> Result<()>;
}
