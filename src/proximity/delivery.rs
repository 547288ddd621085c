//! Outbound notification channel abstraction

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

use crate::types::NotificationRequest;

/// Why a delivery attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("notification rejected: {0}")]
    Rejected(String),
    #[error("delivery timed out after {0:?}")]
    TimedOut(Duration),
    #[error("notification channel unavailable")]
    Unavailable,
}

/// Where notifications are handed off (OS notification center, push
/// gateway, log sink).
///
/// `submit` resolves once the channel confirmed or refused the request.
/// The engine wraps each call in its own timeout.
#[async_trait]
pub trait NotificationChannel: Send + Sync + 'static {
    async fn submit(&self, request: NotificationRequest) -> Result<(), DeliveryError>;

    /// Human-readable name for logging.
    fn channel_name(&self) -> &str;
}

/// Channel that "delivers" by writing the notification to the log.
#[derive(Debug, Default)]
pub struct LogChannel {
    sent: AtomicU64,
}

impl LogChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications written so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn submit(&self, request: NotificationRequest) -> Result<(), DeliveryError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(seq = n, dedup_key = %request.dedup_key, "🔔 {}", request.title);
        for line in request.body.lines() {
            info!("   {}", line);
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_channel_counts_submissions() {
        let channel = LogChannel::new();
        let request = NotificationRequest {
            title: "t".to_string(),
            body: "line one\nline two".to_string(),
            dedup_key: "k".to_string(),
        };
        channel.submit(request.clone()).await.unwrap();
        channel.submit(request).await.unwrap();
        assert_eq!(channel.sent(), 2);
        assert_eq!(channel.channel_name(), "log");
    }

    #[test]
    fn error_messages() {
        assert_eq!(DeliveryError::Unavailable.to_string(), "notification channel unavailable");
        assert!(DeliveryError::TimedOut(Duration::from_secs(30))
            .to_string()
            .contains("30s"));
    }
}
