//! Delivery channels.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{NotifyError, NotifyResult};
use crate::url::WebhookUrl;

/// Something that can carry a notification message to a destination.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Deliver `message` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails. The notifier logs and drops it.
    async fn deliver(&self, destination: &WebhookUrl, message: &str) -> NotifyResult<()>;
}

/// Posts `{"content": message}` as JSON to the webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Create a channel whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Delivery`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> NotifyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn deliver(&self, destination: &WebhookUrl, message: &str) -> NotifyResult<()> {
        let body = serde_json::json!({ "content": message });
        let response = self
            .client
            .post(destination.expose().clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
