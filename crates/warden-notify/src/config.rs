//! Per-request notification settings.

use crate::url::WebhookUrl;

const REDACTED: &str = "[redacted]";

/// Snapshot of notification settings taken when a request starts.
///
/// The notifier never reads global settings itself; whoever owns the settings
/// builds a snapshot and hands it over with each event.
#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    webhook: Option<WebhookUrl>,
    secrets: Vec<String>,
}

impl NotifyConfig {
    /// A snapshot with no channel; nothing is delivered.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A snapshot delivering to `webhook`.
    ///
    /// The full webhook URL is registered as a secret.
    #[must_use]
    pub fn new(webhook: WebhookUrl) -> Self {
        let secret = webhook.expose().to_string();
        Self {
            webhook: Some(webhook),
            secrets: vec![secret],
        }
    }

    /// Register a value that must never appear in a message.
    #[must_use]
    pub fn with_secret(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.secrets.push(value);
        }
        self
    }

    /// The destination, if any.
    #[must_use]
    pub fn webhook(&self) -> Option<&WebhookUrl> {
        self.webhook.as_ref()
    }

    /// Replace every registered secret in `message`.
    #[must_use]
    pub fn redact(&self, message: &str) -> String {
        self.secrets
            .iter()
            .fold(message.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::UrlPolicy;

    #[test]
    fn test_redacts_webhook_and_secrets() {
        let raw = "https://discord.com/api/webhooks/1/token";
        let config = NotifyConfig::new(WebhookUrl::parse(raw, &UrlPolicy::default()).unwrap())
            .with_secret("hunter2")
            .with_secret("");

        let message = config.redact(&format!("Setting discord_webhook updated to {raw} (hunter2)"));
        assert_eq!(
            message,
            "Setting discord_webhook updated to [redacted] ([redacted])"
        );
    }

    #[test]
    fn test_disabled_has_no_webhook() {
        assert!(NotifyConfig::disabled().webhook().is_none());
        assert_eq!(NotifyConfig::disabled().redact("plain"), "plain");
    }
}
