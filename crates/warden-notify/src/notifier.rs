//! Fire-and-forget dispatch.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use warden_audit::AuditEntry;

use crate::channel::{NotificationChannel, WebhookChannel};
use crate::config::NotifyConfig;
use crate::error::{NotifyError, NotifyResult};
use crate::event::NotificationEvent;
use crate::url::WebhookUrl;

/// Default per-delivery timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Sends notifications for audit entries without blocking the caller.
///
/// Each delivery runs on its own detached task bounded by a timeout. Failures
/// are logged and dropped.
#[derive(Clone)]
pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    timeout: Duration,
    enabled: bool,
}

impl Notifier {
    /// Create a notifier over `channel`.
    #[must_use]
    pub fn new(channel: Arc<dyn NotificationChannel>, timeout: Duration) -> Self {
        Self {
            channel,
            timeout,
            enabled: true,
        }
    }

    /// Create a notifier posting to webhooks over HTTP.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn webhook(timeout: Duration) -> NotifyResult<Self> {
        Ok(Self::new(Arc::new(WebhookChannel::new(timeout)?), timeout))
    }

    /// A notifier that never delivers.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            channel: Arc::new(NullChannel),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            enabled: false,
        }
    }

    /// Turn delivery on or off.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether delivery is on.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start delivering the notification for `entry`, if any.
    ///
    /// Returns the handle of the spawned delivery task, or `None` when
    /// nothing was sent: the kind is silent, no webhook is configured,
    /// delivery is off, or no async runtime is running. Callers may drop the
    /// handle.
    pub fn dispatch(&self, config: &NotifyConfig, entry: &AuditEntry) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let event = NotificationEvent::project(entry)?;
        let Some(destination) = config.webhook().cloned() else {
            debug!(kind = %event.kind, "No webhook configured; notification skipped");
            return None;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(kind = %event.kind, "No async runtime; notification skipped");
            return None;
        };

        let message = config.redact(&event.message);
        let channel = Arc::clone(&self.channel);
        let timeout = self.timeout;
        let kind = event.kind;

        Some(runtime.spawn(async move {
            let delivery = channel.deliver(&destination, &message);
            let result = tokio::time::timeout(timeout, delivery)
                .await
                .unwrap_or(Err(NotifyError::Timeout(timeout.as_secs())));
            match result {
                Ok(()) => {
                    debug!(kind = %kind, host = destination.host(), "Notification delivered");
                },
                Err(e) => {
                    warn!(
                        kind = %kind,
                        host = destination.host(),
                        error = %e,
                        "Notification failed"
                    );
                },
            }
        }))
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

struct NullChannel;

#[async_trait::async_trait]
impl NotificationChannel for NullChannel {
    async fn deliver(&self, _destination: &WebhookUrl, _message: &str) -> NotifyResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::UrlPolicy;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use warden_audit::{AuditKind, AuditRecord};
    use warden_crypto::{ContentHash, KeyPair};

    #[derive(Default)]
    struct Recording {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        async fn deliver(&self, _destination: &WebhookUrl, message: &str) -> NotifyResult<()> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Hanging;

    #[async_trait]
    impl NotificationChannel for Hanging {
        async fn deliver(&self, _destination: &WebhookUrl, _message: &str) -> NotifyResult<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn config() -> NotifyConfig {
        NotifyConfig::new(
            WebhookUrl::parse(
                "https://discord.com/api/webhooks/1/token",
                &UrlPolicy::default(),
            )
            .unwrap(),
        )
    }

    fn entry(kind: AuditKind, payload: serde_json::Value) -> AuditEntry {
        AuditEntry::create(
            AuditRecord::new(kind).target("identity:1").payload(payload),
            1,
            ContentHash::zero(),
            &KeyPair::generate(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_delivers_redacted_message() {
        let channel = Arc::new(Recording::default());
        let notifier = Notifier::new(channel.clone(), Duration::from_secs(1));
        let config = config().with_secret("s3cret");

        let handle = notifier
            .dispatch(&config, &entry(AuditKind::Ban, serde_json::json!({"reason": "s3cret"})))
            .unwrap();
        handle.await.unwrap();

        let messages = channel.messages.lock().unwrap();
        assert_eq!(messages.as_slice(), ["User identity:1 banned by system: [redacted]"]);
    }

    #[tokio::test]
    async fn test_silent_kind_and_missing_webhook_skip() {
        let channel = Arc::new(Recording::default());
        let notifier = Notifier::new(channel.clone(), Duration::from_secs(1));

        assert!(notifier
            .dispatch(&config(), &entry(AuditKind::GamePing, serde_json::Value::Null))
            .is_none());
        assert!(notifier
            .dispatch(&NotifyConfig::disabled(), &entry(AuditKind::Ban, serde_json::Value::Null))
            .is_none());
        assert!(notifier
            .clone()
            .with_enabled(false)
            .dispatch(&config(), &entry(AuditKind::Ban, serde_json::Value::Null))
            .is_none());
        assert!(channel.messages.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_channel_times_out() {
        let notifier = Notifier::new(Arc::new(Hanging), Duration::from_secs(5));
        let handle = notifier
            .dispatch(&config(), &entry(AuditKind::Ban, serde_json::Value::Null))
            .unwrap();
        // The task ends on its own once the timeout elapses.
        handle.await.unwrap();
    }

    #[test]
    fn test_no_runtime_skips() {
        let notifier = Notifier::new(Arc::new(Recording::default()), Duration::from_secs(1));
        assert!(notifier
            .dispatch(&config(), &entry(AuditKind::Ban, serde_json::Value::Null))
            .is_none());
    }
}
