//! Site settings with per-key validation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use warden_core::{IdentityId, Timestamp};
use warden_notify::{NotifyConfig, UrlPolicy, WebhookUrl};
use warden_storage::{KvStore, Table};

use crate::error::{AuthzError, AuthzResult};
use crate::txn::UnitOfWork;

const NS_SETTINGS: &str = "settings";

/// Placeholder recorded in place of a secret value.
pub const REDACTED: &str = "[redacted]";

static DISCORD_INVITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://discord\.gg/[a-zA-Z0-9]+$").expect("invalid regex"));

static PAYMENT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(buy\.stripe\.com|paypal\.me)/.+$").expect("invalid regex")
});

/// The settings this core knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    /// Public Discord invite.
    DiscordLink,
    /// Checkout link.
    PaymentLink,
    /// `true` or `false`.
    PaymentEnabled,
    /// Notification webhook. Secret.
    DiscordWebhook,
}

impl SettingKey {
    /// Every known key.
    pub const ALL: [Self; 4] = [
        Self::DiscordLink,
        Self::PaymentLink,
        Self::PaymentEnabled,
        Self::DiscordWebhook,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DiscordLink => "discord_link",
            Self::PaymentLink => "payment_link",
            Self::PaymentEnabled => "payment_enabled",
            Self::DiscordWebhook => "discord_webhook",
        }
    }

    /// Whether the value must never leave the core.
    #[must_use]
    pub const fn is_secret(self) -> bool {
        matches!(self, Self::DiscordWebhook)
    }

    /// Check `value` for this key. An empty value clears a link.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] if the value is rejected.
    pub fn validate(self, value: &str, webhook_policy: &UrlPolicy) -> AuthzResult<()> {
        let valid = match self {
            Self::PaymentEnabled => matches!(value, "true" | "false"),
            _ if value.is_empty() => true,
            Self::DiscordLink => DISCORD_INVITE.is_match(value),
            Self::PaymentLink => PAYMENT_LINK.is_match(value),
            Self::DiscordWebhook => WebhookUrl::parse(value, webhook_policy).is_ok(),
        };
        if valid {
            Ok(())
        } else {
            Err(AuthzError::InvalidInput(format!(
                "invalid value for {}",
                self.as_str()
            )))
        }
    }

    /// The value as it may appear in audit payloads and notifications.
    #[must_use]
    pub fn displayed(self, value: &str) -> String {
        if self.is_secret() && !value.is_empty() {
            REDACTED.to_string()
        } else {
            value.to_string()
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| AuthzError::InvalidInput(format!("unknown setting: {s}")))
    }
}

/// A stored setting.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    /// Which setting.
    pub key: SettingKey,
    /// Current value.
    pub value: String,
    /// Who last changed it.
    pub updated_by: Option<IdentityId>,
    /// When it was last changed.
    pub updated_at: Timestamp,
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("key", &self.key)
            .field("value", &self.key.displayed(&self.value))
            .field("updated_by", &self.updated_by)
            .finish_non_exhaustive()
    }
}

/// Persistent settings.
#[derive(Clone)]
pub struct SettingsStore {
    settings: Table<Setting>,
    webhook_policy: UrlPolicy,
}

impl SettingsStore {
    /// Bind the settings store to `store`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the namespace is rejected.
    pub fn new(store: Arc<dyn KvStore>, webhook_policy: UrlPolicy) -> AuthzResult<Self> {
        Ok(Self {
            settings: Table::new(store, NS_SETTINGS)?,
            webhook_policy,
        })
    }

    /// The policy webhook URLs are checked against.
    #[must_use]
    pub fn webhook_policy(&self) -> &UrlPolicy {
        &self.webhook_policy
    }

    /// Read a public setting.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] for an unknown key and
    /// [`AuthzError::NotFound`] for a secret or unset key.
    pub async fn get_public(&self, key: &str) -> AuthzResult<String> {
        let key: SettingKey = key.parse()?;
        if key.is_secret() {
            return Err(AuthzError::not_found("setting", key));
        }
        self.settings
            .get(key.as_str())
            .await?
            .map(|setting| setting.value)
            .ok_or_else(|| AuthzError::not_found("setting", key))
    }

    /// Validate and write a setting. An empty link clears the row.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] if the value is rejected.
    pub async fn put(
        &self,
        key: SettingKey,
        value: &str,
        actor: IdentityId,
        now: Timestamp,
        uow: &mut UnitOfWork,
    ) -> AuthzResult<()> {
        key.validate(value, &self.webhook_policy)?;
        if value.is_empty() {
            uow.delete(NS_SETTINGS, key.as_str()).await?;
            return Ok(());
        }
        let setting = Setting {
            key,
            value: value.to_string(),
            updated_by: Some(actor),
            updated_at: now,
        };
        uow.put(NS_SETTINGS, key.as_str(), &setting).await?;
        Ok(())
    }

    /// Snapshot the notification destination for one request.
    ///
    /// A missing or no longer valid webhook yields a disabled config.
    pub async fn notify_config(&self) -> NotifyConfig {
        let stored = match self.settings.get(SettingKey::DiscordWebhook.as_str()).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read webhook setting");
                return NotifyConfig::disabled();
            },
        };
        let Some(setting) = stored else {
            return NotifyConfig::disabled();
        };
        match WebhookUrl::parse(&setting.value, &self.webhook_policy) {
            Ok(url) => NotifyConfig::new(url),
            Err(e) => {
                tracing::warn!(error = %e, "stored webhook no longer passes the URL policy");
                NotifyConfig::disabled()
            },
        }
    }
}

impl fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsStore")
            .field("webhook_policy", &self.webhook_policy.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_storage::MemoryKvStore;

    const WEBHOOK: &str = "https://discord.com/api/webhooks/123/secret-token";

    fn setup() -> (Arc<dyn KvStore>, SettingsStore) {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let settings = SettingsStore::new(Arc::clone(&store), UrlPolicy::default()).unwrap();
        (store, settings)
    }

    #[test]
    fn test_validation_rules() {
        let policy = UrlPolicy::default();
        assert!(SettingKey::DiscordLink.validate("https://discord.gg/abc123", &policy).is_ok());
        assert!(SettingKey::DiscordLink.validate("https://evil.gg/abc", &policy).is_err());
        assert!(SettingKey::DiscordLink.validate("", &policy).is_ok());
        assert!(SettingKey::PaymentLink.validate("https://paypal.me/shop", &policy).is_ok());
        assert!(SettingKey::PaymentLink.validate("http://paypal.me/shop", &policy).is_err());
        assert!(SettingKey::PaymentEnabled.validate("true", &policy).is_ok());
        assert!(SettingKey::PaymentEnabled.validate("", &policy).is_err());
        assert!(SettingKey::DiscordWebhook.validate(WEBHOOK, &policy).is_ok());
        assert!(
            SettingKey::DiscordWebhook
                .validate("https://example.com/api/webhooks/1", &policy)
                .is_err()
        );
        assert!("motd".parse::<SettingKey>().is_err());
    }

    #[test]
    fn test_secret_display() {
        assert_eq!(SettingKey::DiscordWebhook.displayed(WEBHOOK), REDACTED);
        assert_eq!(SettingKey::DiscordWebhook.displayed(""), "");
        assert_eq!(SettingKey::PaymentEnabled.displayed("true"), "true");
    }

    #[tokio::test]
    async fn test_public_reads_hide_secrets() {
        let (store, settings) = setup();
        let mut uow = UnitOfWork::new(store);
        let actor = IdentityId::new();
        settings
            .put(SettingKey::DiscordWebhook, WEBHOOK, actor, Timestamp::now(), &mut uow)
            .await
            .unwrap();
        settings
            .put(SettingKey::PaymentEnabled, "true", actor, Timestamp::now(), &mut uow)
            .await
            .unwrap();

        assert_eq!(settings.get_public("payment_enabled").await.unwrap(), "true");
        assert!(matches!(
            settings.get_public("discord_webhook").await,
            Err(AuthzError::NotFound { .. })
        ));
        assert!(matches!(
            settings.get_public("discord_link").await,
            Err(AuthzError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_notify_config_snapshot() {
        let (store, settings) = setup();
        assert!(settings.notify_config().await.webhook().is_none());

        let mut uow = UnitOfWork::new(store);
        settings
            .put(SettingKey::DiscordWebhook, WEBHOOK, IdentityId::new(), Timestamp::now(), &mut uow)
            .await
            .unwrap();
        let config = settings.notify_config().await;
        assert!(config.webhook().is_some());
        assert_eq!(config.redact(WEBHOOK), "[redacted]");

        settings
            .put(SettingKey::DiscordWebhook, "", IdentityId::new(), Timestamp::now(), &mut uow)
            .await
            .unwrap();
        assert!(settings.notify_config().await.webhook().is_none());
    }
}
