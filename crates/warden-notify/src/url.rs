//! Allow-listed webhook URLs.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{NotifyError, NotifyResult};

/// The default allow-list: Discord webhook endpoints only.
pub const DEFAULT_URL_PATTERN: &str = r"^https://discord\.com/api/webhooks/.+$";

static DEFAULT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_URL_PATTERN).expect("invalid regex"));

/// Which webhook URLs the notifier will post to.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    pattern: Regex,
}

impl UrlPolicy {
    /// Build a policy from a regular expression.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidPattern`] if the pattern does not compile.
    pub fn new(pattern: &str) -> NotifyResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| NotifyError::InvalidPattern(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// The pattern source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Whether `raw` passes the allow-list (without parsing it).
    #[must_use]
    pub fn allows(&self, raw: &str) -> bool {
        self.pattern.is_match(raw)
    }
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_REGEX.clone(),
        }
    }
}

/// A webhook URL that passed the allow-list and parses as an HTTPS URL.
///
/// The URL carries a bearer secret in its path, so `Debug` and `Display`
/// show only the host.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookUrl(url::Url);

impl WebhookUrl {
    /// Validate `raw` against `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::InvalidUrl`] if the URL is not allow-listed, does
    /// not parse, or is not HTTPS.
    pub fn parse(raw: &str, policy: &UrlPolicy) -> NotifyResult<Self> {
        if !policy.allows(raw) {
            return Err(NotifyError::InvalidUrl("url is not allow-listed".into()));
        }
        let url = url::Url::parse(raw).map_err(|e| NotifyError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "https" {
            return Err(NotifyError::InvalidUrl("url must use https".into()));
        }
        if url.host_str().is_none() {
            return Err(NotifyError::InvalidUrl("url has no host".into()));
        }
        Ok(Self(url))
    }

    /// The full URL, including its secret path.
    #[must_use]
    pub fn expose(&self) -> &url::Url {
        &self.0
    }

    /// The host, safe to log.
    #[must_use]
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

impl fmt::Debug for WebhookUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WebhookUrl(https://{}/..)", self.host())
    }
}

impl fmt::Display for WebhookUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}/[redacted]", self.host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "https://discord.com/api/webhooks/123/abcDEF";

    #[test]
    fn test_accepts_discord_webhook() {
        let url = WebhookUrl::parse(GOOD, &UrlPolicy::default()).unwrap();
        assert_eq!(url.host(), "discord.com");
        assert_eq!(url.expose().as_str(), GOOD);
    }

    #[test]
    fn test_rejects_other_urls() {
        let policy = UrlPolicy::default();
        for raw in [
            "http://discord.com/api/webhooks/1/x",
            "https://discord.com/api/webhooks/",
            "https://evil.com/api/webhooks/1/x",
            "https://discord.com.evil.com/api/webhooks/1/x",
            "",
        ] {
            assert!(WebhookUrl::parse(raw, &policy).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_redacted_formatting() {
        let url = WebhookUrl::parse(GOOD, &UrlPolicy::default()).unwrap();
        assert!(!format!("{url}").contains("abcDEF"));
        assert!(!format!("{url:?}").contains("abcDEF"));
    }

    #[test]
    fn test_custom_policy() {
        let policy = UrlPolicy::new(r"^https://hooks\.example\.org/.+$").unwrap();
        assert!(WebhookUrl::parse("https://hooks.example.org/x", &policy).is_ok());
        assert!(WebhookUrl::parse(GOOD, &policy).is_err());
        assert!(UrlPolicy::new("(").is_err());
    }
}
