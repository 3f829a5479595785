//! Notification error types.

use thiserror::Error;

/// Errors that can occur while delivering a notification.
///
/// These never reach the caller of a privileged operation; the notifier logs
/// and drops them.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The webhook URL failed validation.
    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),

    /// The URL allow-list pattern does not compile.
    #[error("invalid url pattern: {0}")]
    InvalidPattern(String),

    /// The HTTP request could not be sent.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The channel answered with a non-success status.
    #[error("channel rejected notification with status {0}")]
    Rejected(u16),

    /// Delivery did not finish within the timeout.
    #[error("delivery timed out after {0} seconds")]
    Timeout(u64),
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        // The URL embeds the webhook token.
        Self::Delivery(e.without_url().to_string())
    }
}

/// Result type for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;
