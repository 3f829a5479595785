//! Session token error types.

use thiserror::Error;
use warden_core::Timestamp;

/// Errors raised while issuing or verifying session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The token is not structurally a session token.
    #[error("malformed session token: {0}")]
    Malformed(String),

    /// The MAC does not match the token contents.
    #[error("session token signature invalid")]
    SignatureInvalid,

    /// The token expired, beyond the clock skew tolerance.
    #[error("session token expired at {expired_at}")]
    Expired {
        /// The embedded expiry.
        expired_at: Timestamp,
    },

    /// The subject's sessions were revoked after this token was issued.
    #[error("session token revoked")]
    Revoked,

    /// The codec configuration is unusable.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for session token operations.
pub type SessionResult<T> = Result<T, SessionError>;
