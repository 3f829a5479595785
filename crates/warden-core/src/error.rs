//! Error types for the shared vocabulary.

use thiserror::Error;

/// Errors raised while interpreting vocabulary values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A capability name outside the closed vocabulary.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// A timestamp outside the representable range.
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
}

/// Result type for vocabulary operations.
pub type CoreResult<T> = Result<T, CoreError>;
