//! Authorization error types and their external surface.

use thiserror::Error;
use warden_audit::AuditError;
use warden_core::{Capability, CoreError, Rank};
use warden_crypto::CryptoError;
use warden_session::SessionError;
use warden_storage::StorageError;

/// Errors raised by the authorization core.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// A request field failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Registration collided with an existing username or email.
    #[error("an identity with this {field} already exists")]
    DuplicateIdentity {
        /// `"username"` or `"email"`.
        field: &'static str,
    },

    /// A role or key collided with an existing unique value.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unknown email or wrong secret.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The identity is suspended.
    #[error("identity is suspended")]
    IdentitySuspended,

    /// No service key matches the presented value.
    #[error("unknown service key")]
    UnknownKey,

    /// The request carried no usable credential.
    #[error("missing credentials")]
    MissingCredentials,

    /// The session token was rejected.
    #[error(transparent)]
    Token(#[from] SessionError),

    /// The caller's role lacks the capability.
    #[error("capability {capability} denied")]
    Denied {
        /// The capability that was required.
        capability: Capability,
    },

    /// A capability name outside the fixed vocabulary.
    #[error("invalid capability: {0}")]
    InvalidCapability(String),

    /// The actor does not strictly outrank the target.
    #[error("rank {actor} cannot act on rank {target}")]
    InsufficientRank {
        /// The actor's current rank.
        actor: Rank,
        /// The rank being acted on.
        target: Rank,
    },

    /// A rank or role reference points at no role.
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// The target of an operation does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up.
        kind: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// The audit entry could not be written; the operation was rolled back.
    #[error("audit log unavailable: {0}")]
    AuditUnavailable(#[source] AuditError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Cryptographic failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// An external effect failed.
    #[error("effect failed: {0}")]
    Effect(String),

    /// An internal failure such as a panicked blocking task.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

impl From<CoreError> for AuthzError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownCapability(name) => Self::InvalidCapability(name),
            CoreError::TimestampOutOfRange(_) => Self::Internal(e.to_string()),
        }
    }
}

/// What a caller outside the core is told about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// 400.
    BadRequest,
    /// 401. Authentication failures are not differentiated.
    Unauthorized,
    /// 403 for a missing capability.
    Forbidden,
    /// 403 for a hierarchy refusal.
    RankForbidden,
    /// 404.
    NotFound,
    /// 409.
    Conflict,
    /// 500.
    Internal,
}

impl Surface {
    /// HTTP status code.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden | Self::RankForbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Internal => 500,
        }
    }

    /// Message safe to return to the caller.
    #[must_use]
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::RankForbidden => "cannot act on a role of equal or higher rank",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Internal => "internal error",
        }
    }
}

impl AuthzError {
    /// The external surface of this error.
    #[must_use]
    pub fn surface(&self) -> Surface {
        match self {
            Self::InvalidInput(_) => Surface::BadRequest,
            Self::DuplicateIdentity { .. } | Self::Conflict(_) => Surface::Conflict,
            Self::InvalidCredentials
            | Self::IdentitySuspended
            | Self::UnknownKey
            | Self::MissingCredentials
            | Self::Token(_) => Surface::Unauthorized,
            Self::Denied { .. } | Self::InvalidCapability(_) => Surface::Forbidden,
            Self::InsufficientRank { .. } => Surface::RankForbidden,
            Self::NotFound { .. } => Surface::NotFound,
            Self::RoleNotFound(_)
            | Self::AuditUnavailable(_)
            | Self::Storage(_)
            | Self::Crypto(_)
            | Self::Effect(_)
            | Self::Internal(_) => Surface::Internal,
        }
    }

    /// Whether this is a refusal that belongs on the security log.
    #[must_use]
    pub fn is_security_refusal(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials
                | Self::IdentitySuspended
                | Self::UnknownKey
                | Self::MissingCredentials
                | Self::Token(_)
                | Self::Denied { .. }
                | Self::InsufficientRank { .. }
        )
    }

    pub(crate) fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
