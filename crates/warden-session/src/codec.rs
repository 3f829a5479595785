//! Issuing and verifying session tokens.
//!
//! Wire format: `base64url(payload) "." base64url(tag)`, unpadded. The tag is
//! the keyed BLAKE3 MAC of the payload under [`TOKEN_DOMAIN`].

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use warden_core::{IdentityId, Rank, Timestamp};
use warden_crypto::MacKey;

use crate::claims::SessionClaims;
use crate::error::{SessionError, SessionResult};
use crate::revocation::RevocationList;

/// MAC domain for session token payloads.
const TOKEN_DOMAIN: &str = "warden session token v1";

/// Default token lifetime (one hour).
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default clock skew tolerance applied to `expires_at`.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 30;

/// Upper bound on the clock skew tolerance.
pub const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// Lifetime and skew settings for a [`SessionCodec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Seconds from issuance to expiry.
    pub ttl_secs: u64,
    /// Seconds a token is still accepted past its expiry.
    pub clock_skew_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
        }
    }
}

/// An encoded session token, transmitted as a bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// The encoded token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the encoded string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Issues and verifies session tokens under one symmetric key.
pub struct SessionCodec {
    key: MacKey,
    config: SessionConfig,
    revocations: Option<Arc<RevocationList>>,
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec")
            .field("config", &self.config)
            .field("revocations", &self.revocations.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    /// Create a codec.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if the lifetime is zero or the
    /// skew exceeds [`MAX_CLOCK_SKEW_SECS`].
    pub fn new(key: MacKey, config: SessionConfig) -> SessionResult<Self> {
        if config.ttl_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "ttl_secs must be greater than zero".into(),
            ));
        }
        if config.clock_skew_secs > MAX_CLOCK_SKEW_SECS {
            return Err(SessionError::InvalidConfig(format!(
                "clock_skew_secs must be at most {MAX_CLOCK_SKEW_SECS}"
            )));
        }
        Ok(Self {
            key,
            config,
            revocations: None,
        })
    }

    /// Consult `revocations` on every verification.
    #[must_use]
    pub fn with_revocations(mut self, revocations: Arc<RevocationList>) -> Self {
        self.revocations = Some(revocations);
        self
    }

    /// The revocation list, if one is attached.
    #[must_use]
    pub fn revocations(&self) -> Option<&Arc<RevocationList>> {
        self.revocations.as_ref()
    }

    /// The configured lifetime and skew.
    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Issue a token for `subject` holding `rank` as of `now`.
    ///
    /// Instants are truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] if the expiry overflows.
    pub fn issue(
        &self,
        subject: IdentityId,
        rank: Rank,
        now: Timestamp,
    ) -> SessionResult<SessionToken> {
        let issued_at = now.truncate_to_secs();
        let expires_at = issued_at
            .checked_add_secs(self.config.ttl_secs)
            .ok_or_else(|| SessionError::InvalidConfig("token expiry overflows".into()))?;

        let claims = SessionClaims {
            subject,
            rank,
            issued_at,
            expires_at,
        };
        let payload = claims.to_payload();
        let tag = self.key.tag(TOKEN_DOMAIN, &payload);

        let mut token = URL_SAFE_NO_PAD.encode(payload);
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(tag.as_bytes()));

        tracing::debug!(
            subject = %subject,
            rank = %rank,
            expires_at = %expires_at,
            "issued session token"
        );
        Ok(SessionToken(token))
    }

    /// Verify a token as of `now`.
    ///
    /// Checks run in order: structure, MAC, expiry (with skew), revocation.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Malformed`] for any structural defect
    /// - [`SessionError::SignatureInvalid`] if the MAC does not match
    /// - [`SessionError::Expired`] if `now` is past `expires_at` plus the skew
    /// - [`SessionError::Revoked`] if the subject's sessions were revoked
    pub fn verify(&self, token: &str, now: Timestamp) -> SessionResult<SessionClaims> {
        let (payload_b64, tag_b64) = token
            .split_once('.')
            .ok_or_else(|| SessionError::Malformed("missing separator".into()))?;
        if tag_b64.contains('.') {
            return Err(SessionError::Malformed("too many segments".into()));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|e| SessionError::Malformed(format!("payload encoding: {e}")))?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|e| SessionError::Malformed(format!("tag encoding: {e}")))?;
        SessionClaims::check_shape(&payload)?;
        if tag.len() != 32 {
            return Err(SessionError::Malformed(format!(
                "tag is {} bytes, expected 32",
                tag.len()
            )));
        }

        self.key
            .verify(TOKEN_DOMAIN, &payload, &tag)
            .map_err(|_| SessionError::SignatureInvalid)?;

        let claims = SessionClaims::from_payload(&payload)?;

        let deadline = claims
            .expires_at
            .unix_secs()
            .saturating_add_unsigned(self.config.clock_skew_secs);
        if now.unix_secs() > deadline {
            return Err(SessionError::Expired {
                expired_at: claims.expires_at,
            });
        }

        if let Some(revocations) = &self.revocations
            && revocations.is_revoked(&claims)
        {
            return Err(SessionError::Revoked);
        }

        Ok(claims)
    }
}
