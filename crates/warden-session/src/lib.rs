//! Warden Session - signed, time-limited session tokens.
//!
//! A session token carries the subject identity, a snapshot of the subject's
//! role rank at issuance, and the issue and expiry instants. A keyed BLAKE3
//! MAC covers every field; the key is held only by the service.
//!
//! Tokens are stateless. A rank change does not reach an already-issued
//! token until it expires. An optional [`RevocationList`] refuses tokens of
//! suspended subjects before their natural expiry.
//!
//! # Example
//!
//! ```
//! use warden_core::{IdentityId, Rank, Timestamp};
//! use warden_crypto::MacKey;
//! use warden_session::{SessionCodec, SessionConfig, SessionError};
//!
//! let codec = SessionCodec::new(MacKey::generate(), SessionConfig::default()).unwrap();
//! let subject = IdentityId::new();
//! let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
//!
//! let token = codec.issue(subject, Rank::new(2), now).unwrap();
//! let claims = codec.verify(token.as_str(), now).unwrap();
//! assert_eq!(claims.subject, subject);
//! assert_eq!(claims.rank, Rank::new(2));
//!
//! let later = Timestamp::from_unix_secs(1_700_000_000 + 7200).unwrap();
//! assert!(matches!(codec.verify(token.as_str(), later), Err(SessionError::Expired { .. })));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod claims;
mod codec;
mod error;
mod revocation;

pub use claims::SessionClaims;
pub use codec::{
    DEFAULT_CLOCK_SKEW_SECS, DEFAULT_TTL_SECS, MAX_CLOCK_SKEW_SECS, SessionCodec, SessionConfig,
    SessionToken,
};
pub use error::{SessionError, SessionResult};
pub use revocation::RevocationList;
