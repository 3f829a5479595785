//! Warden Crypto - cryptographic primitives for the authorization core.
//!
//! This crate provides:
//! - Ed25519 key pairs that sign audit entries
//! - BLAKE3 content hashing for audit chain links and service key digests
//! - [`MacKey`], the symmetric key that authenticates session tokens
//! - [`PasswordHasher`], salted argon2id hashing of login secrets with a
//!   dummy verification path for unknown accounts
//!
//! Secret key material is zeroized on drop and key files are created with
//! owner-only permissions.
//!
//! # Example
//!
//! ```
//! use warden_crypto::{ContentHash, KeyPair, MacKey};
//!
//! let keypair = KeyPair::generate();
//! let signature = keypair.sign(b"audit entry");
//! assert!(keypair.verify(b"audit entry", &signature).is_ok());
//!
//! let mac = MacKey::generate();
//! let tag = mac.tag("session-token", b"payload");
//! assert!(mac.verify("session-token", b"payload", tag.as_bytes()).is_ok());
//!
//! let digest = ContentHash::hash_with_domain("warden service key", b"wk_abc");
//! assert!(!digest.is_zero());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod hash;
mod key_file;
mod keypair;
mod mac;
mod password;
mod signature;

pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use keypair::{KeyPair, PublicKey};
pub use mac::{MacKey, MacTag};
pub use password::{PasswordHasher, PasswordParams};
pub use signature::Signature;

/// Fill an array with bytes from the operating system's CSPRNG.
#[must_use]
pub fn random_bytes<const N: usize>() -> [u8; N] {
    use rand::RngCore;
    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}
