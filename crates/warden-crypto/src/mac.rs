//! Symmetric message authentication for session tokens.
//!
//! A [`MacKey`] is a 32-byte secret held only by the service. Tags are BLAKE3
//! keyed hashes over a length-prefixed domain string followed by the message,
//! and are compared in constant time.

use std::path::Path;

use subtle::ConstantTimeEq;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, CryptoResult};
use crate::key_file;

/// A 32-byte symmetric MAC key, zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MacKey {
    bytes: [u8; 32],
}

impl MacKey {
    /// Generate a new random key.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            bytes: crate::random_bytes(),
        }
    }

    /// Create from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Load the key from `path`, or generate and persist a new one.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IoError`] on I/O failures or when the path is a
    /// symlink, and [`CryptoError::InvalidKeyLength`] for a corrupt key file.
    pub fn load_or_generate(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let secret = key_file::load_or_create(path.as_ref(), || {
            Zeroizing::new(crate::random_bytes())
        })?;
        Self::from_bytes(secret.as_ref())
    }

    /// Compute the tag of `message` under `domain`.
    #[must_use]
    pub fn tag(&self, domain: &str, message: &[u8]) -> MacTag {
        let mut hasher = blake3::Hasher::new_keyed(&self.bytes);
        hasher.update(&(domain.len() as u64).to_le_bytes());
        hasher.update(domain.as_bytes());
        hasher.update(message);
        MacTag(*hasher.finalize().as_bytes())
    }

    /// Check `tag` against the expected tag of `message` in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MacMismatch`] if the tag is wrong or has the wrong length.
    pub fn verify(&self, domain: &str, message: &[u8], tag: &[u8]) -> CryptoResult<()> {
        let expected = self.tag(domain, message);
        if bool::from(expected.0.as_slice().ct_eq(tag)) {
            Ok(())
        } else {
            Err(CryptoError::MacMismatch)
        }
    }

    /// Export the key bytes. Only for writing key files.
    #[must_use]
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.bytes)
    }
}

impl std::fmt::Debug for MacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacKey").finish_non_exhaustive()
    }
}

/// A 32-byte MAC tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacTag([u8; 32]);

impl MacTag {
    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_verifies() {
        let key = MacKey::generate();
        let tag = key.tag("session", b"payload");
        assert!(key.verify("session", b"payload", tag.as_bytes()).is_ok());
    }

    #[test]
    fn test_wrong_message_domain_or_key() {
        let key = MacKey::generate();
        let tag = key.tag("session", b"payload");

        assert!(matches!(
            key.verify("session", b"payloae", tag.as_bytes()),
            Err(CryptoError::MacMismatch)
        ));
        assert!(key.verify("other", b"payload", tag.as_bytes()).is_err());
        assert!(
            MacKey::generate()
                .verify("session", b"payload", tag.as_bytes())
                .is_err()
        );
    }

    #[test]
    fn test_truncated_tag_rejected() {
        let key = MacKey::generate();
        let tag = key.tag("session", b"payload");
        assert!(key.verify("session", b"payload", &tag.as_bytes()[..31]).is_err());
        assert!(key.verify("session", b"payload", &[]).is_err());
    }

    #[test]
    fn test_load_or_generate_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.key");

        let first = MacKey::load_or_generate(&path).unwrap();
        let second = MacKey::load_or_generate(&path).unwrap();
        assert_eq!(
            first.tag("d", b"m").as_bytes(),
            second.tag("d", b"m").as_bytes()
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = MacKey::from_bytes(&[0xAB; 32]).unwrap();
        assert_eq!(format!("{key:?}"), "MacKey { .. }");
    }
}
