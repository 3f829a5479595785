//! Salted argon2id hashing of login secrets.
//!
//! Hashes are stored as PHC strings, so the parameters used at registration
//! travel with the hash. [`PasswordHasher::verify_dummy`] runs one full
//! verification against a hash of a random secret; callers use it when the
//! account does not exist so that both failure paths cost the same.

use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::{CryptoError, CryptoResult};

/// Cost parameters for argon2id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordParams {
    fn to_argon2(self) -> CryptoResult<Params> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| CryptoError::InvalidParams(e.to_string()))
    }
}

/// Hashes and verifies login secrets.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    params: PasswordParams,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Create a hasher. Computes one hash up front for the dummy path.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidParams`] if argon2 rejects the parameters.
    pub fn new(params: PasswordParams) -> CryptoResult<Self> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);
        let mut hasher = Self {
            argon2,
            params,
            dummy_hash: String::new(),
        };
        let filler = hex::encode(crate::random_bytes::<32>());
        hasher.dummy_hash = hasher.hash(&filler)?;
        Ok(hasher)
    }

    /// The parameters new hashes are produced with.
    #[must_use]
    pub fn params(&self) -> PasswordParams {
        self.params
    }

    /// Hash a secret with a fresh random salt.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::PasswordHash`] if hashing fails.
    pub fn hash(&self, secret: &str) -> CryptoResult<String> {
        let salt = SaltString::encode_b64(&crate::random_bytes::<16>())
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CryptoError::PasswordHash(e.to_string()))
    }

    /// Verify a secret against a stored PHC string.
    ///
    /// A wrong secret is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::PasswordHash`] if the stored hash is malformed.
    pub fn verify(&self, secret: &str, stored: &str) -> CryptoResult<bool> {
        let parsed =
            PasswordHash::new(stored).map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
        match self.argon2.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CryptoError::PasswordHash(e.to_string())),
        }
    }

    /// Spend one verification's worth of work and report no match.
    #[must_use]
    pub fn verify_dummy(&self, secret: &str) -> bool {
        let _ = self.verify(secret, &self.dummy_hash);
        false
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
