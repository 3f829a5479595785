//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_crypto::prelude::*;` to import all essential types.

pub use crate::{CryptoError, CryptoResult};

pub use crate::{ContentHash, KeyPair, PublicKey, Signature};

pub use crate::{MacKey, MacTag, PasswordHasher, PasswordParams};
