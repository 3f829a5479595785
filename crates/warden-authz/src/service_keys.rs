//! Service keys for machine-to-machine callers.
//!
//! Plaintext keys exist only in the [`IssuedKey`] returned at issuance. The
//! store holds a domain-separated BLAKE3 digest of each key and looks keys up
//! by exact digest match.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warden_core::{IdentityId, ServiceKeyId, Timestamp};
use warden_crypto::ContentHash;
use warden_storage::{KvStore, Table};
use zeroize::Zeroizing;

use crate::error::{AuthzError, AuthzResult};
use crate::txn::UnitOfWork;

const NS_KEYS: &str = "service_keys";
const NS_KEY_IDS: &str = "service_keys:ids";

const DIGEST_DOMAIN: &str = "warden service key v1";

/// Prefix of every rendered key.
pub const KEY_PREFIX: &str = "wk_";

/// Longest accepted scope name.
const MAX_SCOPE_LEN: usize = 128;

fn digest(key_value: &str) -> String {
    ContentHash::hash_with_domain(DIGEST_DOMAIN, key_value.as_bytes()).to_hex()
}

/// A stored service key, without its plaintext value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceKey {
    /// Key identifier, used for revocation.
    pub id: ServiceKeyId,
    /// The integration the key is scoped to.
    pub scope: String,
    /// Hex digest of the key value.
    pub digest: String,
    /// The identity that issued the key.
    pub created_by: IdentityId,
    /// When the key was issued.
    pub created_at: Timestamp,
}

/// A key at the moment of issuance, the only time its value is visible.
pub struct IssuedKey {
    /// The stored record.
    pub record: ServiceKey,
    /// The plaintext value, wiped on drop.
    pub value: Zeroizing<String>,
}

impl std::fmt::Debug for IssuedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedKey")
            .field("record", &self.record)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Validates, issues and revokes service keys.
#[derive(Clone)]
pub struct ServiceKeyAuthenticator {
    store: Arc<dyn KvStore>,
    keys: Table<ServiceKey>,
}

impl ServiceKeyAuthenticator {
    /// Bind the authenticator to `store`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the namespace is rejected.
    pub fn new(store: Arc<dyn KvStore>) -> AuthzResult<Self> {
        let keys = Table::new(Arc::clone(&store), NS_KEYS)?;
        Ok(Self { store, keys })
    }

    /// Resolve a presented key value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::UnknownKey`] if no key matches.
    pub async fn validate(&self, key_value: &str) -> AuthzResult<ServiceKey> {
        if !key_value.starts_with(KEY_PREFIX) {
            return Err(AuthzError::UnknownKey);
        }
        self.keys
            .get(&digest(key_value))
            .await?
            .ok_or(AuthzError::UnknownKey)
    }

    /// Generate and store a key for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] for an empty scope, or a storage
    /// error if a write fails.
    pub async fn issue(
        &self,
        scope: &str,
        created_by: IdentityId,
        now: Timestamp,
        uow: &mut UnitOfWork,
    ) -> AuthzResult<IssuedKey> {
        let scope = scope.trim();
        if scope.is_empty() || scope.len() > MAX_SCOPE_LEN {
            return Err(AuthzError::InvalidInput(
                "service key scope must be 1-128 bytes".into(),
            ));
        }

        let value = Zeroizing::new(format!(
            "{KEY_PREFIX}{}",
            hex::encode(warden_crypto::random_bytes::<32>())
        ));
        let record = ServiceKey {
            id: ServiceKeyId::new(),
            scope: scope.to_string(),
            digest: digest(&value),
            created_by,
            created_at: now,
        };

        let encoded = serde_json::to_vec(&record)
            .map_err(|e| AuthzError::Internal(e.to_string()))?;
        if !uow.claim(NS_KEYS, &record.digest, encoded).await? {
            return Err(AuthzError::Conflict("service key collision".into()));
        }
        uow.set(
            NS_KEY_IDS,
            &record.id.as_uuid().to_string(),
            record.digest.clone().into_bytes(),
        )
        .await?;
        Ok(IssuedKey { record, value })
    }

    /// Look up a key record by ID.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a read fails.
    pub async fn get(&self, id: ServiceKeyId) -> AuthzResult<Option<ServiceKey>> {
        let Some(raw) = self.store.get(NS_KEY_IDS, &id.as_uuid().to_string()).await? else {
            return Ok(None);
        };
        let digest = String::from_utf8(raw).map_err(|e| AuthzError::Internal(e.to_string()))?;
        Ok(self.keys.get(&digest).await?)
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::NotFound`] if there is no such key.
    pub async fn revoke(&self, id: ServiceKeyId, uow: &mut UnitOfWork) -> AuthzResult<ServiceKey> {
        let record = self
            .get(id)
            .await?
            .ok_or_else(|| AuthzError::not_found("service key", id))?;
        uow.delete(NS_KEYS, &record.digest).await?;
        uow.delete(NS_KEY_IDS, &id.as_uuid().to_string()).await?;
        Ok(record)
    }

    /// Every key record, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the scan fails.
    pub async fn list(&self) -> AuthzResult<Vec<ServiceKey>> {
        let mut keys = self.keys.all().await?;
        keys.sort_by_key(|key| key.created_at);
        Ok(keys)
    }
}

impl std::fmt::Debug for ServiceKeyAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceKeyAuthenticator").finish_non_exhaustive()
    }
}
