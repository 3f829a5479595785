//! Identity records and their unique username and email indexes.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use warden_core::{IdentityId, RoleId, Timestamp};
use warden_storage::{KvStore, Table};

use crate::error::{AuthzError, AuthzResult};
use crate::txn::UnitOfWork;

const NS_IDENTITIES: &str = "identities";
const NS_BY_USERNAME: &str = "identities:by_username";
const NS_BY_EMAIL: &str = "identities:by_email";

/// Optional linked accounts supplied at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Linked Roblox account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roblox_username: Option<String>,
    /// Linked Discord account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_username: Option<String>,
}

/// A registered human account.
///
/// Identities are never deleted; suspension marks them instead.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Identity identifier.
    pub id: IdentityId,
    /// Login name, unique case-insensitively.
    pub username: String,
    /// Email address, stored lowercased and unique.
    pub email: String,
    /// Argon2id PHC string.
    pub credential_hash: String,
    /// The held role.
    pub role_id: RoleId,
    /// Whether the identity is banned.
    pub suspended: bool,
    /// Whether a moderator note has been attached.
    pub flagged: bool,
    /// Linked accounts.
    #[serde(default)]
    pub profile: Profile,
    /// Registration time.
    pub created_at: Timestamp,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("role_id", &self.role_id)
            .field("suspended", &self.suspended)
            .field("flagged", &self.flagged)
            .finish_non_exhaustive()
    }
}

pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Persistent identities.
#[derive(Clone)]
pub struct IdentityStore {
    store: Arc<dyn KvStore>,
    identities: Table<Identity>,
}

impl IdentityStore {
    /// Bind the identity store to `store`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the namespace is rejected.
    pub fn new(store: Arc<dyn KvStore>) -> AuthzResult<Self> {
        let identities = Table::new(Arc::clone(&store), NS_IDENTITIES)?;
        Ok(Self { store, identities })
    }

    pub(crate) fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Look up an identity by ID.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub async fn get(&self, id: IdentityId) -> AuthzResult<Option<Identity>> {
        Ok(self.identities.get(&id.as_uuid().to_string()).await?)
    }

    /// Look up an identity by ID, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::NotFound`] if there is no such identity.
    pub async fn require(&self, id: IdentityId) -> AuthzResult<Identity> {
        self.get(id)
            .await?
            .ok_or_else(|| AuthzError::not_found("identity", id))
    }

    /// Look up an identity by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a read fails.
    pub async fn by_email(&self, email: &str) -> AuthzResult<Option<Identity>> {
        self.via_index(NS_BY_EMAIL, &normalize(email)).await
    }

    /// Look up an identity by username, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a read fails.
    pub async fn by_username(&self, username: &str) -> AuthzResult<Option<Identity>> {
        self.via_index(NS_BY_USERNAME, &normalize(username)).await
    }

    async fn via_index(&self, namespace: &str, key: &str) -> AuthzResult<Option<Identity>> {
        let Some(raw) = self.store.get(namespace, key).await? else {
            return Ok(None);
        };
        let Some(id) = std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            tracing::error!(namespace, "corrupt identity index row");
            return Ok(None);
        };
        self.get(IdentityId::from_uuid(id)).await
    }

    /// Number of identities holding `role_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the scan fails.
    pub async fn holders_of(&self, role_id: RoleId) -> AuthzResult<usize> {
        Ok(self
            .identities
            .all()
            .await?
            .iter()
            .filter(|identity| identity.role_id == role_id)
            .count())
    }

    /// Insert a new identity, claiming its username and email.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::DuplicateIdentity`] if either is taken.
    pub async fn insert(&self, identity: &Identity, uow: &mut UnitOfWork) -> AuthzResult<()> {
        let id = identity.id.as_uuid().to_string();
        if !uow
            .claim(NS_BY_USERNAME, &normalize(&identity.username), id.clone().into_bytes())
            .await?
        {
            return Err(AuthzError::DuplicateIdentity { field: "username" });
        }
        if !uow
            .claim(NS_BY_EMAIL, &normalize(&identity.email), id.clone().into_bytes())
            .await?
        {
            return Err(AuthzError::DuplicateIdentity { field: "email" });
        }
        uow.put(NS_IDENTITIES, &id, identity).await?;
        Ok(())
    }

    /// Overwrite an identity. Username and email are not re-indexed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub async fn update(&self, identity: &Identity, uow: &mut UnitOfWork) -> AuthzResult<()> {
        uow.put(NS_IDENTITIES, &identity.id.as_uuid().to_string(), identity)
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_storage::MemoryKvStore;

    fn identity(username: &str, email: &str) -> Identity {
        Identity {
            id: IdentityId::new(),
            username: username.into(),
            email: normalize(email),
            credential_hash: "$argon2id$placeholder".into(),
            role_id: RoleId::new(),
            suspended: false,
            flagged: false,
            profile: Profile::default(),
            created_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let identities = IdentityStore::new(Arc::clone(&store)).unwrap();
        let alice = identity("Alice", "Alice@Example.com");
        let mut uow = UnitOfWork::new(store);
        identities.insert(&alice, &mut uow).await.unwrap();

        assert_eq!(identities.by_email("ALICE@example.COM").await.unwrap(), Some(alice.clone()));
        assert_eq!(identities.by_username("alice").await.unwrap(), Some(alice));
        assert!(identities.by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicates_rejected() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let identities = IdentityStore::new(Arc::clone(&store)).unwrap();
        let mut uow = UnitOfWork::new(store);
        identities
            .insert(&identity("alice", "a@example.com"), &mut uow)
            .await
            .unwrap();
        uow.commit();

        let err = identities
            .insert(&identity("ALICE", "other@example.com"), &mut uow)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::DuplicateIdentity { field: "username" }));
        uow.rollback().await;

        let err = identities
            .insert(&identity("bob", "A@example.com"), &mut uow)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::DuplicateIdentity { field: "email" }));
        uow.rollback().await;
        assert!(identities.by_username("bob").await.unwrap().is_none());
    }

    #[test]
    fn test_debug_hides_hash() {
        let debug = format!("{:?}", identity("alice", "a@example.com"));
        assert!(!debug.contains("argon2id"));
        assert!(!debug.contains("a@example.com"));
    }
}
