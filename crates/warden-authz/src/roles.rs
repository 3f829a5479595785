//! Role store: roles keyed by ID with unique name and rank indexes.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use warden_core::{CapabilitySet, IdentityId, Rank, RoleId, Timestamp};
use warden_storage::{KvStore, Table};

use crate::error::{AuthzError, AuthzResult};
use crate::txn::UnitOfWork;

const NS_ROLES: &str = "roles";
const NS_BY_NAME: &str = "roles:by_name";
const NS_BY_RANK: &str = "roles:by_rank";

/// Longest accepted role name.
pub const MAX_ROLE_NAME_LEN: usize = 64;

/// A named position in the hierarchy with a set of capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier.
    pub id: RoleId,
    /// Display name, unique case-insensitively.
    pub name: String,
    /// Position in the hierarchy, unique across roles.
    pub rank: Rank,
    /// Capabilities granted to holders.
    pub permissions: CapabilitySet,
    /// Creator, `None` for bootstrap roles.
    pub created_by: Option<IdentityId>,
    /// When the role was created.
    pub created_at: Timestamp,
    /// When the role was last changed.
    pub updated_at: Timestamp,
}

/// The caller-supplied fields of a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDraft {
    /// Display name.
    pub name: String,
    /// Requested rank.
    pub rank: Rank,
    /// Requested capabilities.
    pub permissions: CapabilitySet,
}

impl RoleDraft {
    /// Create a draft.
    #[must_use]
    pub fn new(name: impl Into<String>, rank: impl Into<Rank>, permissions: CapabilitySet) -> Self {
        Self {
            name: name.into(),
            rank: rank.into(),
            permissions,
        }
    }

    /// Check and normalize the name.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] for an empty or over-long name.
    pub fn validate(mut self) -> AuthzResult<Self> {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            return Err(AuthzError::InvalidInput("role name is required".into()));
        }
        if trimmed.chars().count() > MAX_ROLE_NAME_LEN {
            return Err(AuthzError::InvalidInput(format!(
                "role name exceeds {MAX_ROLE_NAME_LEN} characters"
            )));
        }
        self.name = trimmed.to_string();
        Ok(self)
    }
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

fn rank_key(rank: Rank) -> String {
    format!("{:010}", rank.get())
}

/// Persistent roles.
///
/// Reads go straight to the store. Writes go through a [`UnitOfWork`] so the
/// row and both indexes can be rolled back together.
#[derive(Clone)]
pub struct RoleStore {
    store: Arc<dyn KvStore>,
    roles: Table<Role>,
}

impl RoleStore {
    /// Bind the role store to `store`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the namespace is rejected.
    pub fn new(store: Arc<dyn KvStore>) -> AuthzResult<Self> {
        let roles = Table::new(Arc::clone(&store), NS_ROLES)?;
        Ok(Self { store, roles })
    }

    /// Look up a role by ID.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    pub async fn get(&self, id: RoleId) -> AuthzResult<Option<Role>> {
        Ok(self.roles.get(&id.as_uuid().to_string()).await?)
    }

    /// Look up a role by ID, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::NotFound`] if there is no such role.
    pub async fn require(&self, id: RoleId) -> AuthzResult<Role> {
        self.get(id)
            .await?
            .ok_or_else(|| AuthzError::not_found("role", id))
    }

    /// Look up a role by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a read fails.
    pub async fn by_name(&self, name: &str) -> AuthzResult<Option<Role>> {
        self.via_index(NS_BY_NAME, &name_key(name.trim())).await
    }

    /// Look up the role holding `rank`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a read fails.
    pub async fn by_rank(&self, rank: Rank) -> AuthzResult<Option<Role>> {
        self.via_index(NS_BY_RANK, &rank_key(rank)).await
    }

    async fn via_index(&self, namespace: &str, key: &str) -> AuthzResult<Option<Role>> {
        let Some(raw) = self.store.get(namespace, key).await? else {
            return Ok(None);
        };
        let Some(id) = std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            tracing::error!(namespace, key, "corrupt role index row");
            return Ok(None);
        };
        self.get(RoleId::from_uuid(id)).await
    }

    /// Every role, lowest rank first.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the scan fails.
    pub async fn list(&self) -> AuthzResult<Vec<Role>> {
        let mut roles = self.roles.all().await?;
        roles.sort_by_key(|role| role.rank);
        Ok(roles)
    }

    /// Whether no role exists.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the listing fails.
    pub async fn is_empty(&self) -> AuthzResult<bool> {
        Ok(self.store.list_keys(NS_ROLES).await?.is_empty())
    }

    /// Insert a new role and claim its name and rank.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Conflict`] if the name or rank is taken. Writes
    /// made before the conflict stay in `uow` for the caller to roll back.
    pub async fn insert(&self, role: &Role, uow: &mut UnitOfWork) -> AuthzResult<()> {
        self.claim_name(role, uow).await?;
        self.claim_rank(role, uow).await?;
        uow.put(NS_ROLES, &role.id.as_uuid().to_string(), role).await?;
        Ok(())
    }

    /// Replace `old` with `new`, moving index entries that changed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Conflict`] if the new name or rank is taken.
    pub async fn replace(&self, old: &Role, new: &Role, uow: &mut UnitOfWork) -> AuthzResult<()> {
        if name_key(&old.name) != name_key(&new.name) {
            self.claim_name(new, uow).await?;
            uow.delete(NS_BY_NAME, &name_key(&old.name)).await?;
        }
        if old.rank != new.rank {
            self.claim_rank(new, uow).await?;
            uow.delete(NS_BY_RANK, &rank_key(old.rank)).await?;
        }
        uow.put(NS_ROLES, &new.id.as_uuid().to_string(), new).await?;
        Ok(())
    }

    /// Delete a role and its index entries.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a delete fails.
    pub async fn remove(&self, role: &Role, uow: &mut UnitOfWork) -> AuthzResult<()> {
        uow.delete(NS_BY_NAME, &name_key(&role.name)).await?;
        uow.delete(NS_BY_RANK, &rank_key(role.rank)).await?;
        uow.delete(NS_ROLES, &role.id.as_uuid().to_string()).await?;
        Ok(())
    }

    async fn claim_name(&self, role: &Role, uow: &mut UnitOfWork) -> AuthzResult<()> {
        let id = role.id.as_uuid().to_string().into_bytes();
        if uow.claim(NS_BY_NAME, &name_key(&role.name), id).await? {
            Ok(())
        } else {
            Err(AuthzError::Conflict(format!(
                "role name {} is taken",
                role.name
            )))
        }
    }

    async fn claim_rank(&self, role: &Role, uow: &mut UnitOfWork) -> AuthzResult<()> {
        let id = role.id.as_uuid().to_string().into_bytes();
        if uow.claim(NS_BY_RANK, &rank_key(role.rank), id).await? {
            Ok(())
        } else {
            Err(AuthzError::Conflict(format!("rank {} is taken", role.rank)))
        }
    }
}

impl std::fmt::Debug for RoleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleStore").finish_non_exhaustive()
    }
}
