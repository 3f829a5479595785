//! Capability checks against the role a session token names.

use warden_core::{Capability, CapabilitySet, Rank, RoleId};
use warden_session::SessionClaims;

use crate::error::{AuthzError, AuthzResult};
use crate::roles::RoleStore;

/// The outcome of a successful capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Decision {
    /// The capability is held by the role at `rank`.
    Granted {
        /// The granting role.
        role_id: RoleId,
        /// The rank the token carried.
        rank: Rank,
    },
}

impl Decision {
    /// The role that granted the capability.
    #[must_use]
    pub fn role_id(self) -> RoleId {
        match self {
            Self::Granted { role_id, .. } => role_id,
        }
    }
}

/// Whether `permissions` grants `capability`.
#[must_use]
pub fn permits(permissions: CapabilitySet, capability: Capability) -> bool {
    permissions.contains(capability)
}

/// Resolves the rank carried by a session to a role and checks capabilities.
///
/// The rank comes from the token, not a fresh identity read, so a rank change
/// takes effect for a session when it is next issued.
#[derive(Debug, Clone)]
pub struct PermissionAuthority {
    roles: RoleStore,
}

impl PermissionAuthority {
    /// Create an authority over `roles`.
    #[must_use]
    pub fn new(roles: RoleStore) -> Self {
        Self { roles }
    }

    /// Check that the session's role grants `capability`.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::RoleNotFound`] if no role holds the token's rank
    /// - [`AuthzError::Denied`] if the role lacks the capability
    pub async fn authorize(
        &self,
        claims: &SessionClaims,
        capability: Capability,
    ) -> AuthzResult<Decision> {
        let role = self
            .roles
            .by_rank(claims.rank)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(format!("rank {}", claims.rank)))?;

        if permits(role.permissions, capability) {
            Ok(Decision::Granted {
                role_id: role.id,
                rank: role.rank,
            })
        } else {
            Err(AuthzError::Denied { capability })
        }
    }

    /// Check a capability given by name.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidCapability`] for a name outside the
    /// vocabulary, otherwise as [`authorize`](Self::authorize).
    pub async fn authorize_named(
        &self,
        claims: &SessionClaims,
        capability: &str,
    ) -> AuthzResult<Decision> {
        let capability: Capability = capability.parse()?;
        self.authorize(claims, capability).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_core::{IdentityId, Timestamp};
    use warden_storage::{KvStore, MemoryKvStore};

    use crate::roles::Role;
    use crate::txn::UnitOfWork;

    async fn authority_with(
        rank: u32,
        permissions: CapabilitySet) -> (PermissionAuthority, RoleId,
    ) {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let roles = RoleStore::new(Arc::clone(&store)).unwrap();
        let now = Timestamp::now();
        let role = Role {
            id: RoleId::new(),
            name: "Moderator".into(),
            rank: Rank::new(rank),
            permissions,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        let mut uow = UnitOfWork::new(store);
        roles.insert(&role, &mut uow).await.unwrap();
        (PermissionAuthority::new(roles), role.id)
    }

    fn claims(rank: u32) -> SessionClaims {
        let now = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        SessionClaims {
            subject: IdentityId::new(),
            rank: Rank::new(rank),
            issued_at: now,
            expires_at: now.checked_add_secs(3600).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_granted_names_role() {
        let perms = CapabilitySet::empty().with(Capability::BanAccounts);
        let (authority, role_id) = authority_with(4, perms).await;
        let decision = authority
            .authorize(&claims(4), Capability::BanAccounts)
            .await
            .unwrap();
        assert_eq!(
            decision,
            Decision::Granted {
                role_id,
                rank: Rank::new(4)
            }
        );
    }

    #[tokio::test]
    async fn test_denied_and_missing_role() {
        let perms = CapabilitySet::empty().with(Capability::BanAccounts);
        let (authority, _) = authority_with(4, perms).await;
        assert!(matches!(
            authority.authorize(&claims(4), Capability::IPBan).await,
            Err(AuthzError::Denied {
                capability: Capability::IPBan
            })
        ));
        assert!(matches!(
            authority.authorize(&claims(9), Capability::BanAccounts).await,
            Err(AuthzError::RoleNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_named() {
        let perms = CapabilitySet::empty().with(Capability::ViewAuditLogs);
        let (authority, _) = authority_with(4, perms).await;
        assert!(authority.authorize_named(&claims(4), "ViewAuditLogs").await.is_ok());
        assert!(matches!(
            authority.authorize_named(&claims(4), "Nope").await,
            Err(AuthzError::InvalidCapability(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_permits_is_deterministic() {
        for held in 0..=Capability::ALL.len() {
            let set: CapabilitySet = Capability::ALL.into_iter().take(held).collect();
            for cap in Capability::ALL {
                assert_eq!(permits(set, cap), permits(set, cap));
                assert_eq!(permits(set, cap), set.iter().any(|c| c == cap));
            }
        }
    }
}
