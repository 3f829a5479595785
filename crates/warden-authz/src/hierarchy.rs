//! Escalation checks over the role hierarchy.
//!
//! An actor may only act on roles, and on identities holding roles, whose
//! rank is strictly below its own. Ranks are re-read from the stores for
//! every check; the rank snapshot in a session token is never consulted.

use warden_core::{IdentityId, Rank};

use crate::error::{AuthzError, AuthzResult};
use crate::identity::{Identity, IdentityStore};
use crate::roles::{Role, RoleStore};

/// Allow iff `actor` strictly outranks `target`.
///
/// # Errors
///
/// Returns [`AuthzError::InsufficientRank`] when `actor <= target`.
pub fn check_escalation(actor: Rank, target: Rank) -> AuthzResult<()> {
    if actor.outranks(target) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRank { actor, target })
    }
}

/// An identity together with its current role.
#[derive(Debug, Clone)]
pub struct Ranked {
    /// The identity.
    pub identity: Identity,
    /// The role it holds right now.
    pub role: Role,
}

impl Ranked {
    /// The identity's current rank.
    #[must_use]
    pub fn rank(&self) -> Rank {
        self.role.rank
    }
}

/// Resolves current ranks for escalation checks.
#[derive(Debug, Clone)]
pub struct HierarchyGuard {
    identities: IdentityStore,
    roles: RoleStore,
}

impl HierarchyGuard {
    /// Create a guard over the identity and role stores.
    #[must_use]
    pub fn new(identities: IdentityStore, roles: RoleStore) -> Self {
        Self { identities, roles }
    }

    async fn ranked(&self, id: IdentityId) -> AuthzResult<Ranked> {
        let identity = self.identities.require(id).await?;
        let role = self
            .roles
            .get(identity.role_id)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(identity.role_id.to_string()))?;
        Ok(Ranked { identity, role })
    }

    /// Re-read the acting identity.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidCredentials`] if the identity no longer exists
    /// - [`AuthzError::IdentitySuspended`] if it has been suspended
    /// - [`AuthzError::RoleNotFound`] if its role is missing
    pub async fn actor(&self, id: IdentityId) -> AuthzResult<Ranked> {
        let actor = match self.ranked(id).await {
            Err(AuthzError::NotFound { .. }) => return Err(AuthzError::InvalidCredentials),
            other => other?,
        };
        if actor.identity.suspended {
            return Err(AuthzError::IdentitySuspended);
        }
        Ok(actor)
    }

    /// Re-read a target identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::NotFound`] if the identity does not exist.
    pub async fn target(&self, id: IdentityId) -> AuthzResult<Ranked> {
        self.ranked(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_ordering() {
        assert!(check_escalation(Rank::new(5), Rank::new(4)).is_ok());
        assert!(matches!(
            check_escalation(Rank::new(3), Rank::new(5)),
            Err(AuthzError::InsufficientRank { .. })
        ));
        assert!(check_escalation(Rank::new(4), Rank::new(4)).is_err());
        assert!(check_escalation(Rank::ZERO, Rank::ZERO).is_err());
    }

    #[test]
    fn test_total_over_small_ranks() {
        for actor in 0..8u32 {
            for target in 0..8u32 {
                let allowed = check_escalation(Rank::new(actor), Rank::new(target)).is_ok();
                assert_eq!(allowed, actor > target);
            }
        }
    }
}
