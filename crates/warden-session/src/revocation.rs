//! Subject-keyed session denylist.

use dashmap::DashMap;
use warden_core::{IdentityId, Timestamp};

use crate::claims::SessionClaims;

/// Tokens of a listed subject issued at or before the recorded instant are
/// refused.
///
/// The list is process-local. An entry is only useful until every token it
/// covers has expired, so [`prune`](Self::prune) drops older entries.
#[derive(Debug, Default)]
pub struct RevocationList {
    revoked_before: DashMap<IdentityId, Timestamp>,
}

impl RevocationList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke every session of `subject` issued at or before `at`.
    pub fn revoke(&self, subject: IdentityId, at: Timestamp) {
        let at = at.truncate_to_secs();
        self.revoked_before
            .entry(subject)
            .and_modify(|existing| {
                if at > *existing {
                    *existing = at;
                }
            })
            .or_insert(at);
        tracing::info!(subject = %subject, revoked_before = %at, "revoked sessions");
    }

    /// Remove `subject` from the list.
    pub fn lift(&self, subject: IdentityId) {
        if self.revoked_before.remove(&subject).is_some() {
            tracing::info!(subject = %subject, "lifted session revocation");
        }
    }

    /// Whether the token described by `claims` is revoked.
    #[must_use]
    pub fn is_revoked(&self, claims: &SessionClaims) -> bool {
        self.revoked_before
            .get(&claims.subject)
            .is_some_and(|cutoff| claims.issued_at <= *cutoff)
    }

    /// Drop entries that can no longer match an unexpired token.
    ///
    /// `horizon_secs` is the token lifetime plus the clock skew.
    pub fn prune(&self, now: Timestamp, horizon_secs: u64) {
        let Some(oldest_live_issue) = now.checked_sub_secs(horizon_secs) else {
            return;
        };
        self.revoked_before
            .retain(|_, cutoff| *cutoff >= oldest_live_issue);
    }

    /// Number of subjects on the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revoked_before.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revoked_before.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Rank;

    fn at(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(secs).unwrap()
    }

    fn claims(subject: IdentityId, issued: i64) -> SessionClaims {
        SessionClaims {
            subject,
            rank: Rank::ZERO,
            issued_at: at(issued),
            expires_at: at(issued + 3600),
        }
    }

    #[test]
    fn test_revocation_cutoff() {
        let list = RevocationList::new();
        let subject = IdentityId::new();
        list.revoke(subject, at(100));

        assert!(list.is_revoked(&claims(subject, 50)));
        assert!(list.is_revoked(&claims(subject, 100)));
        assert!(!list.is_revoked(&claims(subject, 101)));
        assert!(!list.is_revoked(&claims(IdentityId::new(), 50)));
    }

    #[test]
    fn test_revoke_keeps_latest_cutoff() {
        let list = RevocationList::new();
        let subject = IdentityId::new();
        list.revoke(subject, at(200));
        list.revoke(subject, at(100));
        assert!(list.is_revoked(&claims(subject, 150)));
    }

    #[test]
    fn test_lift_clears_same_second_cutoff() {
        let list = RevocationList::new();
        let subject = IdentityId::new();
        let other = IdentityId::new();
        list.revoke(subject, at(100));
        list.revoke(other, at(100));

        list.lift(subject);
        assert!(!list.is_revoked(&claims(subject, 100)));
        assert!(list.is_revoked(&claims(other, 100)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_prune() {
        let list = RevocationList::new();
        list.revoke(IdentityId::new(), at(100));
        list.revoke(IdentityId::new(), at(5_000));
        assert_eq!(list.len(), 2);

        list.prune(at(5_000), 3_630);
        assert_eq!(list.len(), 1);
    }
}
