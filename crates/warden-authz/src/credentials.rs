//! Registration and password authentication.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use warden_core::{IdentityId, Timestamp};
use warden_crypto::PasswordHasher;
use warden_session::{SessionClaims, SessionCodec, SessionToken};
use zeroize::Zeroizing;

use crate::error::{AuthzError, AuthzResult};
use crate::identity::{Identity, IdentityStore, Profile, normalize};
use crate::roles::{Role, RoleStore};
use crate::txn::UnitOfWork;

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{3,32}$").expect("invalid regex"));

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("invalid regex"));

/// Longest accepted email address.
const MAX_EMAIL_LEN: usize = 254;

/// Fields submitted at registration.
pub struct Registration {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Plaintext secret, wiped on drop.
    pub secret: Zeroizing<String>,
    /// Optional linked accounts.
    pub profile: Profile,
}

impl Registration {
    /// Build a registration without profile fields.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            secret: Zeroizing::new(secret.into()),
            profile: Profile::default(),
        }
    }

    /// Attach linked accounts.
    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct Session {
    /// The bearer token to hand to the client.
    pub token: SessionToken,
    /// What the token asserts.
    pub claims: SessionClaims,
}

/// Registers identities and exchanges secrets for session tokens.
#[derive(Clone)]
pub struct CredentialVerifier {
    identities: IdentityStore,
    roles: RoleStore,
    hasher: Arc<PasswordHasher>,
    codec: Arc<SessionCodec>,
    min_secret_len: usize,
    default_role: String,
}

impl CredentialVerifier {
    /// Create a verifier.
    #[must_use]
    pub fn new(
        identities: IdentityStore,
        roles: RoleStore,
        hasher: Arc<PasswordHasher>,
        codec: Arc<SessionCodec>,
        min_secret_len: usize,
        default_role: impl Into<String>,
    ) -> Self {
        Self {
            identities,
            roles,
            hasher,
            codec,
            min_secret_len,
            default_role: default_role.into(),
        }
    }

    /// The session codec tokens are issued with.
    #[must_use]
    pub fn codec(&self) -> &Arc<SessionCodec> {
        &self.codec
    }

    fn validate(&self, registration: &Registration) -> AuthzResult<()> {
        if !USERNAME_REGEX.is_match(&registration.username) {
            return Err(AuthzError::InvalidInput(
                "username must be 3-32 characters of letters, digits, '_', '.' or '-'".into(),
            ));
        }
        let email = registration.email.trim();
        if email.len() > MAX_EMAIL_LEN || !EMAIL_REGEX.is_match(email) {
            return Err(AuthzError::InvalidInput("email address is invalid".into()));
        }
        if registration.secret.chars().count() < self.min_secret_len {
            return Err(AuthzError::InvalidInput(format!(
                "secret must be at least {} characters",
                self.min_secret_len
            )));
        }
        Ok(())
    }

    /// Register a new identity holding the default role.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidInput`] if a field fails validation
    /// - [`AuthzError::DuplicateIdentity`] if the username or email is taken
    /// - [`AuthzError::RoleNotFound`] if the default role does not exist
    pub async fn register(
        &self,
        registration: Registration,
        now: Timestamp,
    ) -> AuthzResult<Identity> {
        let role = self
            .roles
            .by_name(&self.default_role)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(self.default_role.clone()))?;

        let mut uow = UnitOfWork::new(Arc::clone(self.identities.store()));
        let enrolled = self.enroll(registration, &role, now, &mut uow).await;
        let identity = uow.settle(enrolled).await?;
        uow.commit();

        tracing::info!(identity = %identity.id, role = %role.name, "identity registered");
        Ok(identity)
    }

    /// Validate, hash and insert a registration holding `role`.
    pub(crate) async fn enroll(
        &self,
        registration: Registration,
        role: &Role,
        now: Timestamp,
        uow: &mut UnitOfWork,
    ) -> AuthzResult<Identity> {
        self.validate(&registration)?;

        let hasher = Arc::clone(&self.hasher);
        let secret = registration.secret;
        let credential_hash = tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| AuthzError::Internal(e.to_string()))??;

        let identity = Identity {
            id: IdentityId::new(),
            username: registration.username,
            email: normalize(&registration.email),
            credential_hash,
            role_id: role.id,
            suspended: false,
            flagged: false,
            profile: registration.profile,
            created_at: now,
        };
        self.identities.insert(&identity, uow).await?;
        Ok(identity)
    }

    /// Exchange an email and secret for a session token.
    ///
    /// Unknown emails are checked against a dummy hash so both failure
    /// paths run one argon2 verification. Suspension is only reported once
    /// the secret has matched.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidCredentials`] for an unknown email or wrong secret
    /// - [`AuthzError::IdentitySuspended`] if the identity is banned
    /// - [`AuthzError::RoleNotFound`] if the identity's role is missing
    pub async fn authenticate(
        &self,
        email: &str,
        secret: &str,
        now: Timestamp,
    ) -> AuthzResult<Session> {
        let identity = self.identities.by_email(email).await?;

        let hasher = Arc::clone(&self.hasher);
        let secret = Zeroizing::new(secret.to_string());
        let stored = identity.as_ref().map(|i| i.credential_hash.clone());
        let matched = tokio::task::spawn_blocking(move || match stored {
            Some(hash) => hasher.verify(&secret, &hash),
            None => Ok(hasher.verify_dummy(&secret)),
        })
        .await
        .map_err(|e| AuthzError::Internal(e.to_string()))??;

        let identity = match identity {
            Some(identity) if matched => identity,
            _ => return Err(AuthzError::InvalidCredentials),
        };
        if identity.suspended {
            return Err(AuthzError::IdentitySuspended);
        }

        let role = self
            .roles
            .get(identity.role_id)
            .await?
            .ok_or_else(|| AuthzError::RoleNotFound(identity.role_id.to_string()))?;

        let token = self.codec.issue(identity.id, role.rank, now)?;
        let claims = self.codec.verify(token.as_str(), now)?;
        tracing::debug!(identity = %identity.id, rank = %role.rank, "session issued");
        Ok(Session { token, claims })
    }

    /// Verify a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Token`] if the codec rejects the token.
    pub fn verify(&self, token: &str, now: Timestamp) -> AuthzResult<SessionClaims> {
        Ok(self.codec.verify(token, now)?)
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("min_secret_len", &self.min_secret_len)
            .field("default_role", &self.default_role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{Capability, CapabilitySet, Rank, RoleId};
    use warden_crypto::{MacKey, PasswordParams};
    use warden_session::SessionConfig;
    use warden_storage::{KvStore, MemoryKvStore};

    async fn verifier() -> CredentialVerifier {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let roles = RoleStore::new(Arc::clone(&store)).unwrap();
        let identities = IdentityStore::new(Arc::clone(&store)).unwrap();
        let now = Timestamp::now();
        let mut uow = UnitOfWork::new(Arc::clone(&store));
        roles
            .insert(
                &Role {
                    id: RoleId::new(),
                    name: "User".into(),
                    rank: Rank::new(2),
                    permissions: CapabilitySet::empty().with(Capability::AccessGamesTab),
                    created_by: None,
                    created_at: now,
                    updated_at: now,
                },
                &mut uow,
            )
            .await
            .unwrap();

        let hasher = PasswordHasher::new(PasswordParams {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        let codec = SessionCodec::new(MacKey::generate(), SessionConfig::default()).unwrap();
        CredentialVerifier::new(identities, roles, Arc::new(hasher), Arc::new(codec), 8, "User")
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let verifier = verifier().await;
        let now = Timestamp::now();
        let identity = verifier
            .register(Registration::new("alice", "Alice@Example.com", "correct horse"), now)
            .await
            .unwrap();
        assert_eq!(identity.email, "alice@example.com");
        assert!(identity.credential_hash.starts_with("$argon2id$"));

        let session = verifier
            .authenticate("alice@example.com", "correct horse", now)
            .await
            .unwrap();
        assert_eq!(session.claims.subject, identity.id);
        assert_eq!(session.claims.rank, Rank::new(2));

        let claims = verifier.verify(session.token.as_str(), now).unwrap();
        assert_eq!(claims, session.claims);
    }

    #[tokio::test]
    async fn test_wrong_secret_and_unknown_email_look_alike() {
        let verifier = verifier().await;
        let now = Timestamp::now();
        verifier
            .register(Registration::new("alice", "alice@example.com", "correct horse"), now)
            .await
            .unwrap();

        let wrong = verifier.authenticate("alice@example.com", "battery staple", now).await;
        let unknown = verifier.authenticate("nobody@example.com", "correct horse", now).await;
        assert!(matches!(wrong, Err(AuthzError::InvalidCredentials)));
        assert!(matches!(unknown, Err(AuthzError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let verifier = verifier().await;
        let now = Timestamp::now();
        for registration in [
            Registration::new("al", "al@example.com", "long enough"),
            Registration::new("bad name", "b@example.com", "long enough"),
            Registration::new("carol", "not-an-email", "long enough"),
            Registration::new("dave", "dave@example.com", "short"),
        ] {
            let result = verifier.register(registration, now).await;
            assert!(matches!(result, Err(AuthzError::InvalidInput(_))));
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let verifier = verifier().await;
        let now = Timestamp::now();
        verifier
            .register(Registration::new("alice", "alice@example.com", "correct horse"), now)
            .await
            .unwrap();
        let result = verifier
            .register(Registration::new("alice2", "ALICE@example.com", "correct horse"), now)
            .await;
        assert!(matches!(result, Err(AuthzError::DuplicateIdentity { field: "email" })));
        assert!(verifier.identities.by_username("alice2").await.unwrap().is_none());
    }
}
