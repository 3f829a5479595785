//! Privileged operations.
//!
//! Every mutating operation runs the same sequence:
//! identify the caller, check the capability, re-check the hierarchy against
//! current ranks (role and identity mutations only), apply the effect, write
//! the audit entry, then hand the entry to the notifier.
//!
//! A failure before the effect leaves no trace except a `warn` on the
//! [`SECURITY_TARGET`] log. A failure to write the audit entry rolls the
//! effect back and fails the operation.
//!
//! Every operation that writes store rows holds the mutation gate from its
//! first write until the audit entry is sealed, so a rollback never restores
//! over a row another operation has committed since.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use warden_audit::{AuditEntry, AuditKind, AuditLog, AuditRecord, ChainVerificationResult};
use warden_core::{Capability, CapabilitySet, IdentityId, Rank, RoleId, ServiceKeyId, Timestamp};
use warden_crypto::{MacKey, PasswordHasher};
use warden_notify::{Notifier, notifies};
use warden_session::{RevocationList, SessionClaims, SessionCodec};
use warden_storage::KvStore;
use warden_telemetry::SECURITY_TARGET;

use crate::authority::{Decision, PermissionAuthority};
use crate::config::AuthzConfig;
use crate::credentials::{CredentialVerifier, Registration, Session};
use crate::effect::{Effect, GamePing, ModerationAction, ScriptRequest};
use crate::error::{AuthzError, AuthzResult};
use crate::headers::Credentials;
use crate::hierarchy::{HierarchyGuard, Ranked, check_escalation};
use crate::identity::{Identity, IdentityStore};
use crate::roles::{Role, RoleDraft, RoleStore};
use crate::service_keys::{IssuedKey, ServiceKey, ServiceKeyAuthenticator};
use crate::settings::{SettingKey, SettingsStore};
use crate::txn::UnitOfWork;

/// Longest accepted ban reason or moderator note.
const MAX_NOTE_LEN: usize = 1000;

/// Which audit entries a read returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditQuery {
    /// Every entry in chain order.
    All,
    /// The newest entries, newest first.
    Recent(usize),
    /// Entries of one kind.
    Kind(AuditKind),
    /// Entries by one actor.
    Actor(IdentityId),
    /// Entries about one target.
    Target(String),
}

/// What [`Gatekeeper::bootstrap`] created.
#[derive(Debug, Clone)]
pub struct Bootstrapped {
    /// The all-capability root role.
    pub root: Role,
    /// The role new registrations receive.
    pub default: Role,
    /// The owner identity, if one was enrolled.
    pub owner: Option<Identity>,
    /// The `bootstrap` audit entry.
    pub entry: AuditEntry,
}

/// Entry point for every privileged request.
pub struct Gatekeeper {
    store: Arc<dyn KvStore>,
    roles: RoleStore,
    identities: IdentityStore,
    keys: ServiceKeyAuthenticator,
    settings: SettingsStore,
    credentials: CredentialVerifier,
    authority: PermissionAuthority,
    guard: HierarchyGuard,
    audit: Arc<AuditLog>,
    notifier: Notifier,
    revocations: Option<Arc<RevocationList>>,
    mutation_gate: Mutex<()>,
    config: AuthzConfig,
}

impl Gatekeeper {
    /// Assemble the core over one store.
    ///
    /// # Errors
    ///
    /// Returns an error if the password or session settings are unusable.
    pub fn new(
        store: Arc<dyn KvStore>,
        audit: Arc<AuditLog>,
        session_key: MacKey,
        notifier: Notifier,
        config: AuthzConfig,
    ) -> AuthzResult<Self> {
        let roles = RoleStore::new(Arc::clone(&store))?;
        let identities = IdentityStore::new(Arc::clone(&store))?;
        let keys = ServiceKeyAuthenticator::new(Arc::clone(&store))?;
        let settings = SettingsStore::new(Arc::clone(&store), config.webhook_policy.clone())?;

        let hasher = Arc::new(PasswordHasher::new(config.password)?);
        let mut codec = SessionCodec::new(session_key, config.session)
            .map_err(|e| AuthzError::InvalidInput(e.to_string()))?;
        let revocations = config.revoke_on_suspend.then(|| Arc::new(RevocationList::new()));
        if let Some(list) = &revocations {
            codec = codec.with_revocations(Arc::clone(list));
        }

        let credentials = CredentialVerifier::new(
            identities.clone(),
            roles.clone(),
            hasher,
            Arc::new(codec),
            config.min_secret_len,
            config.default_role.clone(),
        );

        Ok(Self {
            authority: PermissionAuthority::new(roles.clone()),
            guard: HierarchyGuard::new(identities.clone(), roles.clone()),
            store,
            roles,
            identities,
            keys,
            settings,
            credentials,
            audit,
            notifier,
            revocations,
            mutation_gate: Mutex::new(()),
            config,
        })
    }

    /// The audit log.
    #[must_use]
    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// The role store.
    #[must_use]
    pub fn roles(&self) -> &RoleStore {
        &self.roles
    }

    /// The identity store.
    #[must_use]
    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    /// The service key authenticator.
    #[must_use]
    pub fn service_keys(&self) -> &ServiceKeyAuthenticator {
        &self.keys
    }

    /// The settings store.
    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// The credential verifier.
    #[must_use]
    pub fn credentials(&self) -> &CredentialVerifier {
        &self.credentials
    }

    /// The permission authority.
    #[must_use]
    pub fn authority(&self) -> &PermissionAuthority {
        &self.authority
    }

    // -- Identity establishment --

    /// Register a new identity holding the default role. Not audited.
    ///
    /// # Errors
    ///
    /// See [`CredentialVerifier::register`].
    pub async fn register(&self, registration: Registration) -> AuthzResult<Identity> {
        self.credentials
            .register(registration, Timestamp::now())
            .await
    }

    /// Exchange an email and secret for a session.
    ///
    /// # Errors
    ///
    /// See [`CredentialVerifier::authenticate`].
    pub async fn authenticate(&self, email: &str, secret: &str) -> AuthzResult<Session> {
        self.credentials
            .authenticate(email, secret, Timestamp::now())
            .await
            .map_err(|e| refuse("authenticate", None, e))
    }

    /// Verify a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Token`] if the token is rejected.
    pub fn verify(&self, token: &str) -> AuthzResult<SessionClaims> {
        self.credentials
            .verify(token, Timestamp::now())
            .map_err(|e| refuse("verify", None, e))
    }

    /// Verify the bearer token in a request's headers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::MissingCredentials`] without a bearer token, or
    /// [`AuthzError::Token`] if it is rejected.
    pub fn identify(&self, credentials: &Credentials) -> AuthzResult<SessionClaims> {
        let token = credentials
            .session_token()
            .map_err(|e| refuse("identify", None, e))?;
        self.verify(token)
    }

    /// Resolve a presented service key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::UnknownKey`] if no key matches.
    pub async fn validate_key(&self, key_value: &str) -> AuthzResult<ServiceKey> {
        self.keys
            .validate(key_value)
            .await
            .map_err(|e| refuse("validate_key", None, e))
    }

    /// Check a capability for a session.
    ///
    /// # Errors
    ///
    /// See [`PermissionAuthority::authorize`].
    pub async fn authorize(
        &self,
        claims: &SessionClaims,
        capability: Capability,
    ) -> AuthzResult<Decision> {
        self.admit("authorize", claims, capability).await
    }

    /// Read a public setting.
    ///
    /// # Errors
    ///
    /// See [`SettingsStore::get_public`].
    pub async fn get_setting(&self, key: &str) -> AuthzResult<String> {
        self.settings.get_public(key).await
    }

    // -- Role administration --

    /// Create a role below the actor's rank.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Denied`] without `PromoteDemoteUsers`
    /// - [`AuthzError::InsufficientRank`] unless the actor outranks `draft.rank`
    /// - [`AuthzError::Conflict`] if the name or rank is taken
    pub async fn create_role(&self, claims: &SessionClaims, draft: RoleDraft) -> AuthzResult<Role> {
        const OP: &str = "create_role";
        let draft = draft.validate()?;
        let (gate, actor) = self.begin(OP, claims, Capability::PromoteDemoteUsers).await?;
        escalation(OP, &actor, draft.rank)?;

        let now = Timestamp::now();
        let role = Role {
            id: RoleId::new(),
            name: draft.name,
            rank: draft.rank,
            permissions: draft.permissions,
            created_by: Some(actor.identity.id),
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.unit();
        let inserted = self.roles.insert(&role, &mut uow).await;
        uow.settle(inserted).await?;

        let record = AuditRecord::new(AuditKind::RoleCreated)
            .actor(actor.identity.id)
            .target(role.id)
            .payload(json!({
                "name": role.name,
                "rank": role.rank,
                "permissions": role.permissions,
            }));
        let entry = self.seal(uow, None, record).await?;
        drop(gate);

        self.announce(&entry).await;
        Ok(role)
    }

    /// Replace a role's name, rank and permissions.
    ///
    /// The actor must outrank both the role's current rank and the new one.
    ///
    /// # Errors
    ///
    /// As [`create_role`](Self::create_role), plus [`AuthzError::NotFound`].
    pub async fn update_role(
        &self,
        claims: &SessionClaims,
        role_id: RoleId,
        draft: RoleDraft,
    ) -> AuthzResult<Role> {
        const OP: &str = "update_role";
        let draft = draft.validate()?;
        let (gate, actor) = self.begin(OP, claims, Capability::PromoteDemoteUsers).await?;
        let current = self.roles.require(role_id).await?;
        escalation(OP, &actor, current.rank)?;
        escalation(OP, &actor, draft.rank)?;

        let updated = Role {
            name: draft.name,
            rank: draft.rank,
            permissions: draft.permissions,
            updated_at: Timestamp::now(),
            ..current.clone()
        };

        let mut uow = self.unit();
        let replaced = self.roles.replace(&current, &updated, &mut uow).await;
        uow.settle(replaced).await?;

        let record = AuditRecord::new(AuditKind::RoleUpdated)
            .actor(actor.identity.id)
            .target(role_id)
            .payload(json!({
                "change": "definition",
                "name": updated.name,
                "rank": updated.rank,
                "permissions": updated.permissions,
                "previous_name": current.name,
                "previous_rank": current.rank,
            }));
        let entry = self.seal(uow, None, record).await?;
        drop(gate);

        self.announce(&entry).await;
        Ok(updated)
    }

    /// Delete a role nobody holds.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InsufficientRank`] unless the actor outranks the role
    /// - [`AuthzError::Conflict`] if the role is assigned or is the default role
    pub async fn delete_role(&self, claims: &SessionClaims, role_id: RoleId) -> AuthzResult<Role> {
        const OP: &str = "delete_role";
        let (gate, actor) = self.begin(OP, claims, Capability::PromoteDemoteUsers).await?;
        let role = self.roles.require(role_id).await?;
        escalation(OP, &actor, role.rank)?;

        if role.name.eq_ignore_ascii_case(&self.config.default_role) {
            return Err(AuthzError::Conflict(
                "the default role cannot be deleted".into(),
            ));
        }
        let holders = self.identities.holders_of(role_id).await?;
        if holders > 0 {
            return Err(AuthzError::Conflict(format!(
                "role is assigned to {holders} identities"
            )));
        }

        let mut uow = self.unit();
        let removed = self.roles.remove(&role, &mut uow).await;
        uow.settle(removed).await?;

        let record = AuditRecord::new(AuditKind::RoleDeleted)
            .actor(actor.identity.id)
            .target(role_id)
            .payload(json!({ "name": role.name, "rank": role.rank }));
        let entry = self.seal(uow, None, record).await?;
        drop(gate);

        self.announce(&entry).await;
        Ok(role)
    }

    /// Move an identity to another role.
    ///
    /// The actor must outrank the identity's current role and the new role.
    /// Sessions already issued keep the rank they carry until they expire.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InsufficientRank`] on either hierarchy check
    /// - [`AuthzError::NotFound`] if the identity or role does not exist
    pub async fn assign_role(
        &self,
        claims: &SessionClaims,
        identity_id: IdentityId,
        role_id: RoleId,
    ) -> AuthzResult<Identity> {
        const OP: &str = "assign_role";
        let (gate, actor) = self.begin(OP, claims, Capability::PromoteDemoteUsers).await?;
        let target = self.guard.target(identity_id).await?;
        let role = self.roles.require(role_id).await?;
        escalation(OP, &actor, target.rank())?;
        escalation(OP, &actor, role.rank)?;

        let mut identity = target.identity.clone();
        identity.role_id = role.id;

        let mut uow = self.unit();
        let updated = self.identities.update(&identity, &mut uow).await;
        uow.settle(updated).await?;

        let record = AuditRecord::new(AuditKind::RoleUpdated)
            .actor(actor.identity.id)
            .target(identity_id)
            .payload(json!({
                "change": "assignment",
                "role_id": role.id,
                "role_name": role.name,
                "rank": role.rank,
                "previous_role_id": target.role.id,
                "previous_rank": target.rank(),
            }));
        let entry = self.seal(uow, None, record).await?;
        drop(gate);

        self.announce(&entry).await;
        Ok(identity)
    }

    // -- Identity moderation --

    /// Suspend an identity.
    ///
    /// With revocation enabled, its outstanding sessions stop verifying.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Denied`] without `BanAccounts`
    /// - [`AuthzError::InsufficientRank`] unless the actor outranks the target
    /// - [`AuthzError::Conflict`] if the identity is already suspended
    pub async fn ban_identity(
        &self,
        claims: &SessionClaims,
        identity_id: IdentityId,
        reason: &str,
    ) -> AuthzResult<Identity> {
        const OP: &str = "ban_identity";
        let reason = note(reason, "reason")?;
        let (gate, actor, target) = self
            .begin_on_identity(OP, claims, Capability::BanAccounts, identity_id)
            .await?;
        if target.identity.suspended {
            return Err(AuthzError::Conflict("identity is already suspended".into()));
        }

        let mut identity = target.identity;
        identity.suspended = true;
        let record = AuditRecord::new(AuditKind::Ban)
            .actor(actor.identity.id)
            .target(identity_id)
            .payload(json!({ "reason": reason }));
        let entry = self.write_identity(&identity, record).await?;

        if let Some(revocations) = &self.revocations {
            let now = Timestamp::now();
            revocations.revoke(identity_id, now);
            let session = self.config.session;
            revocations.prune(now, session.ttl_secs.saturating_add(session.clock_skew_secs));
        }
        drop(gate);

        self.announce(&entry).await;
        Ok(identity)
    }

    /// Lift a suspension. Sessions revoked by the ban verify again.
    ///
    /// # Errors
    ///
    /// As [`ban_identity`](Self::ban_identity); [`AuthzError::Conflict`] if
    /// the identity is not suspended.
    pub async fn reinstate_identity(
        &self,
        claims: &SessionClaims,
        identity_id: IdentityId,
    ) -> AuthzResult<Identity> {
        const OP: &str = "reinstate_identity";
        let (gate, actor, target) = self
            .begin_on_identity(OP, claims, Capability::BanAccounts, identity_id)
            .await?;
        if !target.identity.suspended {
            return Err(AuthzError::Conflict("identity is not suspended".into()));
        }

        let mut identity = target.identity;
        identity.suspended = false;
        let record = AuditRecord::new(AuditKind::Unban)
            .actor(actor.identity.id)
            .target(identity_id);
        let entry = self.write_identity(&identity, record).await?;
        if let Some(revocations) = &self.revocations {
            revocations.lift(identity_id);
        }
        drop(gate);

        self.announce(&entry).await;
        Ok(identity)
    }

    /// Attach a moderator note and flag the identity.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Denied`] without `WhitelistUsers`
    /// - [`AuthzError::InsufficientRank`] unless the actor outranks the target
    pub async fn flag_identity(
        &self,
        claims: &SessionClaims,
        identity_id: IdentityId,
        note_text: &str,
    ) -> AuthzResult<Identity> {
        const OP: &str = "flag_identity";
        let note_text = note(note_text, "note")?;
        let (gate, actor, target) = self
            .begin_on_identity(OP, claims, Capability::WhitelistUsers, identity_id)
            .await?;

        let mut identity = target.identity;
        identity.flagged = true;
        let record = AuditRecord::new(AuditKind::ModNote)
            .actor(actor.identity.id)
            .target(identity_id)
            .payload(json!({ "note": note_text }));
        let entry = self.write_identity(&identity, record).await?;
        drop(gate);

        self.announce(&entry).await;
        Ok(identity)
    }

    // -- Service keys and settings --

    /// Generate a service key. The plaintext is only in the return value.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Denied`] without `ApproveGameAccess`
    /// - [`AuthzError::InvalidInput`] for an empty scope
    pub async fn issue_service_key(
        &self,
        claims: &SessionClaims,
        scope: &str,
    ) -> AuthzResult<IssuedKey> {
        self.admit("issue_service_key", claims, Capability::ApproveGameAccess)
            .await?;
        let gate = self.mutation_gate.lock().await;

        let mut uow = self.unit();
        let issued = self
            .keys
            .issue(scope, claims.subject, Timestamp::now(), &mut uow)
            .await;
        let issued = uow.settle(issued).await?;

        let record = AuditRecord::new(AuditKind::ApiKeyCreated)
            .actor(claims.subject)
            .target(issued.record.id)
            .payload(json!({ "scope": issued.record.scope }));
        let entry = self.seal(uow, None, record).await?;
        drop(gate);

        self.announce(&entry).await;
        Ok(issued)
    }

    /// Delete a service key.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Denied`] without `ApproveGameAccess`
    /// - [`AuthzError::NotFound`] if the key does not exist
    pub async fn revoke_service_key(
        &self,
        claims: &SessionClaims,
        key_id: ServiceKeyId,
    ) -> AuthzResult<ServiceKey> {
        self.admit("revoke_service_key", claims, Capability::ApproveGameAccess)
            .await?;
        let gate = self.mutation_gate.lock().await;

        let mut uow = self.unit();
        let revoked = self.keys.revoke(key_id, &mut uow).await;
        let revoked = uow.settle(revoked).await?;

        let record = AuditRecord::new(AuditKind::ApiKeyRevoked)
            .actor(claims.subject)
            .target(key_id)
            .payload(json!({ "scope": revoked.scope }));
        let entry = self.seal(uow, None, record).await?;
        drop(gate);

        self.announce(&entry).await;
        Ok(revoked)
    }

    /// Validate and write a setting. Secret values are redacted in the audit
    /// entry and the notification.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Denied`] without `ApproveGameAccess`
    /// - [`AuthzError::InvalidInput`] for an unknown key or rejected value
    pub async fn update_setting(
        &self,
        claims: &SessionClaims,
        key: &str,
        value: &str,
    ) -> AuthzResult<()> {
        self.admit("update_setting", claims, Capability::ApproveGameAccess)
            .await?;
        let key: SettingKey = key.parse()?;
        let gate = self.mutation_gate.lock().await;

        let mut uow = self.unit();
        let written = self
            .settings
            .put(key, value, claims.subject, Timestamp::now(), &mut uow)
            .await;
        uow.settle(written).await?;

        let record = AuditRecord::new(AuditKind::SettingsUpdate)
            .actor(claims.subject)
            .target(format!("setting:{key}"))
            .payload(json!({ "key": key.as_str(), "value": key.displayed(value) }));
        let entry = self.seal(uow, None, record).await?;
        drop(gate);

        self.announce(&entry).await;
        Ok(())
    }

    // -- Collaborator effects --

    /// Apply a moderation action.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Denied`] without the action's capability
    /// - [`AuthzError::Effect`] if the effect fails
    /// - [`AuthzError::AuditUnavailable`] if the entry cannot be written; the
    ///   effect has been compensated
    pub async fn moderate(
        &self,
        claims: &SessionClaims,
        action: &ModerationAction,
        effect: &dyn Effect,
    ) -> AuthzResult<AuditEntry> {
        action.validate()?;
        self.admit("moderate", claims, action.capability()).await?;

        apply(effect).await?;
        let mut record = AuditRecord::new(action.kind())
            .actor(claims.subject)
            .payload(action.payload());
        if let Some(target) = action.target() {
            record = record.target(target);
        }
        let entry = self.seal(self.unit(), Some(effect), record).await?;

        self.announce(&entry).await;
        Ok(entry)
    }

    /// Run a script through the executor. Requires both a session holding
    /// `UseExecutor` and a valid service key.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::Denied`] without `UseExecutor`
    /// - [`AuthzError::UnknownKey`] if the key does not match
    /// - [`AuthzError::Effect`] or [`AuthzError::AuditUnavailable`] as for
    ///   [`moderate`](Self::moderate)
    pub async fn dispatch_script(
        &self,
        claims: &SessionClaims,
        key_value: &str,
        request: &ScriptRequest,
        effect: &dyn Effect,
    ) -> AuthzResult<AuditEntry> {
        request.validate()?;
        self.admit("dispatch_script", claims, Capability::UseExecutor)
            .await?;
        let key = self.validate_key(key_value).await?;

        apply(effect).await?;
        let record = AuditRecord::new(AuditKind::ScriptExecution)
            .actor(claims.subject)
            .target(&request.target_user)
            .payload(json!({
                "script_id": request.script_id,
                "target_user": request.target_user,
                "game_id": request.game_id,
                "key_id": key.id,
                "scope": key.scope,
            }));
        let entry = self.seal(self.unit(), Some(effect), record).await?;

        self.announce(&entry).await;
        Ok(entry)
    }

    /// Record a game server ping authenticated by service key alone.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::UnknownKey`] if the key does not match
    /// - [`AuthzError::Effect`] or [`AuthzError::AuditUnavailable`] as for
    ///   [`moderate`](Self::moderate)
    pub async fn record_service_event(
        &self,
        key_value: &str,
        ping: &GamePing,
        effect: &dyn Effect,
    ) -> AuthzResult<AuditEntry> {
        ping.validate()?;
        let key = self.validate_key(key_value).await?;

        apply(effect).await?;
        let record = AuditRecord::new(AuditKind::GamePing)
            .target(format!("game:{}", ping.game_id))
            .payload(json!({
                "game_id": ping.game_id,
                "server_id": ping.server_id,
                "player_count": ping.player_count,
                "key_id": key.id,
                "scope": key.scope,
            }));
        self.seal(self.unit(), Some(effect), record).await
    }

    // -- Privileged reads --

    /// Read audit entries.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Denied`] without `ViewAuditLogs`.
    pub async fn audit_log(
        &self,
        claims: &SessionClaims,
        query: AuditQuery,
    ) -> AuthzResult<Vec<AuditEntry>> {
        self.admit("audit_log", claims, Capability::ViewAuditLogs)
            .await?;
        let entries = match query {
            AuditQuery::All => self.audit.entries().await,
            AuditQuery::Recent(limit) => self.audit.recent(limit).await,
            AuditQuery::Kind(kind) => self.audit.entries_by_kind(kind).await,
            AuditQuery::Actor(actor) => self.audit.entries_for_actor(actor).await,
            AuditQuery::Target(target) => self.audit.entries_for_target(&target).await,
        };
        entries.map_err(AuthzError::AuditUnavailable)
    }

    /// Verify the audit chain.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Denied`] without `ViewAuditLogs`.
    pub async fn verify_audit_chain(
        &self,
        claims: &SessionClaims,
    ) -> AuthzResult<ChainVerificationResult> {
        self.admit("verify_audit_chain", claims, Capability::ViewAuditLogs)
            .await?;
        self.audit
            .verify_chain()
            .await
            .map_err(AuthzError::AuditUnavailable)
    }

    /// List every role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Denied`] without `PromoteDemoteUsers`.
    pub async fn list_roles(&self, claims: &SessionClaims) -> AuthzResult<Vec<Role>> {
        self.admit("list_roles", claims, Capability::PromoteDemoteUsers)
            .await?;
        self.roles.list().await
    }

    /// List every service key, without values.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Denied`] without `ApproveGameAccess`.
    pub async fn list_service_keys(&self, claims: &SessionClaims) -> AuthzResult<Vec<ServiceKey>> {
        self.admit("list_service_keys", claims, Capability::ApproveGameAccess)
            .await?;
        self.keys.list().await
    }

    // -- Bootstrap --

    /// Create the root and default roles on an empty role store, optionally
    /// enrolling an owner holding the root role.
    ///
    /// Returns `None` without changes if any role exists.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidInput`] if the root rank is zero or the
    /// owner registration is invalid, or [`AuthzError::AuditUnavailable`].
    pub async fn bootstrap(
        &self,
        owner: Option<Registration>,
    ) -> AuthzResult<Option<Bootstrapped>> {
        let gate = self.mutation_gate.lock().await;
        if !self.roles.is_empty().await? {
            tracing::debug!("roles exist; bootstrap skipped");
            return Ok(None);
        }
        if self.config.root_rank == Rank::ZERO {
            return Err(AuthzError::InvalidInput("root rank must be above zero".into()));
        }

        let now = Timestamp::now();
        let root = Role {
            id: RoleId::new(),
            name: self.config.root_role.clone(),
            rank: self.config.root_rank,
            permissions: CapabilitySet::all(),
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        let default = Role {
            id: RoleId::new(),
            name: self.config.default_role.clone(),
            rank: Rank::ZERO,
            permissions: CapabilitySet::empty().with(Capability::AccessGamesTab),
            created_by: None,
            created_at: now,
            updated_at: now,
        };

        let mut uow = self.unit();
        let created = self.create_bootstrap_rows(&root, &default, owner, now, &mut uow).await;
        let owner = uow.settle(created).await?;

        let record = AuditRecord::new(AuditKind::Bootstrap)
            .target(root.id)
            .payload(json!({
                "root_role": root.name,
                "root_rank": root.rank,
                "default_role": default.name,
                "owner": owner.as_ref().map(|identity| identity.id),
            }));
        let entry = self.seal(uow, None, record).await?;
        drop(gate);

        tracing::info!(root = %root.name, rank = %root.rank, "role hierarchy bootstrapped");
        Ok(Some(Bootstrapped {
            root,
            default,
            owner,
            entry,
        }))
    }

    async fn create_bootstrap_rows(
        &self,
        root: &Role,
        default: &Role,
        owner: Option<Registration>,
        now: Timestamp,
        uow: &mut UnitOfWork,
    ) -> AuthzResult<Option<Identity>> {
        self.roles.insert(root, uow).await?;
        self.roles.insert(default, uow).await?;
        match owner {
            Some(registration) => Ok(Some(
                self.credentials.enroll(registration, root, now, uow).await?,
            )),
            None => Ok(None),
        }
    }

    // -- Internals --

    fn unit(&self) -> UnitOfWork {
        UnitOfWork::new(Arc::clone(&self.store))
    }

    async fn admit(
        &self,
        operation: &'static str,
        claims: &SessionClaims,
        capability: Capability,
    ) -> AuthzResult<Decision> {
        let decision = self
            .authority
            .authorize(claims, capability)
            .await
            .map_err(|e| refuse(operation, Some(claims.subject), e))?;
        tracing::debug!(
            operation,
            subject = %claims.subject,
            role = %decision.role_id(),
            capability = %capability,
            "capability granted"
        );
        Ok(decision)
    }

    /// Check the capability, take the mutation gate and re-read the actor.
    async fn begin(
        &self,
        operation: &'static str,
        claims: &SessionClaims,
        capability: Capability,
    ) -> AuthzResult<(MutexGuard<'_, ()>, Ranked)> {
        self.admit(operation, claims, capability).await?;
        let gate = self.mutation_gate.lock().await;
        let actor = self
            .guard
            .actor(claims.subject)
            .await
            .map_err(|e| refuse(operation, Some(claims.subject), e))?;
        Ok((gate, actor))
    }

    async fn begin_on_identity(
        &self,
        operation: &'static str,
        claims: &SessionClaims,
        capability: Capability,
        target: IdentityId,
    ) -> AuthzResult<(MutexGuard<'_, ()>, Ranked, Ranked)> {
        let (gate, actor) = self.begin(operation, claims, capability).await?;
        let target = self.guard.target(target).await?;
        escalation(operation, &actor, target.rank())?;
        Ok((gate, actor, target))
    }

    async fn write_identity(
        &self,
        identity: &Identity,
        record: AuditRecord,
    ) -> AuthzResult<AuditEntry> {
        let mut uow = self.unit();
        let updated = self.identities.update(identity, &mut uow).await;
        uow.settle(updated).await?;
        self.seal(uow, None, record).await
    }

    /// Append the audit entry, or undo the operation's writes and effect.
    async fn seal(
        &self,
        mut uow: UnitOfWork,
        effect: Option<&dyn Effect>,
        record: AuditRecord,
    ) -> AuthzResult<AuditEntry> {
        let kind = record.kind;
        match self.audit.append(record).await {
            Ok(entry) => {
                uow.commit();
                Ok(entry)
            },
            Err(e) => {
                tracing::error!(kind = %kind, error = %e, "audit append failed; rolling back");
                uow.rollback().await;
                if let Some(effect) = effect {
                    effect.compensate().await;
                }
                Err(AuthzError::AuditUnavailable(e))
            },
        }
    }

    /// Hand an entry to the notifier without waiting on delivery.
    async fn announce(&self, entry: &AuditEntry) {
        if !self.notifier.is_enabled() || !notifies(entry.kind) {
            return;
        }
        let config = self.settings.notify_config().await;
        drop(self.notifier.dispatch(&config, entry));
    }
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("notifier", &self.notifier)
            .field("revocations", &self.revocations.is_some())
            .finish_non_exhaustive()
    }
}

/// Log a refusal on the security target and pass the error through.
fn refuse(operation: &'static str, subject: Option<IdentityId>, err: AuthzError) -> AuthzError {
    if err.is_security_refusal() {
        tracing::warn!(
            target: SECURITY_TARGET,
            operation,
            subject = subject.map(tracing::field::display),
            error = %err,
            "request refused"
        );
    } else if matches!(err, AuthzError::InvalidCapability(_) | AuthzError::RoleNotFound(_)) {
        tracing::error!(operation, error = %err, "authorization misconfigured");
    }
    err
}

fn escalation(operation: &'static str, actor: &Ranked, target: Rank) -> AuthzResult<()> {
    check_escalation(actor.rank(), target)
        .map_err(|e| refuse(operation, Some(actor.identity.id), e))
}

async fn apply(effect: &dyn Effect) -> AuthzResult<()> {
    effect
        .apply()
        .await
        .map_err(|e| AuthzError::Effect(e.to_string()))
}

fn note<'a>(text: &'a str, field: &str) -> AuthzResult<&'a str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AuthzError::InvalidInput(format!("{field} is required")));
    }
    if text.chars().count() > MAX_NOTE_LEN {
        return Err(AuthzError::InvalidInput(format!(
            "{field} exceeds {MAX_NOTE_LEN} characters"
        )));
    }
    Ok(text)
}
