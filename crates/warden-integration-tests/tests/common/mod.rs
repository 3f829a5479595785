//! Shared test harness for integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use warden_audit::{AuditEntry, AuditError, AuditLog, AuditResult, AuditStorage, KvAuditStorage};
use warden_audit::AuditKind;
use warden_authz::{
    AuditQuery, AuthzConfig, Effect, EffectError, Gatekeeper, Identity, Registration, RoleDraft,
};
use warden_core::{AuditEntryId, CapabilitySet, IdentityId};
use warden_crypto::{KeyPair, MacKey, PasswordParams};
use warden_notify::{NotificationChannel, NotifyError, NotifyResult, Notifier, WebhookUrl};
use warden_session::{SessionClaims, SessionToken};
use warden_storage::{KvStore, MemoryKvStore};

pub const OWNER_EMAIL: &str = "owner@example.com";
pub const SECRET: &str = "correct horse battery";
pub const WEBHOOK: &str = "https://discord.com/api/webhooks/42/s3cr3t-token";

/// Argon2 parameters cheap enough for tests.
pub const FAST_PASSWORD: PasswordParams = PasswordParams {
    memory_kib: 256,
    iterations: 1,
    parallelism: 1,
};

// ---------------------------------------------------------------------------
// Audit storage
// ---------------------------------------------------------------------------

/// Audit storage that refuses appends while `failing` is set.
pub struct FlakyAuditStorage {
    pub inner: KvAuditStorage,
    pub failing: AtomicBool,
}

impl FlakyAuditStorage {
    pub fn new() -> Self {
        Self {
            inner: KvAuditStorage::in_memory(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditStorage for FlakyAuditStorage {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuditError::StorageError("injected audit failure".into()));
        }
        self.inner.append(entry).await
    }

    async fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>> {
        self.inner.get(id).await
    }

    async fn head(&self) -> AuditResult<Option<AuditEntry>> {
        self.inner.head().await
    }

    async fn entries(&self) -> AuditResult<Vec<AuditEntry>> {
        self.inner.entries().await
    }

    async fn count(&self) -> AuditResult<usize> {
        self.inner.count().await
    }
}

// ---------------------------------------------------------------------------
// Notification channels
// ---------------------------------------------------------------------------

/// Records every delivered message.
#[derive(Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages arrived, or give up after a second.
    pub async fn wait_for(&self, count: usize) -> Vec<String> {
        for _ in 0..100 {
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.messages()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn deliver(&self, _destination: &WebhookUrl, message: &str) -> NotifyResult<()> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Always fails.
#[derive(Default)]
pub struct FailingChannel {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl NotificationChannel for FailingChannel {
    async fn deliver(&self, _destination: &WebhookUrl, _message: &str) -> NotifyResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Rejected(500))
    }
}

/// Never answers.
#[derive(Default)]
pub struct HangingChannel;

#[async_trait]
impl NotificationChannel for HangingChannel {
    async fn deliver(&self, _destination: &WebhookUrl, _message: &str) -> NotifyResult<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// Counts applications and compensations.
#[derive(Default)]
pub struct CountingEffect {
    pub applied: AtomicUsize,
    pub compensated: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingEffect {
    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }

    pub fn compensated(&self) -> usize {
        self.compensated.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Effect for CountingEffect {
    async fn apply(&self) -> Result<(), EffectError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("collaborator unavailable".into());
        }
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn compensate(&self) {
        self.compensated.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// An identity with a live session.
pub struct Member {
    pub identity: Identity,
    pub token: SessionToken,
    pub claims: SessionClaims,
}

/// A bootstrapped gatekeeper over in-memory stores.
pub struct Harness {
    pub gatekeeper: Arc<Gatekeeper>,
    pub store: Arc<dyn KvStore>,
    pub audit_storage: Arc<FlakyAuditStorage>,
    pub owner: SessionClaims,
}

impl Harness {
    /// Notifications disabled.
    pub async fn new() -> Self {
        Self::build(Notifier::disabled(), FAST_PASSWORD).await
    }

    /// Notifications delivered through `channel`.
    pub async fn with_channel(channel: Arc<dyn NotificationChannel>, timeout: Duration) -> Self {
        Self::build(Notifier::new(channel, timeout), FAST_PASSWORD).await
    }

    /// Notifications disabled, custom argon2 cost.
    pub async fn with_password(params: PasswordParams) -> Self {
        Self::build(Notifier::disabled(), params).await
    }

    async fn build(notifier: Notifier, password: PasswordParams) -> Self {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let audit_storage = Arc::new(FlakyAuditStorage::new());
        let audit = Arc::new(AuditLog::with_storage(
            Arc::clone(&audit_storage) as Arc<dyn AuditStorage>,
            KeyPair::generate(),
        ));
        let config = AuthzConfig {
            password,
            ..AuthzConfig::default()
        };
        let gatekeeper = Gatekeeper::new(
            Arc::clone(&store),
            audit,
            MacKey::generate(),
            notifier,
            config,
        )
        .unwrap();

        gatekeeper
            .bootstrap(Some(Registration::new("owner", OWNER_EMAIL, SECRET)))
            .await
            .unwrap()
            .unwrap();
        let owner = gatekeeper
            .authenticate(OWNER_EMAIL, SECRET)
            .await
            .unwrap()
            .claims;

        Self {
            gatekeeper: Arc::new(gatekeeper),
            store,
            audit_storage,
            owner,
        }
    }

    pub fn email(name: &str) -> String {
        format!("{name}@example.com")
    }

    /// Register `name`, place it in a new role at `rank` and log it in.
    pub async fn member(&self, name: &str, rank: u32, permissions: CapabilitySet) -> Member {
        let gk = &self.gatekeeper;
        let registered = gk
            .register(Registration::new(name, Self::email(name), SECRET))
            .await
            .unwrap();
        let role = gk
            .create_role(&self.owner, RoleDraft::new(format!("{name}-role"), rank, permissions))
            .await
            .unwrap();
        let identity = gk
            .assign_role(&self.owner, registered.id, role.id)
            .await
            .unwrap();
        let session = gk.authenticate(&Self::email(name), SECRET).await.unwrap();
        Member {
            identity,
            token: session.token,
            claims: session.claims,
        }
    }

    /// Configure the notification webhook.
    pub async fn set_webhook(&self) {
        self.gatekeeper
            .update_setting(&self.owner, "discord_webhook", WEBHOOK)
            .await
            .unwrap();
    }

    pub async fn audit_count(&self) -> usize {
        self.gatekeeper.audit().count().await.unwrap()
    }

    /// Assert exactly one entry was appended since the chain held `before`
    /// entries, and that it names `kind`, `actor` and `target`.
    pub async fn single_entry_since(
        &self,
        before: usize,
        kind: AuditKind,
        actor: IdentityId,
        target: impl Display,
    ) -> AuditEntry {
        let mut entries = self
            .gatekeeper
            .audit_log(&self.owner, AuditQuery::All)
            .await
            .unwrap();
        let appended = entries.split_off(before);
        assert_eq!(appended.len(), 1, "expected one new entry, got {appended:?}");
        let entry = appended.into_iter().next().unwrap();
        assert_eq!(entry.kind, kind);
        assert_eq!(entry.actor_id, Some(actor));
        assert_eq!(entry.target_id, Some(target.to_string()));
        entry
    }
}
