//! Wiring from a loaded configuration to stores, keys and the gatekeeper.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use warden_audit::AuditLog;
use warden_authz::{AuthzConfig, Gatekeeper};
use warden_config::Config;
use warden_crypto::{KeyPair, MacKey};
use warden_notify::Notifier;
use warden_storage::{KvStore, MemoryKvStore, SurrealKvStore};

/// Open the store at `path`, or an in-memory store when unset.
pub(crate) fn open_store(path: Option<&str>) -> Result<Arc<dyn KvStore>> {
    let Some(path) = path else {
        tracing::warn!("no storage path configured; using an in-memory store");
        return Ok(Arc::new(MemoryKvStore::new()));
    };
    std::fs::create_dir_all(path).with_context(|| format!("failed to create {path}"))?;
    let store = SurrealKvStore::open(path)
        .with_context(|| format!("failed to open store at {path}"))?;
    Ok(Arc::new(store))
}

/// The audit store: a dedicated one if configured, otherwise `shared`.
pub(crate) fn open_audit_store(
    config: &Config,
    shared: &Arc<dyn KvStore>,
) -> Result<Arc<dyn KvStore>> {
    match config.audit.storage_path.as_deref() {
        Some(path) if config.storage.path.as_deref() != Some(path) => open_store(Some(path)),
        _ => Ok(Arc::clone(shared)),
    }
}

/// Load the audit signing key, or generate an ephemeral one.
pub(crate) fn audit_key(config: &Config) -> Result<KeyPair> {
    match config.audit.key_path.as_deref() {
        Some(path) => KeyPair::load_or_generate(Path::new(path))
            .with_context(|| format!("failed to load audit key from {path}")),
        None => {
            tracing::warn!("no audit key path configured; entries will not verify after restart");
            Ok(KeyPair::generate())
        },
    }
}

/// Load the session MAC key, or generate an ephemeral one.
pub(crate) fn session_key(config: &Config) -> Result<MacKey> {
    match config.session.key_path.as_deref() {
        Some(path) => MacKey::load_or_generate(Path::new(path))
            .with_context(|| format!("failed to load session key from {path}")),
        None => {
            tracing::warn!("no session key path configured; sessions end with the process");
            Ok(MacKey::generate())
        },
    }
}

/// Open the audit log the configuration points at.
pub(crate) fn open_audit_log(config: &Config) -> Result<AuditLog> {
    let store = open_store(config.storage.path.as_deref())?;
    let audit_store = open_audit_store(config, &store)?;
    Ok(AuditLog::over_store(audit_store, audit_key(config)?))
}

/// Build a gatekeeper over the configured stores and keys.
pub(crate) fn gatekeeper(config: &Config) -> Result<Gatekeeper> {
    let store = open_store(config.storage.path.as_deref())?;
    let audit_store = open_audit_store(config, &store)?;
    let audit = Arc::new(AuditLog::over_store(audit_store, audit_key(config)?));

    let notifier = if config.notify.enabled {
        Notifier::webhook(Duration::from_secs(config.notify.timeout_secs))?
    } else {
        Notifier::disabled()
    };

    let gatekeeper = Gatekeeper::new(
        store,
        audit,
        session_key(config)?,
        notifier,
        AuthzConfig::from_config(config)?,
    )?;
    Ok(gatekeeper)
}
