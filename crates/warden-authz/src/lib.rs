//! Warden Authz - roles, credentials and the gatekeeper for privileged operations.
//!
//! This crate provides:
//! - A ranked [`RoleStore`] with unique names and unique ranks
//! - Identity registration and login through the [`CredentialVerifier`]
//! - Hashed service keys through the [`ServiceKeyAuthenticator`]
//! - Capability checks through the [`PermissionAuthority`]
//! - The strict-rank rule through the [`HierarchyGuard`]
//! - The [`Gatekeeper`], which runs every privileged operation and records it
//!   in the audit log
//!
//! # Security Model
//!
//! An actor may only create, change, delete or assign a role whose rank is
//! strictly below its own, and may only act on identities whose current rank
//! is strictly below its own. The capability check uses the rank carried by
//! the session token; the hierarchy check re-reads current ranks.
//!
//! A privileged mutation is durable only if its audit entry is. When the
//! audit append fails, the mutation's writes are undone and any external
//! [`Effect`] is compensated.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_audit::AuditLog;
//! use warden_authz::{AuthzConfig, Gatekeeper, Registration, RoleDraft};
//! use warden_core::{Capability, CapabilitySet};
//! use warden_crypto::{KeyPair, MacKey, PasswordParams};
//! use warden_notify::Notifier;
//! use warden_storage::MemoryKvStore;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let config = AuthzConfig {
//!     password: PasswordParams { memory_kib: 256, iterations: 1, parallelism: 1 },
//!     ..AuthzConfig::default()
//! };
//! let gatekeeper = Gatekeeper::new(
//!     Arc::new(MemoryKvStore::new()),
//!     Arc::new(AuditLog::in_memory(KeyPair::generate())),
//!     MacKey::generate(),
//!     Notifier::disabled(),
//!     config,
//! )
//! .unwrap();
//!
//! let owner = Registration::new("owner", "owner@example.com", "correct horse");
//! gatekeeper.bootstrap(Some(owner)).await.unwrap();
//!
//! let session = gatekeeper
//!     .authenticate("owner@example.com", "correct horse")
//!     .await
//!     .unwrap();
//! let moderators = RoleDraft::new(
//!     "Moderator",
//!     50,
//!     CapabilitySet::empty().with(Capability::BanAccounts),
//! );
//! let role = gatekeeper.create_role(&session.claims, moderators).await.unwrap();
//! assert_eq!(role.rank.get(), 50);
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod authority;
mod config;
mod credentials;
mod effect;
mod error;
mod gatekeeper;
mod headers;
mod hierarchy;
mod identity;
mod roles;
mod service_keys;
mod settings;
mod txn;

pub use authority::{Decision, PermissionAuthority, permits};
pub use config::AuthzConfig;
pub use credentials::{CredentialVerifier, Registration, Session};
pub use effect::{
    AccessLevel, Effect, EffectError, GamePing, ModerationAction, NoEffect, ScriptRequest,
};
pub use error::{AuthzError, AuthzResult, Surface};
pub use gatekeeper::{AuditQuery, Bootstrapped, Gatekeeper};
pub use headers::{API_KEY_HEADER, AUTHORIZATION_HEADER, Credentials};
pub use hierarchy::{HierarchyGuard, Ranked, check_escalation};
pub use identity::{Identity, IdentityStore, Profile};
pub use roles::{MAX_ROLE_NAME_LEN, Role, RoleDraft, RoleStore};
pub use service_keys::{IssuedKey, KEY_PREFIX, ServiceKey, ServiceKeyAuthenticator};
pub use settings::{REDACTED, Setting, SettingKey, SettingsStore};
pub use txn::UnitOfWork;
