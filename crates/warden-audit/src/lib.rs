//! Warden Audit - chain-linked, signed record of privileged actions.
//!
//! This crate provides:
//! - Signed audit entries with a closed set of [`AuditKind`]s
//! - A single chain: each entry stores the hash of its predecessor
//! - Pluggable storage over any `KvStore`
//! - Chain integrity verification
//!
//! # Security Model
//!
//! Every audit entry is:
//! - Signed by the runtime's ed25519 key
//! - Linked to the previous entry via content hash
//! - Numbered; a sequence position is written at most once
//!
//! Any modification, deletion or reordering of stored entries breaks the
//! chain and is reported by [`AuditLog::verify_chain`].
//!
//! # Example
//!
//! ```
//! use warden_audit::{AuditKind, AuditLog, AuditRecord};
//! use warden_core::IdentityId;
//! use warden_crypto::KeyPair;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let log = AuditLog::in_memory(KeyPair::generate());
//!
//! let entry = log
//!     .append(
//!         AuditRecord::new(AuditKind::Ban)
//!             .actor(IdentityId::new())
//!             .target("identity:1234")
//!             .payload(serde_json::json!({"reason": "spam"})),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(entry.sequence, 1);
//!
//! let result = log.verify_chain().await.unwrap();
//! assert!(result.valid);
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod error;
mod log;
mod storage;

pub use entry::{AuditEntry, AuditKind, AuditRecord};
pub use error::{AuditError, AuditResult};
pub use log::{AuditLog, ChainIssue, ChainVerificationResult};
pub use storage::{AuditStorage, KvAuditStorage};

pub use warden_core::AuditEntryId;
