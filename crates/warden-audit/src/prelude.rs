//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_audit::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuditError, AuditResult};

// Entry types
pub use crate::{AuditEntry, AuditEntryId, AuditKind, AuditRecord};

// Log and verification
pub use crate::{AuditLog, ChainIssue, ChainVerificationResult};

// Storage
pub use crate::{AuditStorage, KvAuditStorage};
