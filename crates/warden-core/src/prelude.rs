//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_core::prelude::*;` to import all essential types.

pub use crate::{CoreError, CoreResult};

pub use crate::{Capability, CapabilitySet};

pub use crate::{AuditEntryId, IdentityId, Rank, RoleId, ServiceKeyId, Timestamp};
