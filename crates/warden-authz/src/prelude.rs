//! Common imports for callers of the gatekeeper.
//!
//! ```
//! use warden_authz::prelude::*;
//! ```

pub use crate::{
    AuditQuery, AuthzConfig, AuthzError, AuthzResult, Credentials, Effect, Gatekeeper,
    ModerationAction, Registration, RoleDraft, Session, Surface,
};
