//! Warden Core - shared vocabulary for the Warden authorization core.
//!
//! This crate provides:
//! - Strongly typed identifiers for identities, roles, service keys and audit entries
//! - [`Rank`], the total order of the role hierarchy
//! - [`Capability`], the closed capability vocabulary, and [`CapabilitySet`]
//! - A [`Timestamp`] wrapper with second-precision helpers used by token codecs
//!
//! # Example
//!
//! ```rust
//! use warden_core::{Capability, CapabilitySet, Rank};
//!
//! let moderators =
//!     CapabilitySet::from_iter([Capability::BanAccounts, Capability::WhitelistUsers]);
//! assert!(moderators.contains(Capability::BanAccounts));
//! assert!(!moderators.contains(Capability::PromoteDemoteUsers));
//!
//! assert!(Rank::new(5).outranks(Rank::new(3)));
//! assert!(!Rank::new(3).outranks(Rank::new(3)));
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod capability;
mod error;
mod types;

pub use capability::{Capability, CapabilitySet};
pub use error::{CoreError, CoreResult};
pub use types::{AuditEntryId, IdentityId, Rank, RoleId, ServiceKeyId, Timestamp};
