//! Common types used throughout Warden.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from a UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a human identity.
    IdentityId,
    "identity"
);

uuid_id!(
    /// Unique identifier for a role definition.
    RoleId,
    "role"
);

uuid_id!(
    /// Unique identifier for an issued service key record.
    ///
    /// This is not the key value itself, which is never stored.
    ServiceKeyId,
    "key"
);

uuid_id!(
    /// Unique identifier for an audit entry.
    AuditEntryId,
    "audit"
);

/// Position of a role in the hierarchy.
///
/// Ranks form a total order; rank 0 is the least privileged. An actor may
/// only act on roles and identities whose rank is strictly below its own.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Rank(pub u32);

impl Rank {
    /// The least privileged rank.
    pub const ZERO: Self = Self(0);

    /// Create a rank from its numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether this rank is strictly above `other`.
    ///
    /// Equal ranks never outrank each other.
    #[must_use]
    pub const fn outranks(self, other: Self) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Rank {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Timestamp wrapper for consistent handling throughout Warden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Create a timestamp from whole seconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TimestampOutOfRange`] if `secs` cannot be represented.
    pub fn from_unix_secs(secs: i64) -> CoreResult<Self> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or(CoreError::TimestampOutOfRange(secs))
    }

    /// Whole seconds since the Unix epoch.
    #[must_use]
    pub fn unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Truncate to whole seconds.
    #[must_use]
    pub fn truncate_to_secs(self) -> Self {
        DateTime::from_timestamp(self.0.timestamp(), 0).map_or(self, Self)
    }

    /// Add a number of seconds, returning `None` on overflow.
    #[must_use]
    pub fn checked_add_secs(self, secs: u64) -> Option<Self> {
        let secs = i64::try_from(secs).ok()?;
        let delta = TimeDelta::try_seconds(secs)?;
        self.0.checked_add_signed(delta).map(Self)
    }

    /// Subtract a number of seconds, returning `None` on overflow.
    #[must_use]
    pub fn checked_sub_secs(self, secs: u64) -> Option<Self> {
        let secs = i64::try_from(secs).ok()?;
        let delta = TimeDelta::try_seconds(secs)?;
        self.0.checked_sub_signed(delta).map(Self)
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_prefix() {
        let id = IdentityId::from_uuid(Uuid::nil());
        assert_eq!(
            id.to_string(),
            "identity:00000000-0000-0000-0000-000000000000"
        );
        assert!(RoleId::new().to_string().starts_with("role:"));
    }

    #[test]
    fn test_ids_serialize_as_bare_uuid() {
        let id = RoleId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn test_rank_outranks_is_strict() {
        assert!(Rank::new(5).outranks(Rank::new(4)));
        assert!(!Rank::new(4).outranks(Rank::new(4)));
        assert!(!Rank::ZERO.outranks(Rank::new(1)));
    }

    #[test]
    fn test_timestamp_unix_roundtrip() {
        let ts = Timestamp::from_unix_secs(1_700_000_000).unwrap();
        assert_eq!(ts.unix_secs(), 1_700_000_000);
        assert_eq!(ts.to_string(), "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_timestamp_checked_arithmetic() {
        let ts = Timestamp::from_unix_secs(1_000).unwrap();
        assert_eq!(ts.checked_add_secs(3600).unwrap().unix_secs(), 4_600);
        assert_eq!(ts.checked_sub_secs(1_000).unwrap().unix_secs(), 0);
        assert!(ts.checked_add_secs(u64::MAX).is_none());
    }

    #[test]
    fn test_timestamp_out_of_range() {
        assert_eq!(
            Timestamp::from_unix_secs(i64::MAX),
            Err(CoreError::TimestampOutOfRange(i64::MAX))
        );
    }
}
