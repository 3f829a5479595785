//! The closed capability vocabulary.
//!
//! Every permission a role can grant is a [`Capability`]. Roles hold a
//! [`CapabilitySet`], a fixed-size bitset keyed by the enumeration. On the wire
//! a set is a `name -> bool` map; names outside the vocabulary are rejected
//! rather than ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A named permission a role may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// View the games catalog.
    AccessGamesTab,
    /// Dispatch scripts through the executor.
    UseExecutor,
    /// View premium games.
    AccessPremiumGames,
    /// View game server heartbeat pings.
    ViewGameServerPings,
    /// Approve games, manage service keys, settings, announcements and tickets.
    ApproveGameAccess,
    /// Create, edit and delete roles; promote and demote identities.
    PromoteDemoteUsers,
    /// Whitelist and flag identities, moderate forum content.
    WhitelistUsers,
    /// Suspend and reinstate identities.
    BanAccounts,
    /// Ban network addresses.
    IPBan,
    /// Access the script hub.
    AccessScriptHub,
    /// View script execution logs.
    ViewScriptLogs,
    /// Read the audit log.
    ViewAuditLogs,
    /// View suspended identities.
    ViewBannedUsers,
    /// View private profile data.
    ViewPrivateData,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::AccessGamesTab,
        Self::UseExecutor,
        Self::AccessPremiumGames,
        Self::ViewGameServerPings,
        Self::ApproveGameAccess,
        Self::PromoteDemoteUsers,
        Self::WhitelistUsers,
        Self::BanAccounts,
        Self::IPBan,
        Self::AccessScriptHub,
        Self::ViewScriptLogs,
        Self::ViewAuditLogs,
        Self::ViewBannedUsers,
        Self::ViewPrivateData,
    ];

    /// The canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessGamesTab => "AccessGamesTab",
            Self::UseExecutor => "UseExecutor",
            Self::AccessPremiumGames => "AccessPremiumGames",
            Self::ViewGameServerPings => "ViewGameServerPings",
            Self::ApproveGameAccess => "ApproveGameAccess",
            Self::PromoteDemoteUsers => "PromoteDemoteUsers",
            Self::WhitelistUsers => "WhitelistUsers",
            Self::BanAccounts => "BanAccounts",
            Self::IPBan => "IPBan",
            Self::AccessScriptHub => "AccessScriptHub",
            Self::ViewScriptLogs => "ViewScriptLogs",
            Self::ViewAuditLogs => "ViewAuditLogs",
            Self::ViewBannedUsers => "ViewBannedUsers",
            Self::ViewPrivateData => "ViewPrivateData",
        }
    }

    #[allow(clippy::arithmetic_side_effects)]
    const fn bit(self) -> u16 {
        // Safety: there are fewer than 16 variants, so the shift never overflows.
        1u16 << (self as u16)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| CoreError::UnknownCapability(s.to_string()))
    }
}

/// A set of capabilities held by a role.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, bool>",
    into = "BTreeMap<String, bool>"
)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The set holding every capability.
    #[must_use]
    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    /// Whether `capability` is granted.
    #[must_use]
    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Grant a capability.
    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    /// Withdraw a capability.
    pub fn remove(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    /// Whether every capability in `other` is also in `self`.
    #[must_use]
    pub const fn is_superset_of(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no capability is granted.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of granted capabilities.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the granted capabilities in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL
            .into_iter()
            .filter(move |cap| self.contains(*cap))
    }

    /// Parse a `name -> bool` map, rejecting unknown names.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownCapability`] for the first name outside the vocabulary.
    pub fn from_map<'a, I>(entries: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (&'a str, bool)>,
    {
        let mut set = Self::empty();
        for (name, granted) in entries {
            let cap: Capability = name.parse()?;
            if granted {
                set.insert(cap);
            }
        }
        Ok(set)
    }

    /// Render as a `name -> bool` map covering the whole vocabulary.
    #[must_use]
    pub fn to_map(self) -> BTreeMap<String, bool> {
        Capability::ALL
            .into_iter()
            .map(|cap| (cap.as_str().to_string(), self.contains(cap)))
            .collect()
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        let mut set = Self::empty();
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl TryFrom<BTreeMap<String, bool>> for CapabilitySet {
    type Error = CoreError;

    fn try_from(map: BTreeMap<String, bool>) -> Result<Self, Self::Error> {
        Self::from_map(map.iter().map(|(name, granted)| (name.as_str(), *granted)))
    }
}

impl From<CapabilitySet> for BTreeMap<String, bool> {
    fn from(set: CapabilitySet) -> Self {
        set.to_map()
    }
}
