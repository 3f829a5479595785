//! Audit entry types.
//!
//! Every successful privileged mutation is recorded as an audit entry.
//! Entries form a single chain: each stores the hash of its predecessor and
//! is signed by the runtime key.

use serde::{Deserialize, Serialize};
use std::fmt;
use warden_core::{AuditEntryId, IdentityId, Timestamp};
use warden_crypto::{ContentHash, KeyPair, PublicKey, Signature};

use crate::error::{AuditError, AuditResult};

const SIGNING_DATA_VERSION: u8 = 0x01;

const ENTRY_HASH_DOMAIN: &str = "warden audit entry v1";

fn write_length_prefixed(data: &mut Vec<u8>, bytes: &[u8]) {
    // Fields are small; lengths above u32::MAX are not produced.
    data.extend_from_slice(&u32::try_from(bytes.len()).unwrap_or(u32::MAX).to_le_bytes());
    data.extend_from_slice(bytes);
}

/// The kind of privileged action an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// An identity was suspended.
    Ban,
    /// A suspended identity was reinstated.
    Unban,
    /// An identity was flagged with a moderation note.
    ModNote,
    /// A role was created.
    RoleCreated,
    /// A role definition changed, or an identity was assigned a new role.
    RoleUpdated,
    /// A role was deleted.
    RoleDeleted,
    /// A service key was issued.
    ApiKeyCreated,
    /// A service key was revoked.
    ApiKeyRevoked,
    /// A setting changed.
    SettingsUpdate,
    /// A game's access level was approved.
    GameApproved,
    /// A forum post was moderated.
    ForumModeration,
    /// An announcement was posted.
    Announcement,
    /// A support ticket changed status.
    TicketUpdated,
    /// A script was dispatched for execution.
    ScriptExecution,
    /// A game server reported a heartbeat.
    GamePing,
    /// The role hierarchy was initialised.
    Bootstrap,
}

impl AuditKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Ban,
        Self::Unban,
        Self::ModNote,
        Self::RoleCreated,
        Self::RoleUpdated,
        Self::RoleDeleted,
        Self::ApiKeyCreated,
        Self::ApiKeyRevoked,
        Self::SettingsUpdate,
        Self::GameApproved,
        Self::ForumModeration,
        Self::Announcement,
        Self::TicketUpdated,
        Self::ScriptExecution,
        Self::GamePing,
        Self::Bootstrap,
    ];

    /// The wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ban => "ban",
            Self::Unban => "unban",
            Self::ModNote => "mod_note",
            Self::RoleCreated => "role_created",
            Self::RoleUpdated => "role_updated",
            Self::RoleDeleted => "role_deleted",
            Self::ApiKeyCreated => "api_key_created",
            Self::ApiKeyRevoked => "api_key_revoked",
            Self::SettingsUpdate => "settings_update",
            Self::GameApproved => "game_approved",
            Self::ForumModeration => "forum_moderation",
            Self::Announcement => "announcement",
            Self::TicketUpdated => "ticket_updated",
            Self::ScriptExecution => "script_execution",
            Self::GamePing => "game_ping",
            Self::Bootstrap => "bootstrap",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown audit kind: {s}"))
    }
}

/// What to record: the caller-supplied part of an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// The action kind.
    pub kind: AuditKind,
    /// Who acted; `None` for system and service-key events.
    pub actor_id: Option<IdentityId>,
    /// What was acted on, as a prefixed identifier such as `role:<uuid>`.
    pub target_id: Option<String>,
    /// Action-specific details. Never carries secrets.
    pub payload: serde_json::Value,
}

impl AuditRecord {
    /// Start a record of `kind` with no actor, target or payload.
    #[must_use]
    pub fn new(kind: AuditKind) -> Self {
        Self {
            kind,
            actor_id: None,
            target_id: None,
            payload: serde_json::Value::Null,
        }
    }

    /// Set the actor.
    #[must_use]
    pub fn actor(mut self, actor_id: IdentityId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Set the actor if known.
    #[must_use]
    pub fn maybe_actor(mut self, actor_id: Option<IdentityId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    /// Set the target.
    #[must_use]
    pub fn target(mut self, target: impl fmt::Display) -> Self {
        self.target_id = Some(target.to_string());
        self
    }

    /// Set the payload.
    #[must_use]
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: AuditEntryId,
    /// Position in the chain, starting at 1.
    pub sequence: u64,
    /// When this entry was created.
    pub timestamp: Timestamp,
    /// The action kind.
    pub kind: AuditKind,
    /// Who acted; `None` for system and service-key events.
    pub actor_id: Option<IdentityId>,
    /// What was acted on.
    pub target_id: Option<String>,
    /// Action-specific details.
    pub payload: serde_json::Value,
    /// Hash of the previous entry (zero for the first entry).
    pub previous_hash: ContentHash,
    /// Runtime public key that signed this entry.
    pub runtime_key: PublicKey,
    /// Signature over entry contents.
    pub signature: Signature,
}

impl AuditEntry {
    /// Create and sign a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::SerializationError`] if the payload cannot be encoded.
    pub fn create(
        record: AuditRecord,
        sequence: u64,
        previous_hash: ContentHash,
        runtime_key: &KeyPair,
    ) -> AuditResult<Self> {
        let mut entry = Self {
            id: AuditEntryId::new(),
            sequence,
            timestamp: Timestamp::now(),
            kind: record.kind,
            actor_id: record.actor_id,
            target_id: record.target_id,
            payload: record.payload,
            previous_hash,
            runtime_key: runtime_key.export_public_key(),
            signature: Signature::from_bytes([0u8; 64]),
        };
        let signing_data = entry.signing_data()?;
        entry.signature = runtime_key.sign(&signing_data);
        Ok(entry)
    }

    /// The bytes covered by the signature and the chain hash.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::SerializationError`] if the payload cannot be encoded.
    pub fn signing_data(&self) -> AuditResult<Vec<u8>> {
        let payload = serde_json::to_vec(&self.payload)
            .map_err(|e| AuditError::SerializationError(e.to_string()))?;

        let mut data = Vec::with_capacity(payload.len().saturating_add(256));
        data.push(SIGNING_DATA_VERSION);
        data.extend_from_slice(self.id.as_uuid().as_bytes());
        data.extend_from_slice(&self.sequence.to_le_bytes());
        data.extend_from_slice(&self.timestamp.0.timestamp().to_le_bytes());
        data.extend_from_slice(&self.timestamp.0.timestamp_subsec_nanos().to_le_bytes());
        write_length_prefixed(&mut data, self.kind.as_str().as_bytes());

        match &self.actor_id {
            Some(actor) => {
                data.push(0x01);
                data.extend_from_slice(actor.as_uuid().as_bytes());
            },
            None => data.push(0x00),
        }
        match &self.target_id {
            Some(target) => {
                data.push(0x01);
                write_length_prefixed(&mut data, target.as_bytes());
            },
            None => data.push(0x00),
        }

        write_length_prefixed(&mut data, &payload);
        data.extend_from_slice(self.previous_hash.as_bytes());
        data.extend_from_slice(self.runtime_key.as_bytes());
        Ok(data)
    }

    /// Compute the content hash of this entry.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::SerializationError`] if the payload cannot be encoded.
    pub fn content_hash(&self) -> AuditResult<ContentHash> {
        Ok(ContentHash::hash_with_domain(
            ENTRY_HASH_DOMAIN,
            &self.signing_data()?,
        ))
    }

    /// Verify the entry's signature.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidSignature`] if the signature does not match
    /// the entry contents.
    pub fn verify_signature(&self) -> AuditResult<()> {
        let signing_data = self.signing_data()?;
        self.runtime_key
            .verify(&signing_data, &self.signature)
            .map_err(|_| AuditError::InvalidSignature {
                entry_id: self.id.to_string(),
            })
    }

    /// Check if this entry follows `previous` in the chain.
    #[must_use]
    pub fn follows(&self, previous: &AuditEntry) -> bool {
        previous
            .content_hash()
            .is_ok_and(|hash| self.previous_hash == hash)
    }

    /// One-line description for listings.
    #[must_use]
    pub fn summary(&self) -> String {
        let actor = self
            .actor_id
            .map_or_else(|| "system".to_string(), |a| a.to_string());
        match &self.target_id {
            Some(target) => format!("{} by {actor} on {target}", self.kind),
            None => format!("{} by {actor}", self.kind),
        }
    }
}
