//! Audit log - main interface for audit logging.
//!
//! Provides a high-level API for recording and verifying audit entries.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use warden_core::{AuditEntryId, IdentityId};
use warden_crypto::{ContentHash, KeyPair, PublicKey};
use warden_storage::KvStore;

use crate::entry::{AuditEntry, AuditKind, AuditRecord};
use crate::error::AuditResult;
use crate::storage::{AuditStorage, KvAuditStorage};

/// Audit log for recording and verifying privileged actions.
///
/// Appends are serialized: every entry links to the one before it, so two
/// appends never race for the same position.
pub struct AuditLog {
    /// Storage backend.
    storage: Arc<dyn AuditStorage>,
    /// Runtime signing key.
    runtime_key: KeyPair,
    /// Cached `(sequence, hash)` of the chain head. `None` until loaded, and
    /// reset after a failed append.
    head: Mutex<Option<(u64, ContentHash)>>,
}

impl AuditLog {
    /// Create a new audit log with a custom storage backend.
    #[must_use]
    pub fn with_storage(storage: Arc<dyn AuditStorage>, runtime_key: KeyPair) -> Self {
        Self {
            storage,
            runtime_key,
            head: Mutex::new(None),
        }
    }

    /// Create an audit log over a key-value store.
    #[must_use]
    pub fn over_store(store: Arc<dyn KvStore>, runtime_key: KeyPair) -> Self {
        Self::with_storage(Arc::new(KvAuditStorage::new(store)), runtime_key)
    }

    /// Create an in-memory audit log (for testing).
    #[must_use]
    pub fn in_memory(runtime_key: KeyPair) -> Self {
        Self::with_storage(Arc::new(KvAuditStorage::in_memory()), runtime_key)
    }

    /// Append a new audit entry.
    ///
    /// Returns the stored entry. Nothing is recorded on error.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain head cannot be read or the entry cannot
    /// be stored.
    pub async fn append(&self, record: AuditRecord) -> AuditResult<AuditEntry> {
        let mut head = self.head.lock().await;

        let (previous_sequence, previous_hash) = match *head {
            Some(cached) => cached,
            None => match self.storage.head().await? {
                Some(entry) => (entry.sequence, entry.content_hash()?),
                None => (0, ContentHash::zero()),
            },
        };

        let entry = AuditEntry::create(
            record,
            previous_sequence.saturating_add(1),
            previous_hash,
            &self.runtime_key,
        )?;
        let entry_hash = entry.content_hash()?;

        debug!(
            entry_id = %entry.id,
            sequence = entry.sequence,
            kind = %entry.kind,
            "Appending audit entry"
        );

        if let Err(e) = self.storage.append(&entry).await {
            error!(entry_id = %entry.id, error = %e, "Audit append failed");
            *head = None;
            return Err(e);
        }

        *head = Some((entry.sequence, entry_hash));
        Ok(entry)
    }

    /// Get an entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to retrieve the entry.
    pub async fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>> {
        self.storage.get(id).await
    }

    /// Get all entries in chain order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to retrieve entries.
    pub async fn entries(&self) -> AuditResult<Vec<AuditEntry>> {
        self.storage.entries().await
    }

    /// Get entries of one kind, in chain order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to retrieve entries.
    pub async fn entries_by_kind(&self, kind: AuditKind) -> AuditResult<Vec<AuditEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect())
    }

    /// Get entries recorded for an actor, in chain order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to retrieve entries.
    pub async fn entries_for_actor(&self, actor: IdentityId) -> AuditResult<Vec<AuditEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.actor_id == Some(actor))
            .collect())
    }

    /// Get entries whose target is `target`, in chain order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to retrieve entries.
    pub async fn entries_for_target(&self, target: &str) -> AuditResult<Vec<AuditEntry>> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.target_id.as_deref() == Some(target))
            .collect())
    }

    /// Get the `limit` most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to retrieve entries.
    pub async fn recent(&self, limit: usize) -> AuditResult<Vec<AuditEntry>> {
        let mut entries = self.entries().await?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    /// Verify the integrity of the whole chain.
    ///
    /// # Errors
    ///
    /// Returns an error if entries cannot be retrieved from storage.
    pub async fn verify_chain(&self) -> AuditResult<ChainVerificationResult> {
        let entries = self.storage.entries().await?;

        let mut issues = Vec::new();
        let mut entries_verified: usize = 0;
        let runtime_key = self.runtime_public_key();

        if let Some(first) = entries.first()
            && (first.sequence != 1 || !first.previous_hash.is_zero())
        {
            issues.push(ChainIssue::InvalidGenesis { entry_id: first.id });
        }

        for entry in &entries {
            if let Err(e) = entry.verify_signature() {
                error!(entry_id = %entry.id, error = %e, "Invalid signature");
                issues.push(ChainIssue::InvalidSignature { entry_id: entry.id });
            }
            if entry.runtime_key != runtime_key {
                warn!(
                    entry_id = %entry.id,
                    key = %entry.runtime_key,
                    "Entry signed by a foreign key"
                );
                issues.push(ChainIssue::ForeignKey {
                    entry_id: entry.id,
                    key: entry.runtime_key,
                });
            }
            entries_verified = entries_verified.saturating_add(1);
        }

        for pair in entries.windows(2) {
            let [prev, curr] = pair else { continue };

            if curr.sequence != prev.sequence.saturating_add(1) {
                warn!(
                    current = %curr.id,
                    previous_sequence = prev.sequence,
                    sequence = curr.sequence,
                    "Sequence gap"
                );
                issues.push(ChainIssue::SequenceGap {
                    entry_id: curr.id,
                    expected: prev.sequence.saturating_add(1),
                    actual: curr.sequence,
                });
            }

            let expected_previous = prev.content_hash()?;
            if curr.previous_hash != expected_previous {
                warn!(
                    current = %curr.id,
                    previous = %prev.id,
                    "Chain link broken"
                );
                issues.push(ChainIssue::BrokenLink {
                    entry_id: curr.id,
                    expected_previous,
                    actual_previous: curr.previous_hash,
                });
            }
        }

        Ok(ChainVerificationResult {
            valid: issues.is_empty(),
            entries_verified,
            issues,
        })
    }

    /// Count total entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn count(&self) -> AuditResult<usize> {
        self.storage.count().await
    }

    /// Get the runtime public key.
    #[must_use]
    pub fn runtime_public_key(&self) -> PublicKey {
        self.runtime_key.export_public_key()
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("runtime_key_id", &self.runtime_key.key_id_hex())
            .finish_non_exhaustive()
    }
}

/// Result of chain verification.
#[derive(Debug, Clone)]
pub struct ChainVerificationResult {
    /// Whether the chain is valid.
    pub valid: bool,
    /// Number of entries verified.
    pub entries_verified: usize,
    /// Issues found (empty if valid).
    pub issues: Vec<ChainIssue>,
}

/// An issue found during chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainIssue {
    /// First entry is not at sequence 1 or doesn't have zero previous hash.
    InvalidGenesis {
        /// The entry with invalid genesis.
        entry_id: AuditEntryId,
    },
    /// Entry has invalid signature.
    InvalidSignature {
        /// The entry with invalid signature.
        entry_id: AuditEntryId,
    },
    /// Entry was signed by a key other than this runtime's.
    ForeignKey {
        /// The entry.
        entry_id: AuditEntryId,
        /// The key that signed it.
        key: PublicKey,
    },
    /// Sequence numbers are not consecutive.
    SequenceGap {
        /// The entry after the gap.
        entry_id: AuditEntryId,
        /// Expected sequence number.
        expected: u64,
        /// Actual sequence number.
        actual: u64,
    },
    /// Chain link is broken.
    BrokenLink {
        /// The entry with broken link.
        entry_id: AuditEntryId,
        /// Expected previous hash.
        expected_previous: ContentHash,
        /// Actual previous hash in entry.
        actual_previous: ContentHash,
    },
}

impl std::fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidGenesis { entry_id } => {
                write!(f, "Invalid genesis at {entry_id}")
            },
            Self::InvalidSignature { entry_id } => {
                write!(f, "Invalid signature at {entry_id}")
            },
            Self::ForeignKey { entry_id, key } => {
                write!(f, "Foreign signing key {} at {entry_id}", key.key_id_hex())
            },
            Self::SequenceGap {
                entry_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Sequence gap at {entry_id}: expected {expected}, found {actual}"
                )
            },
            Self::BrokenLink { entry_id, .. } => {
                write!(f, "Broken chain link at {entry_id}")
            },
        }
    }
}
