//! Audit log storage trait and key-value implementation.

use async_trait::async_trait;
use std::sync::Arc;
use warden_core::AuditEntryId;
use warden_storage::{KvStore, MemoryKvStore};

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Storage backend for audit logs.
///
/// Implementations must be thread-safe. Entries are addressed by their chain
/// sequence number; a sequence number is written at most once.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Persist an entry at its sequence position.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::IntegrityViolation`] if the position is already
    /// taken, or a storage error if the entry cannot be persisted. On error
    /// the entry is not part of the log.
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Get an entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>>;

    /// Get the entry with the highest sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn head(&self) -> AuditResult<Option<AuditEntry>>;

    /// Get every entry, ordered by sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or deserialization fails.
    async fn entries(&self) -> AuditResult<Vec<AuditEntry>>;

    /// Count total entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    async fn count(&self) -> AuditResult<usize>;
}

// -- Namespace constants --

const NS_ENTRIES: &str = "audit:entries";
const NS_IDS: &str = "audit:ids";
const NS_HEAD: &str = "audit:head";

const HEAD_KEY: &str = "head";

/// Zero-padded so lexical key order is sequence order.
fn sequence_key(sequence: u64) -> String {
    format!("{sequence:020}")
}

fn decode_entry(bytes: &[u8]) -> AuditResult<AuditEntry> {
    serde_json::from_slice(bytes).map_err(|e| AuditError::SerializationError(e.to_string()))
}

/// Audit storage over any [`KvStore`].
///
/// Layout:
/// - `audit:entries` maps the zero-padded sequence number to the entry JSON.
///   Inserting this row is the commit point of an append.
/// - `audit:ids` maps an entry ID to its sequence key.
/// - `audit:head` holds a hint of the latest sequence number. The hint may lag
///   behind the entries; [`head`](AuditStorage::head) probes forward from it.
pub struct KvAuditStorage {
    store: Arc<dyn KvStore>,
}

impl KvAuditStorage {
    /// Create audit storage over an existing store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Create an in-memory storage (for testing).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKvStore::new()))
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    async fn entry_at(&self, sequence: u64) -> AuditResult<Option<AuditEntry>> {
        self.store
            .get(NS_ENTRIES, &sequence_key(sequence))
            .await?
            .map(|bytes| decode_entry(&bytes))
            .transpose()
    }

    async fn head_hint(&self) -> AuditResult<u64> {
        let Some(bytes) = self.store.get(NS_HEAD, HEAD_KEY).await? else {
            return Ok(0);
        };
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| AuditError::StorageError("corrupt audit head hint".into()))
    }
}

#[async_trait]
impl AuditStorage for KvAuditStorage {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let key = sequence_key(entry.sequence);
        let data =
            serde_json::to_vec(entry).map_err(|e| AuditError::SerializationError(e.to_string()))?;

        // An index row without its entry is harmless: lookups through it miss.
        self.store
            .set(NS_IDS, &entry.id.as_uuid().to_string(), key.clone().into_bytes())
            .await?;

        if !self.store.insert_new(NS_ENTRIES, &key, data).await? {
            let _ = self
                .store
                .delete(NS_IDS, &entry.id.as_uuid().to_string())
                .await;
            return Err(AuditError::IntegrityViolation {
                entry_id: entry.id.to_string(),
                reason: format!("sequence {} is already taken", entry.sequence),
            });
        }

        if let Err(e) = self
            .store
            .set(NS_HEAD, HEAD_KEY, entry.sequence.to_string().into_bytes())
            .await
        {
            tracing::warn!(
                sequence = entry.sequence,
                error = %e,
                "failed to advance audit head hint"
            );
        }
        Ok(())
    }

    async fn get(&self, id: &AuditEntryId) -> AuditResult<Option<AuditEntry>> {
        let Some(key) = self.store.get(NS_IDS, &id.as_uuid().to_string()).await? else {
            return Ok(None);
        };
        let key =
            String::from_utf8(key).map_err(|e| AuditError::StorageError(e.to_string()))?;
        self.store
            .get(NS_ENTRIES, &key)
            .await?
            .map(|bytes| decode_entry(&bytes))
            .transpose()
    }

    async fn head(&self) -> AuditResult<Option<AuditEntry>> {
        let mut sequence = self.head_hint().await?;
        let mut head = if sequence == 0 {
            None
        } else {
            self.entry_at(sequence).await?
        };

        loop {
            let next = sequence.saturating_add(1);
            match self.entry_at(next).await? {
                Some(entry) => {
                    sequence = next;
                    head = Some(entry);
                },
                None => break,
            }
        }
        Ok(head)
    }

    async fn entries(&self) -> AuditResult<Vec<AuditEntry>> {
        let mut rows = self.store.scan(NS_ENTRIES).await?;
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows.iter().map(|(_, bytes)| decode_entry(bytes)).collect()
    }

    async fn count(&self) -> AuditResult<usize> {
        Ok(self.store.list_keys(NS_ENTRIES).await?.len())
    }
}

impl std::fmt::Debug for KvAuditStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvAuditStorage").finish_non_exhaustive()
    }
}
