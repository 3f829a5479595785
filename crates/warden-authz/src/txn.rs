//! Journaled unit of work over a [`KvStore`].
//!
//! The store only guarantees single-row atomicity. A privileged operation
//! that writes several rows (a record plus its unique indexes) and then an
//! audit entry routes every write through a [`UnitOfWork`], which remembers
//! each row's previous value. If a later step fails, [`UnitOfWork::rollback`]
//! restores the rows in reverse order.
//!
//! Restoration writes the journaled bytes back unconditionally, so callers
//! must keep other writers off the journaled rows until the unit settles.

use serde::Serialize;
use std::sync::Arc;
use warden_storage::{KvStore, StorageError, StorageResult};

use crate::error::AuthzResult;

struct JournalEntry {
    namespace: String,
    key: String,
    previous: Option<Vec<u8>>,
}

/// A journal of row writes that can be undone.
///
/// Dropping a unit of work without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) keeps the writes.
pub struct UnitOfWork {
    store: Arc<dyn KvStore>,
    journal: Vec<JournalEntry>,
}

impl UnitOfWork {
    /// Start an empty unit of work.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            journal: Vec::new(),
        }
    }

    /// Number of journaled writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.journal.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.journal.is_empty()
    }

    /// Write raw bytes, journaling the previous value.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read or write fails.
    pub async fn set(&mut self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let previous = self.store.get(namespace, key).await?;
        self.store.set(namespace, key, value).await?;
        self.record(namespace, key, previous);
        Ok(())
    }

    /// Write a JSON-encoded record, journaling the previous value.
    ///
    /// # Errors
    ///
    /// Returns a storage error if encoding, the read or the write fails.
    pub async fn put<T: Serialize + Sync>(
        &mut self,
        namespace: &str,
        key: &str,
        record: &T,
    ) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set(namespace, key, bytes).await
    }

    /// Claim a key that must be absent. Returns `false` if it is taken.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    pub async fn claim(
        &mut self,
        namespace: &str,
        key: &str,
        value: Vec<u8>,
    ) -> StorageResult<bool> {
        let inserted = self.store.insert_new(namespace, key, value).await?;
        if inserted {
            self.record(namespace, key, None);
        }
        Ok(inserted)
    }

    /// Delete a row, journaling its value. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read or delete fails.
    pub async fn delete(&mut self, namespace: &str, key: &str) -> StorageResult<bool> {
        let Some(previous) = self.store.get(namespace, key).await? else {
            return Ok(false);
        };
        let deleted = self.store.delete(namespace, key).await?;
        if deleted {
            self.record(namespace, key, Some(previous));
        }
        Ok(deleted)
    }

    fn record(&mut self, namespace: &str, key: &str, previous: Option<Vec<u8>>) {
        self.journal.push(JournalEntry {
            namespace: namespace.to_string(),
            key: key.to_string(),
            previous,
        });
    }

    /// Roll back if `result` is an error, then pass it through.
    ///
    /// # Errors
    ///
    /// Returns `result`'s error after rolling back.
    pub async fn settle<T>(&mut self, result: AuthzResult<T>) -> AuthzResult<T> {
        if result.is_err() {
            self.rollback().await;
        }
        result
    }

    /// Keep every write and clear the journal.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    /// Restore every journaled row, newest first.
    ///
    /// Restoration is best effort: a row that cannot be restored is logged
    /// and the remaining rows are still attempted.
    pub async fn rollback(&mut self) {
        while let Some(entry) = self.journal.pop() {
            let restored = match entry.previous {
                Some(bytes) => self.store.set(&entry.namespace, &entry.key, bytes).await,
                None => self
                    .store
                    .delete(&entry.namespace, &entry.key)
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = restored {
                tracing::error!(
                    namespace = %entry.namespace,
                    key = %entry.key,
                    error = %e,
                    "failed to restore row during rollback"
                );
            }
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("writes", &self.journal.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthzError;
    use warden_storage::MemoryKvStore;

    fn store() -> Arc<dyn KvStore> {
        Arc::new(MemoryKvStore::new())
    }

    #[tokio::test]
    async fn test_rollback_restores_previous_values() {
        let store = store();
        store.set("roles", "a", b"old".to_vec()).await.unwrap();
        store.set("roles", "gone", b"kept".to_vec()).await.unwrap();

        let mut uow = UnitOfWork::new(Arc::clone(&store));
        uow.set("roles", "a", b"new".to_vec()).await.unwrap();
        assert!(uow.claim("roles", "b", b"fresh".to_vec()).await.unwrap());
        assert!(uow.delete("roles", "gone").await.unwrap());
        assert_eq!(uow.len(), 3);

        uow.rollback().await;
        assert!(uow.is_empty());
        assert_eq!(store.get("roles", "a").await.unwrap(), Some(b"old".to_vec()));
        assert_eq!(store.get("roles", "b").await.unwrap(), None);
        assert_eq!(store.get("roles", "gone").await.unwrap(), Some(b"kept".to_vec()));
    }

    #[tokio::test]
    async fn test_failed_claim_is_not_journaled() {
        let store = store();
        store.set("idx", "taken", b"x".to_vec()).await.unwrap();

        let mut uow = UnitOfWork::new(Arc::clone(&store));
        assert!(!uow.claim("idx", "taken", b"y".to_vec()).await.unwrap());
        uow.rollback().await;
        assert_eq!(store.get("idx", "taken").await.unwrap(), Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_settle_rolls_back_on_error() {
        let store = store();
        let mut uow = UnitOfWork::new(Arc::clone(&store));
        uow.set("roles", "a", b"new".to_vec()).await.unwrap();

        let result: AuthzResult<()> = uow.settle(Err(AuthzError::Effect("boom".into()))).await;
        assert!(result.is_err());
        assert_eq!(store.get("roles", "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_keeps_writes() {
        let store = store();
        let mut uow = UnitOfWork::new(Arc::clone(&store));
        uow.set("roles", "a", b"new".to_vec()).await.unwrap();
        uow.commit();
        uow.rollback().await;
        assert_eq!(store.get("roles", "a").await.unwrap(), Some(b"new".to_vec()));
    }
}
