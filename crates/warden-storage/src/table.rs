//! Typed JSON view over a single namespace.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, validate_namespace};

/// A namespace of JSON-encoded records of type `T`.
///
/// Cloning a table is cheap; clones share the underlying store.
pub struct Table<T> {
    store: Arc<dyn KvStore>,
    namespace: String,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

fn encode<T: Serialize>(record: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl<T> Table<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Bind a table to `namespace` in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the namespace is empty or
    /// contains null bytes.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self {
            store,
            namespace,
            _record: PhantomData,
        })
    }

    /// The namespace this table is bound to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Read a record.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or [`StorageError::Serialization`] if the
    /// stored bytes do not decode as `T`.
    pub async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        self.store
            .get(&self.namespace, key)
            .await?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Read the raw stored bytes of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn get_raw(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.store.get(&self.namespace, key).await
    }

    /// Write a record, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the underlying store operation fails.
    pub async fn put(&self, key: &str, record: &T) -> StorageResult<()> {
        self.store.set(&self.namespace, key, encode(record)?).await
    }

    /// Write raw bytes, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn put_raw(&self, key: &str, bytes: Vec<u8>) -> StorageResult<()> {
        self.store.set(&self.namespace, key, bytes).await
    }

    /// Write a record only if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the underlying store operation fails.
    pub async fn insert_new(&self, key: &str, record: &T) -> StorageResult<bool> {
        self.store
            .insert_new(&self.namespace, key, encode(record)?)
            .await
    }

    /// Delete a record. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store operation fails.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.store.delete(&self.namespace, key).await
    }

    /// Read every record in the namespace, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails or any record does not decode.
    pub async fn all(&self) -> StorageResult<Vec<T>> {
        let mut rows = self.store.scan(&self.namespace).await?;
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows.iter().map(|(_, bytes)| decode(bytes)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKvStore;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Role {
        name: String,
        rank: u32,
    }

    fn role(name: &str, rank: u32) -> Role {
        Role {
            name: name.into(),
            rank,
        }
    }

    #[tokio::test]
    async fn test_table_put_get() {
        let table: Table<Role> = Table::new(Arc::new(MemoryKvStore::new()), "roles").unwrap();
        table.put("r1", &role("Admin", 10)).await.unwrap();
        assert_eq!(table.get("r1").await.unwrap(), Some(role("Admin", 10)));
        assert!(table.get("r2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_table_insert_new_and_all() {
        let table: Table<Role> = Table::new(Arc::new(MemoryKvStore::new()), "roles").unwrap();
        assert!(table.insert_new("b", &role("User", 0)).await.unwrap());
        assert!(table.insert_new("a", &role("Admin", 10)).await.unwrap());
        assert!(!table.insert_new("a", &role("Other", 3)).await.unwrap());

        let all = table.all().await.unwrap();
        assert_eq!(all, vec![role("Admin", 10), role("User", 0)]);
    }

    #[tokio::test]
    async fn test_table_decode_error() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        store.set("roles", "bad", b"not json".to_vec()).await.unwrap();
        let table: Table<Role> = Table::new(store, "roles").unwrap();
        assert!(matches!(
            table.get("bad").await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_table_rejects_empty_namespace() {
        let result: StorageResult<Table<Role>> = Table::new(Arc::new(MemoryKvStore::new()), "");
        assert!(result.is_err());
    }
}
