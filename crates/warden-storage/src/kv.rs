//! Raw key-value store trait and the in-memory implementation.
//!
//! All operations are scoped to a namespace. Warden uses one namespace per
//! record kind (`roles`, `identities`, `service_keys`, `settings`, `audit`)
//! plus index namespaces for unique lookups.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Validate that a namespace is safe for use as a key prefix.
///
/// Namespaces must be non-empty and must not contain the null byte, which is
/// the namespace/key separator.
pub(crate) fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if namespace.is_empty() {
        return Err(StorageError::InvalidKey(
            "namespace must not be empty".into(),
        ));
    }
    if namespace.contains('\0') {
        return Err(StorageError::InvalidKey(
            "namespace must not contain null bytes".into(),
        ));
    }
    Ok(())
}

/// Validate that a key is safe for storage.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    if key.contains('\0') {
        return Err(StorageError::InvalidKey(
            "key must not contain null bytes".into(),
        ));
    }
    Ok(())
}

/// Raw key-value store.
///
/// Every method is atomic with respect to the single row it touches. No
/// multi-row transaction is offered; callers that need several writes to take
/// effect together journal them and compensate on failure.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value by namespace and key.
    ///
    /// Returns `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Insert a value only if the key is absent.
    ///
    /// Returns `false`, leaving the stored value untouched, if the key exists.
    async fn insert_new(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<bool>;

    /// Delete a key.
    ///
    /// Returns `true` if the key existed and was deleted.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List all keys in a namespace.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// List all `(key, value)` pairs in a namespace.
    ///
    /// Rows deleted between listing and reading are skipped.
    async fn scan(&self, namespace: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let mut rows = Vec::new();
        for key in self.list_keys(namespace).await? {
            if let Some(value) = self.get(namespace, &key).await? {
                rows.push((key, value));
            }
        }
        Ok(rows)
    }
}

/// In-memory key-value store for tests and ephemeral deployments.
///
/// Keys are stored as `"{namespace}\0{key}"` in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create a new empty in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(namespace: &str, key: &str) -> StorageResult<String> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        Ok(format!("{namespace}\0{key}"))
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
        StorageError::Internal(e.to_string())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let full = Self::full_key(namespace, key)?;
        let data = self.data.read().map_err(Self::poisoned)?;
        Ok(data.get(&full).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.data.write().map_err(Self::poisoned)?;
        data.insert(full, value);
        Ok(())
    }

    async fn insert_new(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.data.write().map_err(Self::poisoned)?;
        if data.contains_key(&full) {
            return Ok(false);
        }
        data.insert(full, value);
        Ok(true)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let full = Self::full_key(namespace, key)?;
        let mut data = self.data.write().map_err(Self::poisoned)?;
        Ok(data.remove(&full).is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let data = self.data.read().map_err(Self::poisoned)?;
        let prefix = format!("{namespace}\0");
        let mut keys: Vec<String> = data
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn scan(&self, namespace: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        validate_namespace(namespace)?;
        let data = self.data.read().map_err(Self::poisoned)?;
        let prefix = format!("{namespace}\0");
        let mut rows: Vec<(String, Vec<u8>)> = data
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|key| (key.to_string(), v.clone())))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_set_overwrite() {
        let store = MemoryKvStore::new();
        assert!(store.get("roles", "r1").await.unwrap().is_none());

        store.set("roles", "r1", b"v1".to_vec()).await.unwrap();
        store.set("roles", "r1", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("roles", "r1").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_insert_new_is_exclusive() {
        let store = MemoryKvStore::new();
        assert!(store.insert_new("idx", "a@b.c", b"1".to_vec()).await.unwrap());
        assert!(!store.insert_new("idx", "a@b.c", b"2".to_vec()).await.unwrap());
        assert_eq!(store.get("idx", "a@b.c").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_memory_concurrent_insert_new_single_winner() {
        let store = std::sync::Arc::new(MemoryKvStore::new());
        let mut handles = Vec::new();
        for i in 0..16u8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.insert_new("idx", "name", vec![i]).await.unwrap()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_memory_delete() {
        let store = MemoryKvStore::new();
        store.set("ns", "k", b"v".to_vec()).await.unwrap();
        assert!(store.delete("ns", "k").await.unwrap());
        assert!(!store.delete("ns", "k").await.unwrap());
        assert!(store.get("ns", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_namespace_isolation_and_listing() {
        let store = MemoryKvStore::new();
        store.set("ns1", "b", b"2".to_vec()).await.unwrap();
        store.set("ns1", "a", b"1".to_vec()).await.unwrap();
        store.set("ns2", "c", b"3".to_vec()).await.unwrap();

        assert_eq!(store.list_keys("ns1").await.unwrap(), vec!["a", "b"]);
        let rows = store.scan("ns1").await.unwrap();
        assert_eq!(
            rows,
            vec![("a".to_string(), b"1".to_vec()), ("b".to_string(), b"2".to_vec())]
        );
        assert_eq!(store.scan("ns2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_rejects_bad_keys() {
        let store = MemoryKvStore::new();
        assert!(store.get("", "k").await.is_err());
        assert!(store.set("ns", "", vec![]).await.is_err());
        assert!(store.delete("ns", "k\0x").await.is_err());
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("roles").is_ok());
        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("ns\0bad").is_err());
    }
}
