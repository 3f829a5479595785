//! Persistent key-value store backed by `SurrealKV`.

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, validate_key, validate_namespace};

/// Composite key `"{namespace}\0{key}"`.
fn composite_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(namespace.len().saturating_add(key.len()).saturating_add(1));
    buf.extend_from_slice(namespace.as_bytes());
    buf.push(0);
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// Namespace range `["{namespace}\0", "{namespace}\x01")`, covering exactly the
/// keys of one namespace.
fn namespace_range(namespace: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = namespace.as_bytes().to_vec();
    let mut end = start.clone();
    start.push(0);
    end.push(1);
    (start, end)
}

fn map_kv_err(e: &surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

/// Embedded LSM-tree storage. Every operation runs in its own transaction.
///
/// # Example
///
/// ```rust,ignore
/// use warden_storage::SurrealKvStore;
///
/// let store = SurrealKvStore::open("/var/lib/warden/kv")?;
/// ```
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

impl SurrealKvStore {
    /// Open a persistent KV store at the given directory path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the store cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> StorageResult<Self> {
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.as_ref().to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::debug!(path = %path.as_ref().display(), "opened surrealkv store");
        Ok(Self { tree })
    }

    /// Close the store, flushing pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree.close().await.map_err(|ref e| map_kv_err(e))
    }

    fn collect_range(
        &self,
        namespace: &str,
        with_values: bool,
    ) -> StorageResult<Vec<(String, Vec<u8>)>> {
        validate_namespace(namespace)?;
        let (start, end) = namespace_range(namespace);
        let prefix_len = start.len();

        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| map_kv_err(e))?;
        let mut iter = tx.range(&start, &end).map_err(|ref e| map_kv_err(e))?;
        iter.seek_first().map_err(|ref e| map_kv_err(e))?;

        let mut raw_keys = Vec::new();
        while iter.valid() {
            raw_keys.push(iter.key());
            iter.next().map_err(|ref e| map_kv_err(e))?;
        }
        drop(iter);

        let mut rows = Vec::with_capacity(raw_keys.len());
        for raw_key in raw_keys {
            let Some(Ok(key)) = raw_key.get(prefix_len..).map(std::str::from_utf8) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let value = if with_values {
                match tx.get(&raw_key).map_err(|ref e| map_kv_err(e))? {
                    Some(value) => value,
                    None => continue,
                }
            } else {
                Vec::new()
            };
            rows.push((key.to_string(), value));
        }
        Ok(rows)
    }
}

#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let tx = self
            .tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(|ref e| map_kv_err(e))?;
        tx.get(&composite_key(namespace, key))
            .map_err(|ref e| map_kv_err(e))
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        tx.set(&composite_key(namespace, key), &value)
            .map_err(|ref e| map_kv_err(e))?;
        tx.commit().await.map_err(|ref e| map_kv_err(e))
    }

    async fn insert_new(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        if tx.get(&ck).map_err(|ref e| map_kv_err(e))?.is_some() {
            return Ok(false);
        }
        tx.set(&ck, &value).map_err(|ref e| map_kv_err(e))?;
        // A concurrent insert of the same key fails this commit with a conflict.
        tx.commit().await.map_err(|ref e| map_kv_err(e))?;
        Ok(true)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let ck = composite_key(namespace, key);
        let mut tx = self.tree.begin().map_err(|ref e| map_kv_err(e))?;
        let existed = tx.get(&ck).map_err(|ref e| map_kv_err(e))?.is_some();
        if existed {
            tx.delete(&ck).map_err(|ref e| map_kv_err(e))?;
            tx.commit().await.map_err(|ref e| map_kv_err(e))?;
        }
        Ok(existed)
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .collect_range(namespace, false)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    async fn scan(&self, namespace: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.collect_range(namespace, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (SurrealKvStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SurrealKvStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_surreal_get_set_delete() {
        let (store, _dir) = make_store();
        store.set("roles", "r1", b"hello".to_vec()).await.unwrap();
        assert_eq!(
            store.get("roles", "r1").await.unwrap(),
            Some(b"hello".to_vec())
        );
        assert!(store.delete("roles", "r1").await.unwrap());
        assert!(!store.delete("roles", "r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_surreal_insert_new() {
        let (store, _dir) = make_store();
        assert!(store.insert_new("idx", "k", b"1".to_vec()).await.unwrap());
        assert!(!store.insert_new("idx", "k", b"2".to_vec()).await.unwrap());
        assert_eq!(store.get("idx", "k").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_surreal_scan_is_namespace_scoped() {
        let (store, _dir) = make_store();
        store.set("ns1", "a", b"1".to_vec()).await.unwrap();
        store.set("ns1", "b", b"2".to_vec()).await.unwrap();
        store.set("ns2", "c", b"3".to_vec()).await.unwrap();

        let mut keys = store.list_keys("ns1").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(store.scan("ns2").await.unwrap().len(), 1);
    }
}
