//! Warden Storage - namespaced key-value persistence.
//!
//! This crate provides:
//! - [`KvStore`], byte-level `get`/`set`/`insert_new`/`delete` scoped to a
//!   namespace. Every operation is atomic for a single row.
//! - [`MemoryKvStore`] for tests and ephemeral deployments
//! - `SurrealKvStore` (behind the `kv` feature), a persistent embedded backend
//! - [`Table`], a typed JSON view over one namespace
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use warden_storage::{KvStore, MemoryKvStore, Table};
//!
//! let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
//! let roles: Table<String> = Table::new(store, "roles").unwrap();
//! assert_eq!(roles.namespace(), "roles");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod kv;
#[cfg(feature = "kv")]
mod surreal;
mod table;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore};
#[cfg(feature = "kv")]
pub use surreal::SurrealKvStore;
pub use table::Table;
