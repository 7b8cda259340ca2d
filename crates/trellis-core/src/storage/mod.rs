//! # Storage Abstraction
//!
//! The ordered key-value store the graph is mapped onto.
//!
//! A `Storage` is scoped to one transaction: it reads from a fixed snapshot
//! and, when writable, buffers puts and deletes until commit. Keys iterate in
//! byte order.

mod redb_storage;

pub use redb_storage::{DATA_TABLE, RedbStorage};

use crate::types::GraphError;

/// A key and its value.
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Lazy, ordered sequence of key/value pairs.
pub type KeyValues = Box<dyn Iterator<Item = Result<KeyValue, GraphError>>>;

/// Transaction-scoped view of the key-value store.
pub trait Storage: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, GraphError>;

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), GraphError>;

    fn delete(&self, key: &[u8]) -> Result<(), GraphError>;

    /// Every pair whose key starts with `prefix`, in key order.
    fn iterate(&self, prefix: &[u8]) -> Result<KeyValues, GraphError>;

    /// The pair with the greatest key starting with `prefix`.
    fn last_with_prefix(&self, prefix: &[u8]) -> Result<Option<KeyValue>, GraphError>;

    fn contains(&self, key: &[u8]) -> Result<bool, GraphError> {
        Ok(self.get(key)?.is_some())
    }
}
