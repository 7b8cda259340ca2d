//! # Schema Lock
//!
//! One read/write lock per keyspace. Schema sessions hold the write side for
//! their whole lifetime; data transactions hold the read side for theirs.
//! Any number of data transactions run together, at most one schema session
//! exists, and a schema session waits until every data transaction is gone.
//!
//! Guards own an `Arc` of the lock, so sessions and transactions can carry
//! them without borrowing the keyspace.

use parking_lot::{
    RawRwLock, RwLock,
    lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard},
};
use std::sync::Arc;

/// Shared handle to a keyspace's schema lock.
#[derive(Clone, Default)]
pub struct SchemaLock(Arc<RwLock<()>>);

/// Exclusive hold of the schema lock, released on drop.
pub struct SchemaWriteGuard {
    _guard: ArcRwLockWriteGuard<RawRwLock, ()>,
}

/// Shared hold of the schema lock, released on drop.
pub struct DataReadGuard {
    _guard: ArcRwLockReadGuard<RawRwLock, ()>,
}

impl std::fmt::Debug for SchemaLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaLock")
            .field("schema_locked", &self.is_schema_locked())
            .finish()
    }
}

impl std::fmt::Debug for SchemaWriteGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SchemaWriteGuard")
    }
}

impl std::fmt::Debug for DataReadGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataReadGuard")
    }
}

impl SchemaLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock exclusively, blocking until every holder has released it.
    pub fn lock_schema(&self) -> SchemaWriteGuard {
        if let Some(guard) = self.try_lock_schema() {
            return guard;
        }
        tracing::debug!("waiting for schema lock");
        SchemaWriteGuard {
            _guard: self.0.write_arc(),
        }
    }

    /// Take the lock exclusively if nobody holds it.
    pub fn try_lock_schema(&self) -> Option<SchemaWriteGuard> {
        self.0
            .try_write_arc()
            .map(|guard| SchemaWriteGuard { _guard: guard })
    }

    /// Take the lock shared, blocking while a schema session holds it.
    pub fn lock_data(&self) -> DataReadGuard {
        if let Some(guard) = self.0.try_read_arc() {
            return DataReadGuard { _guard: guard };
        }
        tracing::debug!("data transaction waiting for schema session");
        DataReadGuard {
            _guard: self.0.read_arc(),
        }
    }

    #[must_use]
    pub fn is_schema_locked(&self) -> bool {
        self.0.is_locked_exclusive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
