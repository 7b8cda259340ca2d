//! # Session Module
//!
//! A session is a client's connection to a keyspace.
//!
//! - A schema session holds the schema lock exclusively from open to drop.
//!   Its write transactions may change types and things.
//! - A data session holds nothing itself. Each of its transactions holds the
//!   schema lock shared, so they all wait while a schema session is open.

use crate::graph::Graphs;
use crate::keyspace::Keyspace;
use crate::lock::SchemaWriteGuard;
use crate::storage::{RedbStorage, Storage};
use crate::transaction::Transaction;
use crate::types::{Access, GraphError, SessionType, TransactionType};
use std::sync::Arc;

/// A session against one keyspace.
pub struct Session {
    keyspace: Keyspace,
    kind: SessionType,
    _schema_guard: Option<SchemaWriteGuard>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("keyspace", &self.keyspace.name())
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        keyspace: Keyspace,
        kind: SessionType,
        schema_guard: Option<SchemaWriteGuard>,
    ) -> Self {
        tracing::debug!(keyspace = %keyspace.name(), kind = ?kind, "session opened");
        Self {
            keyspace,
            kind,
            _schema_guard: schema_guard,
        }
    }

    #[must_use]
    pub fn kind(&self) -> SessionType {
        self.kind
    }

    #[must_use]
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Open a transaction over a fresh snapshot of the keyspace.
    ///
    /// In a data session this blocks while a schema session is open.
    pub fn transaction(&self, kind: TransactionType) -> Result<Transaction, GraphError> {
        let data_guard = match self.kind {
            SessionType::Data => Some(self.keyspace.schema_lock().lock_data()),
            SessionType::Schema => None,
        };
        let db = Arc::clone(self.keyspace.database());
        let storage = Arc::new(match kind {
            TransactionType::Read => RedbStorage::read(db)?,
            TransactionType::Write => RedbStorage::write(db)?,
        });
        let key_generator = Arc::clone(self.keyspace.key_generator());
        let shared: Arc<dyn Storage> = Arc::clone(&storage) as Arc<dyn Storage>;
        let graphs = Graphs::new(shared, Arc::clone(&key_generator), Access::of(self.kind, kind));
        Ok(Transaction::new(kind, storage, graphs, key_generator, data_guard))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!(keyspace = %self.keyspace.name(), kind = ?self.kind, "session closed");
    }
}
