//! # Transaction
//!
//! A unit of work over one snapshot of the keyspace.
//!
//! Everything a transaction writes stays in its own storage overlay. `commit`
//! writes the buffered graph into that overlay and then applies the overlay,
//! together with the key generator checkpoints, in one redb write
//! transaction. Dropping a transaction discards the overlay.

use crate::graph::{CommitSummary, Graphs, KeyGenerator, ThingGraph, TypeGraph};
use crate::lock::DataReadGuard;
use crate::storage::{KeyValues, RedbStorage, Storage};
use crate::types::{GraphError, TransactionType};
use std::sync::Arc;

/// A read or write transaction.
pub struct Transaction {
    kind: TransactionType,
    storage: Arc<RedbStorage>,
    graphs: Graphs,
    key_generator: Arc<KeyGenerator>,
    _data_guard: Option<DataReadGuard>,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("kind", &self.kind)
            .field("storage", &self.storage)
            .field("graphs", &self.graphs)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) fn new(
        kind: TransactionType,
        storage: Arc<RedbStorage>,
        graphs: Graphs,
        key_generator: Arc<KeyGenerator>,
        data_guard: Option<DataReadGuard>,
    ) -> Self {
        Self {
            kind,
            storage,
            graphs,
            key_generator,
            _data_guard: data_guard,
        }
    }

    #[must_use]
    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn graphs(&mut self) -> &mut Graphs {
        &mut self.graphs
    }

    pub fn types(&mut self) -> &mut TypeGraph {
        self.graphs.types()
    }

    pub fn things(&mut self) -> &mut ThingGraph {
        self.graphs.things()
    }

    /// Every key/value pair visible to this transaction, in key order.
    pub fn entries(&self) -> Result<KeyValues, GraphError> {
        self.storage.iterate(&[])
    }

    /// Write the buffered graph and apply it atomically.
    pub fn commit(self) -> Result<CommitSummary, GraphError> {
        let Self {
            kind,
            storage,
            graphs,
            key_generator,
            _data_guard,
        } = self;
        if kind == TransactionType::Read {
            return Err(GraphError::ReadOnly);
        }
        let summary = graphs.commit()?;
        let written = storage.commit_with(|| key_generator.checkpoint())?;
        tracing::debug!(
            types = summary.types,
            things = summary.things,
            type_edges = summary.type_edges,
            thing_edges = summary.thing_edges,
            written,
            "transaction committed"
        );
        Ok(summary)
    }
}
