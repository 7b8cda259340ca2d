//! Directed, schema-typed edges.
//!
//! An edge is stored under two keys: the outgoing form at its `from` vertex
//! and the incoming form at its `to` vertex. Either form decodes back to the
//! same edge.

use crate::encoding::EdgeSchema;
use crate::encoding::keys;
use crate::storage::Storage;
use crate::types::{Direction, GraphError, Iid, Status};

/// An edge `from --schema--> to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<S> {
    schema: S,
    from: Iid,
    to: Iid,
    status: Status,
}

impl<S: EdgeSchema> Edge<S> {
    /// A new edge that exists only in its transaction.
    #[must_use]
    pub fn buffered(schema: S, from: Iid, to: Iid) -> Self {
        Self {
            schema,
            from,
            to,
            status: Status::Buffered,
        }
    }

    /// An edge whose keys are already in storage.
    #[must_use]
    pub fn persisted(schema: S, from: Iid, to: Iid) -> Self {
        Self {
            schema,
            from,
            to,
            status: Status::Persisted,
        }
    }

    /// Decode either key form. Both endpoint IIDs must be `iid_length` long.
    pub fn decode(key: &[u8], iid_length: usize) -> Result<Self, GraphError> {
        if key.len() != 2 * iid_length + 1 {
            return Err(GraphError::structural(format!(
                "edge key {} has length {}, expected {}",
                crate::types::hex_string(key),
                key.len(),
                2 * iid_length + 1
            )));
        }
        let (schema, direction) = S::from_infix(key[iid_length]).ok_or_else(|| {
            GraphError::structural(format!(
                "unrecognised edge infix 0x{:02x}",
                key[iid_length]
            ))
        })?;
        let start = Iid::new(&key[..iid_length]);
        let end = Iid::new(&key[iid_length + 1..]);
        Ok(match direction {
            Direction::Out => Self::persisted(schema, start, end),
            Direction::In => Self::persisted(schema, end, start),
        })
    }

    #[must_use]
    pub fn schema(&self) -> S {
        self.schema
    }

    #[must_use]
    pub fn from(&self) -> &Iid {
        &self.from
    }

    #[must_use]
    pub fn to(&self) -> &Iid {
        &self.to
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// The endpoint seen from the other end, looking in `direction`.
    #[must_use]
    pub fn adjacent(&self, direction: Direction) -> &Iid {
        match direction {
            Direction::Out => &self.to,
            Direction::In => &self.from,
        }
    }

    #[must_use]
    pub fn outwards_key(&self) -> Vec<u8> {
        keys::edge_key(&self.from, self.schema.out_infix(), &self.to)
    }

    #[must_use]
    pub fn inwards_key(&self) -> Vec<u8> {
        keys::edge_key(&self.to, self.schema.in_infix(), &self.from)
    }

    /// Write both key forms and mark the edge persisted.
    pub fn commit(&mut self, storage: &dyn Storage) -> Result<(), GraphError> {
        if self.status == Status::Persisted {
            return Err(GraphError::structural(format!(
                "edge {} {} {} is already persisted",
                self.from,
                self.schema.name(),
                self.to
            )));
        }
        storage.put(self.outwards_key(), Vec::new())?;
        storage.put(self.inwards_key(), Vec::new())?;
        self.status = Status::Persisted;
        tracing::trace!(from = %self.from, to = %self.to, schema = self.schema.name(), "edge committed");
        Ok(())
    }

    /// Delete both key forms of a persisted edge. Buffered edges have none.
    pub fn delete(&self, storage: &dyn Storage) -> Result<(), GraphError> {
        if self.status == Status::Persisted {
            storage.delete(&self.outwards_key())?;
            storage.delete(&self.inwards_key())?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
