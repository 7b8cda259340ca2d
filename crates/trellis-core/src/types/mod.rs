//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the storage engine:
//! - Vertex identifiers (`Iid`)
//! - Lifecycle and direction markers (`Status`, `Direction`)
//! - Session/transaction kinds and the access level they grant (`Access`)
//! - Error types (`GraphError`)
//!
//! ## Ordering Guarantees
//!
//! `Iid` orders by raw bytes, which is the same order the key-value store
//! iterates in. Every in-memory index keyed by `Iid` therefore walks vertices
//! in storage order.

use std::fmt;
use thiserror::Error;

// =============================================================================
// VERTEX IDENTIFIER
// =============================================================================

/// Internal identifier of a vertex: the storage key under which it lives.
///
/// Type vertices carry a 3-byte IID, thing vertices a 12-byte IID; see
/// `encoding::keys` for the exact layout.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Iid(Vec<u8>);

impl Iid {
    /// Wrap raw bytes as an IID.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw bytes of the IID.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The schema prefix byte, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// Number of bytes in the IID.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the IID is empty (never true for a generated IID).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering, used in logs and CLI output.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex_string(&self.0)
    }
}

impl fmt::Debug for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Iid(0x{})", self.to_hex())
    }
}

impl fmt::Display for Iid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Iid {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Render bytes as lowercase hex.
#[must_use]
pub fn hex_string(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

// =============================================================================
// LIFECYCLE & DIRECTION
// =============================================================================

/// Lifecycle of a vertex or edge within a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// Created by the current transaction; exists only in its memory.
    Buffered,
    /// Its key already exists in storage.
    Persisted,
}

/// Direction of an adjacency view relative to its owning vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    #[must_use]
    pub const fn is_out(self) -> bool {
        matches!(self, Self::Out)
    }

    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Out => Self::In,
            Self::In => Self::Out,
        }
    }
}

// =============================================================================
// SESSIONS & TRANSACTIONS
// =============================================================================

/// Kind of session opened against a keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionType {
    /// Holds the keyspace schema lock exclusively for its whole lifetime.
    Schema,
    /// Its transactions share the schema lock with every other data transaction.
    Data,
}

/// Kind of transaction opened within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Read,
    Write,
}

/// What a graph is allowed to mutate, derived from session and transaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    DataWrite,
    SchemaWrite,
}

impl Access {
    #[must_use]
    pub const fn of(session: SessionType, transaction: TransactionType) -> Self {
        match (session, transaction) {
            (_, TransactionType::Read) => Self::Read,
            (SessionType::Data, TransactionType::Write) => Self::DataWrite,
            (SessionType::Schema, TransactionType::Write) => Self::SchemaWrite,
        }
    }

    #[must_use]
    pub const fn can_write_data(self) -> bool {
        !matches!(self, Self::Read)
    }

    #[must_use]
    pub const fn can_write_schema(self) -> bool {
        matches!(self, Self::SchemaWrite)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the storage engine.
///
/// Absence is not an error: lookups return `Ok(None)` or an empty sequence.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The operation would break the structure of the graph or its encoding.
    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    /// A write was issued through a read-only transaction.
    #[error("Transaction is read-only")]
    ReadOnly,

    /// A type was mutated outside a schema write transaction.
    #[error("Schema mutation requires a schema session write transaction")]
    SchemaWriteRequired,

    /// A key generator counter ran out of space.
    #[error("Key space exhausted for {0}")]
    KeyExhausted(String),

    /// The keyspace header could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The keyspace was written with an encoding this build cannot read.
    #[error("Incompatible encoding version: found {found}, expected {expected}")]
    IncompatibleEncoding { found: u8, expected: u8 },

    /// The keyspace has no header.
    #[error("Keyspace is not initialised")]
    NotInitialised,

    /// The keyspace already carries a header.
    #[error("Keyspace is already initialised")]
    AlreadyInitialised,

    /// Another transaction committed a change this one depended on; the key
    /// (or scanned prefix) is given in hex. Nothing was written.
    #[error("Transaction conflict on 0x{0}")]
    Conflict(String),

    /// The underlying store reported a failure.
    #[error("Storage failure: {0}")]
    Storage(#[from] redb::Error),
}

impl GraphError {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Self::StructuralViolation(message.into())
    }
}

macro_rules! storage_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for GraphError {
                fn from(error: $source) -> Self {
                    Self::Storage(redb::Error::from(error))
                }
            }
        )*
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// =============================================================================
// TESTS
// =============================================================================
