//! # trellis-core
//!
//! Vertex/edge storage engine for a typed property graph.
//!
//! This crate maps types (entity, relation, role and attribute types) and
//! their instances onto an ordered key-value store (redb), and gives
//! transactions a consistent view of that mapping.
//!
//! ## Architecture
//!
//! - `encoding`: the byte layout of every vertex, property, index entry and edge
//! - `graph`: buffered and persisted vertices, edges, adjacency, key generation
//! - `storage`: transaction-scoped view over redb with a private write overlay
//! - `lock`, `keyspace`, `session`, `transaction`: who may write what, and when
//!
//! ## Architectural Constraints
//!
//! - Nothing reaches the store before a transaction commits
//! - A commit is one redb write transaction
//! - Schema sessions exclude each other and every data transaction
//! - No async, no network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod encoding;
pub mod formats;
pub mod graph;
pub mod iterator;
pub mod keyspace;
pub mod lock;
pub mod primitives;
pub mod session;
pub mod storage;
pub mod transaction;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Access, Direction, GraphError, Iid, SessionType, Status, TransactionType, hex_string,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use encoding::{
    EdgeSchema, ThingEdgeSchema, ThingSchema, TypeEdgeSchema, TypeSchema, Value, ValueType,
};
pub use formats::KeyspaceHeader;
pub use graph::{
    CommitSummary, DirectedEdges, Edge, Graphs, KeyGenerator, ThingGraph, ThingVertex, TypeGraph,
    TypeVertex,
};
pub use iterator::{Link, VertexIter, link};
pub use keyspace::Keyspace;
pub use lock::{DataReadGuard, SchemaLock, SchemaWriteGuard};
pub use session::Session;
pub use storage::{KeyValue, KeyValues, RedbStorage, Storage};
pub use transaction::Transaction;
