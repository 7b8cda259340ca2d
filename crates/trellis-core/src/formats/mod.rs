//! # Formats
//!
//! Serialized records stored alongside the graph: the keyspace header.

pub mod header;

pub use header::KeyspaceHeader;
