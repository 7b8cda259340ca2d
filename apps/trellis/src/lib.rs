//! # trellis
//!
//! Command line administration of a trellis keyspace file.
//!
//! - `cli`: argument parsing and one function per command
//! - `config`: optional `trellis.toml` defaults

pub mod cli;
pub mod config;
