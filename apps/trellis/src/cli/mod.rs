//! # Trellis CLI Module
//!
//! This module implements the CLI interface for Trellis.
//!
//! ## Available Commands
//!
//! - `init` - Create and initialise a keyspace file
//! - `status` - Show keyspace status
//! - `define-type` - Define an entity, relation, role or attribute type
//! - `insert` - Insert an instance of a type
//! - `link` - Add an edge between two things
//! - `inspect` - Show a vertex with its properties and edges
//! - `types` - List every type label
//! - `dump` - Print raw key/value pairs

mod commands;

use crate::config::ConfigError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;
use trellis_core::GraphError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Trellis - typed property-graph keyspace administration
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the keyspace file (default: from config, then trellis.db)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to a TOML config file (default: ./trellis.toml if present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create and initialise a new keyspace
    Init {
        /// Replace an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show keyspace status
    Status,

    /// Define a new type in a schema transaction
    DefineType {
        /// Kind of type (entity, relation, role, attribute)
        #[arg(short, long)]
        kind: String,

        /// Unique label
        #[arg(short, long)]
        label: String,

        /// Supertype label (default: the root type of the kind)
        #[arg(short, long)]
        sub: Option<String>,

        /// Mark the type abstract
        #[arg(long = "abstract")]
        is_abstract: bool,

        /// Value type of an attribute type (boolean, long, double, string, datetime)
        #[arg(long)]
        value_type: Option<String>,

        /// Regex constraint of a string attribute type
        #[arg(long)]
        regex: Option<String>,
    },

    /// Insert an instance of a type
    Insert {
        /// Label of the type to instantiate
        #[arg(short = 't', long = "type")]
        type_label: String,

        /// Value of an attribute, parsed per the attribute type
        #[arg(long)]
        value: Option<String>,
    },

    /// Add a directed edge between two things
    Link {
        /// Edge schema (has, playing, relating, role-player)
        #[arg(short, long)]
        schema: String,

        /// IID of the source thing (0x...)
        #[arg(short, long)]
        from: String,

        /// IID of the target thing (0x...)
        #[arg(short, long)]
        to: String,
    },

    /// Show a vertex by label or IID (0x...)
    Inspect {
        /// Type label or vertex IID
        target: String,
    },

    /// List every type label with its IID
    Types,

    /// Print raw key/value pairs in key order
    Dump {
        /// Stop after this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI against the resolved keyspace path.
pub fn execute(cli: Cli, database: PathBuf) -> Result<(), CliError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&database, json_mode, force),
        Some(Commands::Status) | None => cmd_status(&database, json_mode),
        Some(Commands::DefineType {
            kind,
            label,
            sub,
            is_abstract,
            value_type,
            regex,
        }) => cmd_define_type(
            &database,
            json_mode,
            &TypeDefinition {
                kind,
                label,
                sub,
                is_abstract,
                value_type,
                regex,
            },
        )
        .map(|_| ()),
        Some(Commands::Insert { type_label, value }) => {
            cmd_insert(&database, json_mode, &type_label, value.as_deref()).map(|_| ())
        }
        Some(Commands::Link { schema, from, to }) => {
            cmd_link(&database, json_mode, &schema, &from, &to)
        }
        Some(Commands::Inspect { target }) => cmd_inspect(&database, json_mode, &target),
        Some(Commands::Types) => cmd_types(&database, json_mode),
        Some(Commands::Dump { limit }) => cmd_dump(&database, json_mode, limit),
    }
}
