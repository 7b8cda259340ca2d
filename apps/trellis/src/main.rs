//! # Trellis - Keyspace Admin CLI
//!
//! The main binary over a trellis-core keyspace file.
//!
//! ## Usage
//!
//! ```bash
//! trellis init -D graph.trellis
//! trellis define-type -k entity -l person
//! trellis define-type -k attribute -l age --value-type long
//! trellis insert -t person
//! trellis insert -t age --value 42
//! trellis inspect person
//! trellis dump --limit 20
//! ```

use clap::Parser;
use trellis::cli::{self, Cli};
use trellis::config::{Config, LOG_FORMAT_ENV, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    // The config file can pick the log format, so it is read before tracing starts.
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let env_format = std::env::var(LOG_FORMAT_ENV).ok();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter(cli.verbose, cli.quiet).into());

    match config.log_format(env_format.as_deref()) {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if let Some(path) = config.path() {
        tracing::debug!(path = %path.display(), "config loaded");
    }

    let database = config.database(cli.database.as_deref());
    if let Err(e) = cli::execute(cli, database) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
