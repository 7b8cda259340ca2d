//! # CLI Configuration
//!
//! Optional `trellis.toml` supplying defaults for the command line.
//!
//! ```toml
//! database = "graph.trellis"
//! log_format = "json"
//! log_filter = "trellis=debug"
//! ```
//!
//! Explicit flags win over the file, the file wins over built-in defaults.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "trellis.toml";

/// Keyspace used when neither a flag nor the file names one.
pub const DEFAULT_DATABASE: &str = "trellis.db";

/// Environment variable selecting the log format; beats the file.
pub const LOG_FORMAT_ENV: &str = "TRELLIS_LOG_FORMAT";

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Settings read from the config file; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub log_format: Option<LogFormat>,
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Config {
    /// Load `explicit`, or `trellis.toml` in the working directory if present.
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound {
                        path: path.to_path_buf(),
                    });
                }
                read_file(path)
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    read_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse config text that did not come from a file.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// File this config was read from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Keyspace path: the flag, then the file, then `trellis.db`.
    #[must_use]
    pub fn database(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }

    /// Log format: `env` (the value of `TRELLIS_LOG_FORMAT`), then the file.
    #[must_use]
    pub fn log_format(&self, env: Option<&str>) -> LogFormat {
        env.and_then(LogFormat::from_name)
            .or(self.log_format)
            .unwrap_or_default()
    }

    /// Filter directives when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_filter(&self, verbose: bool, quiet: bool) -> String {
        if let Some(filter) = &self.log_filter {
            return filter.clone();
        }
        let level = if verbose {
            "debug"
        } else if quiet {
            "warn"
        } else {
            "info"
        };
        format!("trellis={level},trellis_core={level}")
    }
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.path = Some(path.to_path_buf());
    Ok(config)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} does not exist")]
    NotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
