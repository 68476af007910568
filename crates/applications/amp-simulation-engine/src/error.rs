//! Error types for the simulation engine
//!
//! The scheduling core never fails: empty eligible sets, zero budgets and
//! unknown pids are ordinary return values. Errors only come from config
//! validation and from writing results to disk.

use std::path::PathBuf;
use thiserror::Error;

/// Simulation result type
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur outside the scheduling core
#[derive(Error, Debug)]
pub enum SimError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be read
    #[error("Failed to load config from {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error raised while loading `path`
    pub fn config_file(path: impl Into<PathBuf>, source: SimError) -> Self {
        Self::ConfigFile {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
