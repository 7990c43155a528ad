//! Error types for the ownership engine
//!
//! Most engine operations are total and report degraded results instead of
//! failing. Errors surface only where a caller must act on them: loading
//! configuration and talking to the ownership relation.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Relation error: {0}")]
    Relation(#[from] RelationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures reported by an ownership relation backend
#[derive(Error, Debug)]
pub enum RelationError {
    #[error("Relation unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed for '{key}': {message}")]
    QueryFailed { key: String, message: String },

    #[error("Failed to read records from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse records: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
