// Copyright 2026 Vidstore Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared across the workspace.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the harness outside of a benchmark run.
///
/// A benchmark run itself never returns these; its failures are recorded as
/// [`crate::record::Diagnostic`] entries on the metrics record instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied an invalid value.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Settings could not be loaded or are inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The metrics log could not be written.
    #[error("PersistenceError: failed to write {}: {source}", path.display())]
    Persistence {
        /// Destination that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Generic I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV (de)serialization failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Build an [`Error::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Build an [`Error::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Build an [`Error::Persistence`] for `path`.
    pub fn persistence(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Persistence {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by an encode/decode engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine failed to produce artifacts.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// The engine failed to read artifacts back.
    #[error("decoding failed: {0}")]
    Decoding(String),

    /// The requested backend is not usable.
    #[error("backend unavailable: {0}")]
    Backend(String),

    /// Filesystem failure inside the engine.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed index or stats document.
    #[error("malformed engine document: {0}")]
    Format(#[from] serde_json::Error),
}

impl EngineError {
    /// Short, stable name of the variant, used when a failure is recorded
    /// outside the stage it is expected in.
    pub fn type_name(&self) -> &'static str {
        match self {
            EngineError::Encoding(_) => "Encoding",
            EngineError::Decoding(_) => "Decoding",
            EngineError::Backend(_) => "Backend",
            EngineError::Io(_) => "Io",
            EngineError::Format(_) => "Format",
        }
    }
}
