//! Typed error enum for the service layer.
//!
//! Unifies configuration, storage and embedding failures into a single error
//! type. Errors pass through the pipeline unchanged; [`SetupError::kind`]
//! classifies them for operators.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;
use vecdb_setup_core::ConfigError;
use vecdb_setup_embeddings::EmbeddingError;
use vecdb_setup_storage::StorageError;

/// Service-layer error unifying every way a setup run can fail.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Configuration missing or malformed; nothing was touched.
    #[error("configuration invalid: {0}")]
    Config(#[from] ConfigError),

    /// Connection, script or SQL failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The external embedding model service failed.
    #[error("embedding service: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Operator-facing classification of a [`SetupError`]. Every kind is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigurationInvalid,
    ConnectionFailure,
    ScriptFileNotFound,
    /// The script exists but is unreadable or not UTF-8.
    ScriptFileUnreadable,
    SqlExecution,
    EmbeddingService,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ConfigurationInvalid => "configuration invalid",
            Self::ConnectionFailure => "connection failure",
            Self::ScriptFileNotFound => "script file not found",
            Self::ScriptFileUnreadable => "script file unreadable",
            Self::SqlExecution => "SQL execution error",
            Self::EmbeddingService => "embedding service error",
        })
    }
}

impl SetupError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::ConfigurationInvalid,
            Self::Storage(StorageError::Connection { .. }) => ErrorKind::ConnectionFailure,
            Self::Storage(StorageError::ScriptNotFound { .. }) => ErrorKind::ScriptFileNotFound,
            Self::Storage(StorageError::ScriptRead { .. }) => ErrorKind::ScriptFileUnreadable,
            Self::Storage(
                StorageError::Statement { .. }
                | StorageError::IsolationMode { .. }
                | StorageError::Database(_),
            ) => ErrorKind::SqlExecution,
            Self::Embedding(_) => ErrorKind::EmbeddingService,
        }
    }
}

/// `error: cause: root cause`, for log lines that must carry the full context.
#[must_use]
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}
