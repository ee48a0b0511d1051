//! Typed error enum for the storage layer.
//!
//! Every variant keeps the context an operator needs to act on the failure
//! (which database, which script, which statement) plus the underlying cause.

use std::path::PathBuf;

use thiserror::Error;

use crate::connection::IsolationMode;

/// SQLSTATE `duplicate_database`.
const DUPLICATE_DATABASE: &str = "42P04";

/// Storage-layer error with variants covering every expected failure mode.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Could not open (or cleanly close) a session.
    #[error("connection to database {database:?} failed: {source}")]
    Connection {
        database: String,
        #[source]
        source: sqlx::Error,
    },

    /// The SQL script file does not exist.
    #[error("SQL file not found: {}", path.display())]
    ScriptNotFound { path: PathBuf },

    /// The SQL script file exists but could not be read as UTF-8 text.
    #[error("failed to read SQL file {}: {source}", path.display())]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A statement of a script failed; the script's transaction was rolled back.
    #[error("statement {index} of {script} failed: {source}")]
    Statement {
        script: String,
        /// 1-based position of the statement within the script.
        index: usize,
        #[source]
        source: sqlx::Error,
    },

    /// An operation was attempted on a handle in the wrong isolation mode.
    #[error("operation requires {required} mode, connection is in {actual} mode")]
    IsolationMode { required: IsolationMode, actual: IsolationMode },

    /// SQL / protocol failure outside of a script.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StorageError {
    /// Whether this error was raised while establishing a session.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Whether this error is a missing script file.
    pub fn is_script_not_found(&self) -> bool {
        matches!(self, Self::ScriptNotFound { .. })
    }

    /// Whether the server reported that the database already exists.
    pub fn is_duplicate_database(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().is_some_and(|c| c == DUPLICATE_DATABASE)
            },
            _ => false,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}
