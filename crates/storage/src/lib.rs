//! Storage layer for vecdb-setup
//!
//! PostgreSQL sessions, SQL script execution and the server-level
//! provisioning steps (database, pgvector extension, embedding rows).

mod connection;
mod embedding_store;
mod error;
mod provision;
mod script;
mod script_runner;
pub mod sql_split;

pub use connection::{release, ConnectTarget, ConnectionHandle, ConnectionProvider, IsolationMode};
pub use embedding_store::{vector_literal, EmbeddingStore, PendingRow, PgEmbeddingStore};
pub use error::StorageError;
pub use provision::{
    ensure_database, ensure_vector_extension, quote_identifier, DatabaseStatus, ExtensionReport,
};
pub use script::SqlScript;
pub use script_runner::{run_in_transaction, ScriptReport, ScriptRunner};
pub use sql_split::split_statements;
pub use sqlx::Error as SqlxError;
