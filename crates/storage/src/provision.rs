//! Server-level provisioning: the application database and the pgvector extension.
//!
//! Both run in auto-commit mode on a connection that lives only for the call.

use vecdb_setup_core::VECTOR_EXTENSION;

use crate::connection::{release, ConnectTarget, ConnectionHandle, ConnectionProvider, IsolationMode};
use crate::error::StorageError;

/// Result of [`ensure_database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseStatus {
    Created,
    AlreadyExists,
}

/// Diagnostics collected while enabling the extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionReport {
    pub server_version: Option<String>,
    pub data_directory: Option<String>,
}

/// Quote a PostgreSQL identifier, doubling embedded quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Create the configured database unless `pg_database` already lists it.
///
/// # Errors
/// `Connection` if the administrative session cannot be opened, `Database`
/// if the catalog query or `CREATE DATABASE` fails.
pub async fn ensure_database(provider: &ConnectionProvider) -> Result<DatabaseStatus, StorageError> {
    let name = provider.database_name(ConnectTarget::Application).to_owned();
    let mut handle = provider.open(ConnectTarget::Administrative, IsolationMode::AutoCommit).await?;
    let outcome = create_if_missing(&mut handle, &name).await;
    let outcome = release(handle, outcome).await;

    match &outcome {
        Ok(DatabaseStatus::Created) => tracing::info!(database = %name, "Database '{name}' created"),
        Ok(DatabaseStatus::AlreadyExists) => {
            tracing::info!(database = %name, "Database '{name}' already exists");
        },
        Err(err) => tracing::error!(database = %name, error = %err, "Error creating database"),
    }
    outcome
}

async fn create_if_missing(
    handle: &mut ConnectionHandle,
    name: &str,
) -> Result<DatabaseStatus, StorageError> {
    let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(name)
        .fetch_optional(handle.autocommit_conn()?)
        .await?;
    if exists.is_some() {
        return Ok(DatabaseStatus::AlreadyExists);
    }

    match handle.execute(&format!("CREATE DATABASE {}", quote_identifier(name))).await {
        Ok(_) => Ok(DatabaseStatus::Created),
        // Someone else created it between the check and the create.
        Err(err) if err.is_duplicate_database() => Ok(DatabaseStatus::AlreadyExists),
        Err(err) => Err(err),
    }
}

/// Enable pgvector on the application database.
///
/// Server version and data directory are logged for operators; failing to
/// read them only produces a warning. Failing to enable the extension is an
/// error.
///
/// # Errors
/// `Connection` if the session cannot be opened, `Database` if
/// `CREATE EXTENSION` fails.
pub async fn ensure_vector_extension(
    provider: &ConnectionProvider,
) -> Result<ExtensionReport, StorageError> {
    let config = provider.config();
    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        user = %config.user,
        "Connecting for pgvector"
    );

    let mut handle = provider.open(ConnectTarget::Application, IsolationMode::AutoCommit).await?;
    let outcome = enable_extension(&mut handle).await;
    let outcome = release(handle, outcome).await;

    if let Err(err) = &outcome {
        tracing::error!(database = %config.database, error = %err, "Error enabling pgvector extension");
    }
    outcome
}

async fn enable_extension(handle: &mut ConnectionHandle) -> Result<ExtensionReport, StorageError> {
    let report = ExtensionReport {
        server_version: show_setting(handle, "server_version").await,
        data_directory: show_setting(handle, "data_directory").await,
    };
    if let Some(version) = &report.server_version {
        tracing::info!(server_version = %version, "Connected Postgres version: {version}");
    }
    if let Some(dir) = &report.data_directory {
        tracing::info!(data_directory = %dir, "Postgres data directory: {dir}");
    }

    handle.execute(&format!("CREATE EXTENSION IF NOT EXISTS {VECTOR_EXTENSION}")).await?;
    tracing::info!(extension = VECTOR_EXTENSION, "pgvector extension is enabled");
    Ok(report)
}

/// Advisory `SHOW`; `data_directory` needs elevated privileges on most servers.
async fn show_setting(handle: &mut ConnectionHandle, setting: &'static str) -> Option<String> {
    let conn = handle.autocommit_conn().ok()?;
    match sqlx::query_scalar::<_, String>(&format!("SHOW {setting}")).fetch_one(conn).await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(setting, error = %err, "Could not read server setting");
            None
        },
    }
}
