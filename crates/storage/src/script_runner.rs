//! Executes SQL script files inside one scoped transaction per file.

use std::path::{Path, PathBuf};

use sqlx::Executor;

use crate::connection::{release, ConnectTarget, ConnectionHandle, ConnectionProvider, IsolationMode};
use crate::error::StorageError;
use crate::script::SqlScript;

/// Outcome of a successfully applied script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReport {
    pub script: String,
    pub statements: usize,
}

/// Runs scripts from a fixed directory against the application database.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    provider: ConnectionProvider,
    scripts_dir: PathBuf,
}

impl ScriptRunner {
    #[must_use]
    pub fn new(provider: ConnectionProvider, scripts_dir: impl Into<PathBuf>) -> Self {
        Self { provider, scripts_dir: scripts_dir.into() }
    }

    #[must_use]
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Load `name` from the scripts directory and apply all of its statements
    /// atomically.
    ///
    /// The file is resolved before any connection is opened, so a missing
    /// script never touches the server.
    ///
    /// # Errors
    /// `ScriptNotFound`/`ScriptRead` for file problems, `Connection` if the
    /// session cannot be opened, `Statement` if any statement fails (the whole
    /// script is rolled back).
    pub async fn run_script_file(&self, name: &str) -> Result<ScriptReport, StorageError> {
        let script = SqlScript::load(&self.scripts_dir, name).await.inspect_err(|err| {
            tracing::error!(script = name, error = %err, "Error loading SQL file");
        })?;

        let mut handle =
            self.provider.open(ConnectTarget::Application, IsolationMode::Transactional).await?;
        let outcome = run_in_transaction(&mut handle, &script).await;
        let outcome = release(handle, outcome).await;

        match &outcome {
            Ok(report) => tracing::info!(
                script = name,
                statements = report.statements,
                "Executed SQL file: {name} ({} statements)",
                report.statements
            ),
            Err(err) => tracing::error!(
                script = name,
                error = %err,
                cause = ?std::error::Error::source(err),
                "Error executing SQL file: {name}"
            ),
        }
        outcome
    }
}

/// Apply every statement of `script` in one transaction on `handle`.
///
/// Commits only after the last statement succeeds. On the first failure the
/// transaction is rolled back before the error is returned; if the rollback
/// itself fails the transaction guard still rolls back when dropped.
///
/// # Errors
/// `IsolationMode` if `handle` is in auto-commit mode, `Statement` for the
/// first failing statement, `Database` if `BEGIN`/`COMMIT` fail.
pub async fn run_in_transaction(
    handle: &mut ConnectionHandle,
    script: &SqlScript,
) -> Result<ScriptReport, StorageError> {
    let mut tx = handle.begin().await?;

    for (position, statement) in script.statements().iter().enumerate() {
        let index = position + 1;
        tracing::debug!(script = script.name(), index, "Executing statement");
        if let Err(source) = (&mut *tx).execute(sqlx::raw_sql(statement)).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(script = script.name(), error = %rollback_err, "Rollback failed");
            }
            return Err(StorageError::Statement { script: script.name().to_owned(), index, source });
        }
    }

    tx.commit().await?;
    Ok(ScriptReport { script: script.name().to_owned(), statements: script.len() })
}
