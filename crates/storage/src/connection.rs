//! Connection provider: one dedicated PostgreSQL session per step.
//!
//! Sessions are never pooled. A step opens a [`ConnectionHandle`], uses it and
//! hands it back through [`release`], which closes it on every exit path.

use std::fmt;

use sqlx::postgres::{PgConnectOptions, PgConnection, Postgres};
use sqlx::{Connection, Executor, Transaction};
use vecdb_setup_core::{DbConfig, ADMIN_DATABASE};

use crate::error::StorageError;

const APPLICATION_NAME: &str = "vecdb-setup";

/// Which database on the server a session is opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectTarget {
    /// The always-present `postgres` database, used to create the application database.
    Administrative,
    /// The configured application database.
    Application,
}

/// How statements on a handle are committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationMode {
    /// Work goes through an explicit transaction obtained with [`ConnectionHandle::begin`].
    Transactional,
    /// Every statement commits on its own. Required by `CREATE DATABASE` and
    /// `CREATE EXTENSION`, which PostgreSQL rejects inside a transaction block.
    AutoCommit,
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transactional => f.write_str("transactional"),
            Self::AutoCommit => f.write_str("auto-commit"),
        }
    }
}

/// Opens sessions from validated [`DbConfig`] settings.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    config: DbConfig,
}

impl ConnectionProvider {
    #[must_use]
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Name of the database a target resolves to.
    #[must_use]
    pub fn database_name(&self, target: ConnectTarget) -> &str {
        match target {
            ConnectTarget::Administrative => ADMIN_DATABASE,
            ConnectTarget::Application => &self.config.database,
        }
    }

    #[must_use]
    pub fn connect_options(&self, target: ConnectTarget) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user)
            .password(&self.config.password)
            .database(self.database_name(target))
            .application_name(APPLICATION_NAME)
    }

    /// Open a new session. The isolation mode is fixed before the handle is
    /// returned, so no statement ever runs in the wrong mode.
    ///
    /// # Errors
    /// Returns `StorageError::Connection` if the server is unreachable or
    /// rejects the credentials. No retry is attempted.
    pub async fn open(
        &self,
        target: ConnectTarget,
        mode: IsolationMode,
    ) -> Result<ConnectionHandle, StorageError> {
        let database = self.database_name(target).to_owned();
        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            user = %self.config.user,
            database = %database,
            %mode,
            "Opening connection"
        );

        let conn = match PgConnection::connect_with(&self.connect_options(target)).await {
            Ok(conn) => conn,
            Err(source) => {
                tracing::error!(
                    host = %self.config.host,
                    port = self.config.port,
                    user = %self.config.user,
                    database = %database,
                    error = %source,
                    "Connection failed"
                );
                return Err(StorageError::Connection { database, source });
            },
        };

        let mut handle =
            ConnectionHandle { conn, database, mode: IsolationMode::Transactional };
        handle.set_isolation_mode(mode);
        Ok(handle)
    }
}

/// One open session, exclusively owned by the step that opened it.
pub struct ConnectionHandle {
    conn: PgConnection,
    database: String,
    mode: IsolationMode,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("database", &self.database)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ConnectionHandle {
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn mode(&self) -> IsolationMode {
        self.mode
    }

    /// PostgreSQL commits each statement unless a transaction block is open, so
    /// switching only changes which operations the handle permits.
    pub fn set_isolation_mode(&mut self, mode: IsolationMode) {
        if self.mode != mode {
            tracing::debug!(database = %self.database, from = %self.mode, to = %mode, "Switching isolation mode");
        }
        self.mode = mode;
    }

    /// Execute one statement outside any transaction.
    ///
    /// Uses the simple query protocol, so utility statements that cannot be
    /// prepared (`CREATE DATABASE`, `SHOW`) are accepted.
    ///
    /// # Errors
    /// `StorageError::IsolationMode` on a transactional handle, otherwise the
    /// server's error as `StorageError::Database`.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, StorageError> {
        let conn = self.autocommit_conn()?;
        let result = conn.execute(sqlx::raw_sql(sql)).await?;
        Ok(result.rows_affected())
    }

    /// Borrow the session for bound queries in auto-commit mode.
    ///
    /// # Errors
    /// `StorageError::IsolationMode` on a transactional handle.
    pub fn autocommit_conn(&mut self) -> Result<&mut PgConnection, StorageError> {
        self.require(IsolationMode::AutoCommit)?;
        Ok(&mut self.conn)
    }

    /// Start the scoped transaction. Dropping it without `commit` rolls back.
    ///
    /// # Errors
    /// `StorageError::IsolationMode` on an auto-commit handle, or the server's
    /// error if `BEGIN` fails.
    pub async fn begin(&mut self) -> Result<Transaction<'_, Postgres>, StorageError> {
        self.require(IsolationMode::Transactional)?;
        Ok(self.conn.begin().await?)
    }

    /// Terminate the session.
    ///
    /// # Errors
    /// Returns `StorageError::Connection` if the terminate handshake fails.
    pub async fn close(self) -> Result<(), StorageError> {
        let database = self.database;
        self.conn
            .close()
            .await
            .map_err(|source| StorageError::Connection { database, source })
    }

    fn require(&self, required: IsolationMode) -> Result<(), StorageError> {
        if self.mode == required {
            Ok(())
        } else {
            Err(StorageError::IsolationMode { required, actual: self.mode })
        }
    }
}

/// Close `handle` and pass `outcome` through.
///
/// A close failure is logged and never replaces the step's own result: the
/// work has already been committed or rolled back at this point.
pub async fn release<T>(
    handle: ConnectionHandle,
    outcome: Result<T, StorageError>,
) -> Result<T, StorageError> {
    let database = handle.database.clone();
    if let Err(err) = handle.close().await {
        tracing::warn!(database = %database, error = %err, "Failed to close connection cleanly");
    } else {
        tracing::debug!(database = %database, "Connection closed");
    }
    outcome
}
