//! Rows waiting for an embedding, and where their vectors are written back.

use async_trait::async_trait;
use sqlx::Row;
use vecdb_setup_core::{EmbeddingTarget, EMBEDDING_COLUMN, EMBEDDING_ID_COLUMN};

use crate::connection::{release, ConnectTarget, ConnectionHandle, ConnectionProvider, IsolationMode};
use crate::error::StorageError;
use crate::provision::quote_identifier;

/// A row whose embedding column is still NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRow {
    /// Primary key rendered as text.
    pub id: String,
    /// Text columns joined with single spaces, NULLs skipped.
    pub content: String,
}

/// Embedding storage operations.
#[async_trait]
pub trait EmbeddingStore: Send {
    /// Up to `limit` rows of `target` without an embedding.
    ///
    /// Rows whose text columns are all NULL or empty are never returned.
    async fn rows_missing_embeddings(
        &mut self,
        target: &EmbeddingTarget,
        limit: usize,
    ) -> Result<Vec<PendingRow>, StorageError>;

    /// Store an embedding vector for one row.
    async fn store_embedding(
        &mut self,
        target: &EmbeddingTarget,
        id: &str,
        embedding: &[f32],
    ) -> Result<(), StorageError>;
}

/// [`EmbeddingStore`] over one auto-commit session to the application database.
///
/// Each stored vector commits on its own, so an aborted run keeps the
/// embeddings written so far and the next run only fills the remainder.
#[derive(Debug)]
pub struct PgEmbeddingStore {
    handle: ConnectionHandle,
}

impl PgEmbeddingStore {
    /// # Errors
    /// `StorageError::Connection` if the session cannot be opened.
    pub async fn open(provider: &ConnectionProvider) -> Result<Self, StorageError> {
        let handle = provider.open(ConnectTarget::Application, IsolationMode::AutoCommit).await?;
        Ok(Self { handle })
    }

    /// Close the session. A close failure is logged, not returned.
    pub async fn close(self) {
        let _closed: Result<(), StorageError> = release(self.handle, Ok(())).await;
    }
}

#[async_trait]
impl EmbeddingStore for PgEmbeddingStore {
    async fn rows_missing_embeddings(
        &mut self,
        target: &EmbeddingTarget,
        limit: usize,
    ) -> Result<Vec<PendingRow>, StorageError> {
        let sql = pending_rows_query(target);
        let rows = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(self.handle.autocommit_conn()?)
            .await?;
        rows.iter()
            .map(|row| -> Result<PendingRow, StorageError> {
                Ok(PendingRow { id: row.try_get("id")?, content: row.try_get("content")? })
            })
            .collect()
    }

    async fn store_embedding(
        &mut self,
        target: &EmbeddingTarget,
        id: &str,
        embedding: &[f32],
    ) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE {table} SET {column} = $1::vector WHERE {id_column}::text = $2",
            table = quote_identifier(&target.table),
            column = quote_identifier(EMBEDDING_COLUMN),
            id_column = quote_identifier(EMBEDDING_ID_COLUMN),
        );
        sqlx::query(&sql)
            .bind(vector_literal(embedding))
            .bind(id)
            .execute(self.handle.autocommit_conn()?)
            .await?;
        Ok(())
    }
}

fn pending_rows_query(target: &EmbeddingTarget) -> String {
    let text = target.text_columns.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ");
    let id_column = quote_identifier(EMBEDDING_ID_COLUMN);
    format!(
        "SELECT {id_column}::text AS id, concat_ws(' ', {text}) AS content \
           FROM {table} \
          WHERE {column} IS NULL AND concat_ws(' ', {text}) <> '' \
          ORDER BY {id_column} \
          LIMIT $1",
        table = quote_identifier(&target.table),
        column = quote_identifier(EMBEDDING_COLUMN),
    )
}

/// pgvector text input format: `[0.1,0.2,...]`.
#[must_use]
pub fn vector_literal(embedding: &[f32]) -> String {
    format!("[{}]", embedding.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(","))
}
