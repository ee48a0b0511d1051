//! Embedding population: fill every NULL embedding of the configured tables.

use async_trait::async_trait;
use vecdb_setup_core::{EmbeddingConfig, EmbeddingTarget};
use vecdb_setup_embeddings::{EmbeddingError, EmbeddingProvider};
use vecdb_setup_storage::{ConnectionProvider, EmbeddingStore, PgEmbeddingStore};

use crate::SetupError;

/// Embeddings written for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEmbeddings {
    pub table: String,
    pub populated: usize,
}

/// Outcome of one population run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddingReport {
    pub tables: Vec<TableEmbeddings>,
}

impl EmbeddingReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.tables.iter().map(|t| t.populated).sum()
    }
}

/// The pipeline's view of embedding population: one call, errors propagate.
#[async_trait]
pub trait EmbeddingPopulation: Send + Sync {
    async fn populate_all_embeddings(&self) -> Result<EmbeddingReport, SetupError>;
}

/// Scans target tables for rows without an embedding and fills them in
/// batches from an [`EmbeddingProvider`].
///
/// Not idempotent against duplicated seed rows: every row lacking a vector
/// is embedded, including duplicates.
#[derive(Debug)]
pub struct EmbeddingService<P> {
    connections: ConnectionProvider,
    embedder: P,
    targets: Vec<EmbeddingTarget>,
    batch_size: usize,
}

impl<P: EmbeddingProvider> EmbeddingService<P> {
    #[must_use]
    pub fn new(connections: ConnectionProvider, embedder: P, config: &EmbeddingConfig) -> Self {
        Self {
            connections,
            embedder,
            targets: config.targets.clone(),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Populate through an already-open `store`.
    ///
    /// # Errors
    /// The first storage or embedding failure; rows stored before it keep
    /// their vectors.
    pub async fn populate_with<S>(&self, store: &mut S) -> Result<EmbeddingReport, SetupError>
    where
        S: EmbeddingStore + ?Sized,
    {
        let mut report = EmbeddingReport::default();
        for target in &self.targets {
            let populated = self.populate_table(store, target).await?;
            tracing::info!(
                table = %target.table,
                populated,
                "Generated embeddings for {populated} rows of {}",
                target.table
            );
            report.tables.push(TableEmbeddings { table: target.table.clone(), populated });
        }
        Ok(report)
    }

    async fn populate_table<S>(
        &self,
        store: &mut S,
        target: &EmbeddingTarget,
    ) -> Result<usize, SetupError>
    where
        S: EmbeddingStore + ?Sized,
    {
        let dimension = self.embedder.dimension();
        let mut populated = 0usize;
        loop {
            let rows = store.rows_missing_embeddings(target, self.batch_size).await?;
            if rows.is_empty() {
                break;
            }

            let texts: Vec<String> = rows.iter().map(|r| r.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != rows.len() {
                return Err(EmbeddingError::CountMismatch {
                    requested: rows.len(),
                    returned: vectors.len(),
                }
                .into());
            }

            for (row, vector) in rows.iter().zip(&vectors) {
                if vector.len() != dimension {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: vector.len(),
                    }
                    .into());
                }
                store.store_embedding(target, &row.id, vector).await?;
            }

            populated += rows.len();
            tracing::debug!(table = %target.table, populated, "Embedded batch");
            if rows.len() < self.batch_size {
                break;
            }
        }
        Ok(populated)
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingPopulation for EmbeddingService<P> {
    async fn populate_all_embeddings(&self) -> Result<EmbeddingReport, SetupError> {
        let mut store = PgEmbeddingStore::open(&self.connections).await?;
        let outcome = self.populate_with(&mut store).await;
        store.close().await;
        outcome
    }
}
