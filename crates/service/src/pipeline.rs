//! The provisioning pipeline.
//!
//! ```text
//! CreateDatabase -> EnableExtension -> ApplySchema -> SeedData -> PopulateEmbeddings -> Done
//! ```
//!
//! Steps run strictly in order and none can be skipped. The first failing
//! step ends the run and its error is returned as-is. A run keeps no state:
//! re-running starts from `CreateDatabase` again, which is safe for the first
//! three steps only. Seed data is inserted again on every run.

use std::fmt;

use async_trait::async_trait;
use vecdb_setup_core::{SetupConfig, SCHEMA_SCRIPT, SEED_SCRIPT};
use vecdb_setup_embeddings::HttpEmbeddingProvider;
use vecdb_setup_storage::{
    ensure_database, ensure_vector_extension, ConnectionProvider, DatabaseStatus, ExtensionReport,
    ScriptReport, ScriptRunner,
};

use crate::embedding_service::{EmbeddingPopulation, EmbeddingReport, EmbeddingService};
use crate::error::error_chain;
use crate::SetupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    CreateDatabase,
    EnableExtension,
    ApplySchema,
    SeedData,
    PopulateEmbeddings,
}

impl SetupStep {
    pub const ALL: [Self; 5] = [
        Self::CreateDatabase,
        Self::EnableExtension,
        Self::ApplySchema,
        Self::SeedData,
        Self::PopulateEmbeddings,
    ];

    #[must_use]
    pub const fn first() -> Self {
        Self::CreateDatabase
    }

    /// The following step, or `None` once the pipeline is done.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::CreateDatabase => Some(Self::EnableExtension),
            Self::EnableExtension => Some(Self::ApplySchema),
            Self::ApplySchema => Some(Self::SeedData),
            Self::SeedData => Some(Self::PopulateEmbeddings),
            Self::PopulateEmbeddings => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateDatabase => "create-database",
            Self::EnableExtension => "enable-extension",
            Self::ApplySchema => "apply-schema",
            Self::SeedData => "seed-data",
            Self::PopulateEmbeddings => "populate-embeddings",
        }
    }

    /// Log line announcing the step.
    #[must_use]
    pub const fn announcement(self) -> &'static str {
        match self {
            Self::CreateDatabase => "Setting up database...",
            Self::EnableExtension => "Ensuring pgvector extension exists...",
            Self::ApplySchema => "Creating database schema...",
            Self::SeedData => "Inserting sample data...",
            Self::PopulateEmbeddings => "Generating AI embeddings...",
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Database(DatabaseStatus),
    Extension(ExtensionReport),
    Script(ScriptReport),
    Embeddings(EmbeddingReport),
}

/// Performs one pipeline step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: SetupStep) -> Result<StepOutcome, SetupError>;
}

/// Steps against a live PostgreSQL server. Each opens and closes its own
/// connection.
#[derive(Debug)]
pub struct PgStepExecutor<E> {
    connections: ConnectionProvider,
    scripts: ScriptRunner,
    embeddings: E,
}

impl PgStepExecutor<EmbeddingService<HttpEmbeddingProvider>> {
    /// Wire the executor from configuration. Performs no I/O.
    ///
    /// # Errors
    /// `SetupError::Embedding` if the HTTP client cannot be built.
    pub fn from_config(config: &SetupConfig) -> Result<Self, SetupError> {
        let connections = ConnectionProvider::new(config.db.clone());
        let embedder = HttpEmbeddingProvider::new(&config.embedding)?;
        let embeddings = EmbeddingService::new(connections.clone(), embedder, &config.embedding);
        Ok(Self::new(connections, &config.scripts_dir, embeddings))
    }
}

impl<E: EmbeddingPopulation> PgStepExecutor<E> {
    #[must_use]
    pub fn new(
        connections: ConnectionProvider,
        scripts_dir: &std::path::Path,
        embeddings: E,
    ) -> Self {
        let scripts = ScriptRunner::new(connections.clone(), scripts_dir);
        Self { connections, scripts, embeddings }
    }
}

#[async_trait]
impl<E: EmbeddingPopulation> StepExecutor for PgStepExecutor<E> {
    async fn execute(&self, step: SetupStep) -> Result<StepOutcome, SetupError> {
        Ok(match step {
            SetupStep::CreateDatabase => StepOutcome::Database(ensure_database(&self.connections).await?),
            SetupStep::EnableExtension => {
                StepOutcome::Extension(ensure_vector_extension(&self.connections).await?)
            },
            SetupStep::ApplySchema => StepOutcome::Script(self.scripts.run_script_file(SCHEMA_SCRIPT).await?),
            SetupStep::SeedData => StepOutcome::Script(self.scripts.run_script_file(SEED_SCRIPT).await?),
            SetupStep::PopulateEmbeddings => {
                StepOutcome::Embeddings(self.embeddings.populate_all_embeddings().await?)
            },
        })
    }
}

/// Outcomes of the steps that completed, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub steps: Vec<(SetupStep, StepOutcome)>,
}

impl PipelineReport {
    #[must_use]
    pub fn outcome(&self, step: SetupStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, outcome)| outcome)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.steps.iter().map(|(s, _)| *s).eq(SetupStep::ALL)
    }
}

/// One single-use provisioning run.
pub struct ProvisioningPipeline<X> {
    config: SetupConfig,
    executor: X,
}

impl<X: StepExecutor> ProvisioningPipeline<X> {
    #[must_use]
    pub fn new(config: SetupConfig, executor: X) -> Self {
        Self { config, executor }
    }

    #[must_use]
    pub fn config(&self) -> &SetupConfig {
        &self.config
    }

    #[must_use]
    pub fn executor(&self) -> &X {
        &self.executor
    }

    /// Validate configuration, then run every step in order.
    ///
    /// # Errors
    /// `SetupError::Config` before any step runs, otherwise the first step
    /// error, unchanged.
    pub async fn run(&self) -> Result<PipelineReport, SetupError> {
        if let Err(err) = self.config.validate() {
            tracing::error!(error = %err, "Configuration invalid, nothing was changed");
            return Err(err.into());
        }
        tracing::info!(target_db = %self.config.db.redacted(), "Configuration validated successfully");

        let mut report = PipelineReport::default();
        let mut state = Some(SetupStep::first());
        while let Some(step) = state {
            tracing::info!(step = %step, "{}", step.announcement());
            match self.executor.execute(step).await {
                Ok(outcome) => {
                    tracing::info!(step = %step, "Step {step} succeeded");
                    report.steps.push((step, outcome));
                    state = step.next();
                },
                Err(err) => {
                    tracing::error!(
                        step = %step,
                        kind = %err.kind(),
                        error = %error_chain(&err),
                        "Step {step} failed"
                    );
                    return Err(err);
                },
            }
        }
        Ok(report)
    }
}
