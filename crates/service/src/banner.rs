//! Run banners and the top-level reporting driver.

use vecdb_setup_core::BANNER_WIDTH;

use crate::error::error_chain;
use crate::pipeline::{PipelineReport, ProvisioningPipeline, StepExecutor};
use crate::SetupError;

pub const STARTED_TITLE: &str = "DATABASE SETUP STARTED";
pub const COMPLETE_TITLE: &str = "DATABASE SETUP COMPLETE!";
pub const FAILED_TITLE: &str = "SETUP FAILED";

fn rule() -> String {
    "=".repeat(BANNER_WIDTH)
}

pub fn log_started_banner() {
    let rule = rule();
    tracing::info!("{rule}");
    tracing::info!("{STARTED_TITLE}");
    tracing::info!("{rule}");
}

pub fn log_completion_banner() {
    let rule = rule();
    tracing::info!("{rule}");
    tracing::info!("{COMPLETE_TITLE}");
    tracing::info!("{rule}");
}

pub fn log_failure_banner(err: &SetupError) {
    let rule = rule();
    tracing::error!("{rule}");
    tracing::error!("{FAILED_TITLE}");
    tracing::error!("{rule}");
    tracing::error!(kind = %err.kind(), "Error during database setup: {}", error_chain(err));
}

/// Run one provisioning pipeline between banners.
///
/// `prepare` builds the pipeline after the start banner, so wiring failures
/// are bannered like step failures. Exactly one of the completion or failure
/// banner is logged.
pub async fn run_reported<X, F>(prepare: F) -> Result<PipelineReport, SetupError>
where
    X: StepExecutor,
    F: FnOnce() -> Result<ProvisioningPipeline<X>, SetupError>,
{
    log_started_banner();
    let outcome = match prepare() {
        Ok(pipeline) => pipeline.run().await,
        Err(err) => Err(err),
    };
    match &outcome {
        Ok(_) => log_completion_banner(),
        Err(err) => log_failure_banner(err),
    }
    outcome
}


#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use vecdb_setup_core::{DbConfig, EmbeddingConfig, SetupConfig, SCHEMA_SCRIPT, SEED_SCRIPT};
    use vecdb_setup_storage::{DatabaseStatus, ExtensionReport, ScriptReport, SqlScript};

    use super::capture::CapturedLogs;
    use super::*;
    use crate::embedding_service::{EmbeddingReport, TableEmbeddings};
    use crate::pipeline::{SetupStep, StepOutcome};
    use crate::ErrorKind;

    fn config(scripts_dir: PathBuf) -> SetupConfig {
        SetupConfig::new(
            DbConfig {
                host: "localhost".into(),
                port: 5432,
                user: "app".into(),
                password: "secret".into(),
                database: "vectors".into(),
            },
            EmbeddingConfig::default(),
        )
        .with_scripts_dir(scripts_dir)
    }

    /// Records every step it is asked to run. Scripts are parsed from the
    /// real scripts directory; nothing touches a database.
    struct SpyExecutor {
        scripts_dir: PathBuf,
        fail_at: Option<SetupStep>,
        embedded: usize,
        calls: Arc<Mutex<Vec<SetupStep>>>,
    }

    impl SpyExecutor {
        fn new(scripts_dir: PathBuf) -> Self {
            Self { scripts_dir, fail_at: None, embedded: 3, calls: Arc::default() }
        }

        fn calls(&self) -> Vec<SetupStep> {
            self.calls.lock().unwrap().clone()
        }

        async fn script(&self, name: &str) -> Result<StepOutcome, SetupError> {
            let script = SqlScript::load(&self.scripts_dir, name).await?;
            Ok(StepOutcome::Script(ScriptReport {
                script: script.name().to_owned(),
                statements: script.len(),
            }))
        }
    }

    #[async_trait]
    impl StepExecutor for SpyExecutor {
        async fn execute(&self, step: SetupStep) -> Result<StepOutcome, SetupError> {
            self.calls.lock().unwrap().push(step);
            if self.fail_at == Some(step) {
                return Err(vecdb_setup_storage::StorageError::Statement {
                    script: SCHEMA_SCRIPT.into(),
                    index: 2,
                    source: vecdb_setup_storage::SqlxError::Protocol("syntax error".into()),
                }
                .into());
            }
            match step {
                SetupStep::CreateDatabase => Ok(StepOutcome::Database(DatabaseStatus::Created)),
                SetupStep::EnableExtension => Ok(StepOutcome::Extension(ExtensionReport::default())),
                SetupStep::ApplySchema => self.script(SCHEMA_SCRIPT).await,
                SetupStep::SeedData => self.script(SEED_SCRIPT).await,
                SetupStep::PopulateEmbeddings => Ok(StepOutcome::Embeddings(EmbeddingReport {
                    tables: vec![TableEmbeddings { table: "documents".into(), populated: self.embedded }],
                })),
            }
        }
    }

    fn write_scripts(dir: &std::path::Path, with_seed: bool) {
        std::fs::write(
            dir.join(SCHEMA_SCRIPT),
            "CREATE TABLE documents (id serial PRIMARY KEY, title text, content text, embedding vector(1536));",
        )
        .unwrap();
        if with_seed {
            std::fs::write(
                dir.join(SEED_SCRIPT),
                "INSERT INTO documents (title, content) VALUES ('a', 'x; y');\n\
                 INSERT INTO documents (title, content) VALUES ('b', 'z');\n\
                 INSERT INTO documents (title, content) VALUES ('c', 'w');\n",
            )
            .unwrap();
        }
    }

    fn pipeline(executor: SpyExecutor, config: SetupConfig) -> ProvisioningPipeline<SpyExecutor> {
        ProvisioningPipeline::new(config, executor)
    }

    #[tokio::test]
    async fn end_to_end_completes_with_one_completion_banner() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let dir = tempfile::tempdir().unwrap();
        write_scripts(dir.path(), true);
        let cfg = config(dir.path().to_path_buf());

        let report = run_reported(|| Ok(pipeline(SpyExecutor::new(dir.path().to_path_buf()), cfg)))
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(
            report.outcome(SetupStep::ApplySchema),
            Some(&StepOutcome::Script(ScriptReport { script: SCHEMA_SCRIPT.into(), statements: 1 }))
        );
        assert_eq!(
            report.outcome(SetupStep::SeedData),
            Some(&StepOutcome::Script(ScriptReport { script: SEED_SCRIPT.into(), statements: 3 }))
        );
        match report.outcome(SetupStep::PopulateEmbeddings) {
            Some(StepOutcome::Embeddings(embeddings)) => assert_eq!(embeddings.total(), 3),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(logs.count(STARTED_TITLE), 1);
        assert_eq!(logs.count(COMPLETE_TITLE), 1);
        assert_eq!(logs.count(FAILED_TITLE), 0);
        assert_eq!(logs.count("Configuration validated successfully"), 1);
    }

    #[tokio::test]
    async fn missing_seed_file_stops_before_embeddings() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let dir = tempfile::tempdir().unwrap();
        write_scripts(dir.path(), false);
        let executor = SpyExecutor::new(dir.path().to_path_buf());
        let calls = Arc::clone(&executor.calls);
        let cfg = config(dir.path().to_path_buf());

        let err = run_reported(|| Ok(pipeline(executor, cfg))).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ScriptFileNotFound);
        let calls = calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                SetupStep::CreateDatabase,
                SetupStep::EnableExtension,
                SetupStep::ApplySchema,
                SetupStep::SeedData
            ]
        );
        assert!(!calls.contains(&SetupStep::PopulateEmbeddings));
        assert_eq!(logs.count(STARTED_TITLE), 1);
        assert_eq!(logs.count(FAILED_TITLE), 1);
        assert_eq!(logs.count(COMPLETE_TITLE), 0);
    }

    #[tokio::test]
    async fn failing_step_short_circuits_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        write_scripts(dir.path(), true);
        let mut executor = SpyExecutor::new(dir.path().to_path_buf());
        executor.fail_at = Some(SetupStep::ApplySchema);
        let pipeline = pipeline(executor, config(dir.path().to_path_buf()));

        let err = pipeline.run().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SqlExecution);
        assert_eq!(
            pipeline.executor().calls(),
            vec![SetupStep::CreateDatabase, SetupStep::EnableExtension, SetupStep::ApplySchema]
        );
    }

    #[tokio::test]
    async fn invalid_configuration_runs_no_step() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path().to_path_buf());
        cfg.db.port = 0;
        let executor = SpyExecutor::new(dir.path().to_path_buf());
        let calls = Arc::clone(&executor.calls);

        let err = run_reported(|| Ok(pipeline(executor, cfg))).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigurationInvalid);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(logs.count(FAILED_TITLE), 1);
        assert_eq!(logs.count(COMPLETE_TITLE), 0);
        assert!(!logs.lines().iter().any(|l| l.starts_with("Step ")));
    }

    #[tokio::test]
    async fn wiring_failure_is_bannered() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let err = run_reported::<SpyExecutor, _>(|| {
            Err(vecdb_setup_embeddings::EmbeddingError::ClientInit("no TLS backend".into()).into())
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmbeddingService);
        assert_eq!(logs.count(STARTED_TITLE), 1);
        assert_eq!(logs.count(FAILED_TITLE), 1);
        assert_eq!(logs.count(&"=".repeat(BANNER_WIDTH)), 4);
    }
}
