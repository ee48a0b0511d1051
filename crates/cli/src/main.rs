use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vecdb_setup_core::{
    DbConfig, EmbeddingConfig, SetupConfig, DB_HOST, DB_NAME, DB_PASSWORD, DB_PORT, DB_USER,
};
use vecdb_setup_service::{run_reported, PgStepExecutor, ProvisioningPipeline, SetupError};

/// Flags override the matching environment variables. Embedding settings
/// come from `EMBEDDING_*` variables only.
#[derive(Parser)]
#[command(name = "vecdb-setup")]
#[command(about = "Provision a PostgreSQL database with pgvector, schema, seed data and embeddings", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, env = DB_HOST)]
    db_host: Option<String>,
    #[arg(long, env = DB_PORT)]
    db_port: Option<String>,
    #[arg(long, env = DB_USER)]
    db_user: Option<String>,
    #[arg(long, env = DB_PASSWORD, hide_env_values = true)]
    db_password: Option<String>,
    #[arg(long, env = DB_NAME)]
    db_name: Option<String>,
}

impl Cli {
    fn lookup(&self, key: &'static str) -> Option<String> {
        match key {
            DB_HOST => self.db_host.clone(),
            DB_PORT => self.db_port.clone(),
            DB_USER => self.db_user.clone(),
            DB_PASSWORD => self.db_password.clone(),
            DB_NAME => self.db_name.clone(),
            _ => None,
        }
    }

    fn setup_config(&self) -> Result<SetupConfig, SetupError> {
        let db = DbConfig::from_lookup(|key| self.lookup(key))?;
        let embedding = EmbeddingConfig::from_env()?;
        Ok(SetupConfig::new(db, embedding))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let outcome = run_reported(|| {
        let config = cli.setup_config()?;
        let executor = PgStepExecutor::from_config(&config)?;
        Ok(ProvisioningPipeline::new(config, executor))
    })
    .await;

    Ok(match outcome {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    })
}
