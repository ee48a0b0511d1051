//! Integration tests against a live PostgreSQL server with pgvector installed.
//! Run with: DB_HOST=... DB_PORT=... DB_USER=... DB_PASSWORD=... \
//!   cargo test -p vecdb-setup-storage -- --ignored pg_
//!
//! `DB_NAME` is ignored: every test provisions and drops its own database.

#![allow(clippy::unwrap_used, reason = "integration test code")]

use uuid::Uuid;
use vecdb_setup_core::{DbConfig, EmbeddingTarget};
use vecdb_setup_storage::{
    ensure_database, ensure_vector_extension, quote_identifier, ConnectTarget, ConnectionProvider,
    DatabaseStatus, EmbeddingStore, IsolationMode, PgEmbeddingStore, ScriptRunner, StorageError,
};

/// Mixed case and a space, so every statement has to quote the name.
fn unique_database() -> String {
    format!("Vecdb Setup Test {}", Uuid::new_v4().simple())
}

fn test_provider() -> ConnectionProvider {
    let database = unique_database();
    let config = DbConfig::from_lookup(|key| match key {
        "DB_NAME" => Some(database.clone()),
        other => std::env::var(other).ok(),
    })
    .expect("DB_HOST, DB_PORT, DB_USER and DB_PASSWORD must be set for integration tests");
    ConnectionProvider::new(config)
}

async fn drop_database(provider: &ConnectionProvider) {
    let name = provider.database_name(ConnectTarget::Application);
    let mut handle =
        provider.open(ConnectTarget::Administrative, IsolationMode::AutoCommit).await.unwrap();
    handle
        .execute(&format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", quote_identifier(name)))
        .await
        .unwrap();
    handle.close().await.unwrap();
}

async fn scalar_i64(provider: &ConnectionProvider, target: ConnectTarget, sql: &str) -> i64 {
    let mut handle = provider.open(target, IsolationMode::AutoCommit).await.unwrap();
    let value: i64 =
        sqlx::query_scalar(sql).fetch_one(handle.autocommit_conn().unwrap()).await.unwrap();
    handle.close().await.unwrap();
    value
}

#[tokio::test]
#[ignore]
async fn pg_ensure_database_is_idempotent() {
    let provider = test_provider();

    assert_eq!(ensure_database(&provider).await.unwrap(), DatabaseStatus::Created);
    assert_eq!(ensure_database(&provider).await.unwrap(), DatabaseStatus::AlreadyExists);

    let name = provider.database_name(ConnectTarget::Application).replace('\'', "''");
    let count = scalar_i64(
        &provider,
        ConnectTarget::Administrative,
        &format!("SELECT COUNT(*) FROM pg_database WHERE datname = '{name}'"),
    )
    .await;
    assert_eq!(count, 1);

    drop_database(&provider).await;
}

#[tokio::test]
#[ignore]
async fn pg_enable_extension_is_idempotent() {
    let provider = test_provider();
    ensure_database(&provider).await.unwrap();

    let first = ensure_vector_extension(&provider).await.unwrap();
    assert!(first.server_version.is_some(), "SHOW server_version needs no privileges");
    ensure_vector_extension(&provider).await.unwrap();

    let count = scalar_i64(
        &provider,
        ConnectTarget::Application,
        "SELECT COUNT(*) FROM pg_extension WHERE extname = 'vector'",
    )
    .await;
    assert_eq!(count, 1);

    drop_database(&provider).await;
}

#[tokio::test]
#[ignore]
async fn pg_failing_statement_rolls_back_whole_script() {
    let provider = test_provider();
    ensure_database(&provider).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("schema.sql"),
        "CREATE TABLE partial (id INT);\nINSERT INTO partial VALUES (1);\nINSERT INTO missing_table VALUES (1);\n",
    )
    .unwrap();
    let runner = ScriptRunner::new(provider.clone(), dir.path());

    let err = runner.run_script_file("schema.sql").await.unwrap_err();
    match err {
        StorageError::Statement { script, index, .. } => {
            assert_eq!(script, "schema.sql");
            assert_eq!(index, 3);
        },
        other => panic!("unexpected error: {other}"),
    }

    let leaked = scalar_i64(
        &provider,
        ConnectTarget::Application,
        "SELECT COUNT(*) FROM pg_class WHERE relname = 'partial'",
    )
    .await;
    assert_eq!(leaked, 0, "statements before the failure must be rolled back");

    drop_database(&provider).await;
}

#[tokio::test]
#[ignore]
async fn pg_schema_seed_and_embeddings() {
    let provider = test_provider();
    ensure_database(&provider).await.unwrap();
    ensure_vector_extension(&provider).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("schema.sql"),
        "CREATE TABLE documents (id SERIAL PRIMARY KEY, title TEXT, content TEXT, embedding vector(3));",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("seed_data.sql"),
        "INSERT INTO documents (title, content) VALUES ('one', 'a; b');\n\
         INSERT INTO documents (title, content) VALUES ('two', $$c; d$$);\n\
         INSERT INTO documents (title, content) VALUES ('three', NULL);\n",
    )
    .unwrap();
    let runner = ScriptRunner::new(provider.clone(), dir.path());

    assert_eq!(runner.run_script_file("schema.sql").await.unwrap().statements, 1);
    assert_eq!(runner.run_script_file("seed_data.sql").await.unwrap().statements, 3);

    let target = EmbeddingTarget {
        table: "documents".into(),
        text_columns: vec!["title".into(), "content".into()],
    };
    let mut store = PgEmbeddingStore::open(&provider).await.unwrap();
    let pending = store.rows_missing_embeddings(&target, 10).await.unwrap();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[0].content, "one a; b");
    assert_eq!(pending[2].content, "three");

    for row in &pending {
        store.store_embedding(&target, &row.id, &[0.1, 0.2, 0.3]).await.unwrap();
    }
    let remaining = store.rows_missing_embeddings(&target, 10).await.unwrap();
    store.close().await;
    assert!(remaining.is_empty());

    drop_database(&provider).await;
}

#[test]
fn unique_database_names_are_valid_and_distinct() {
    let first = unique_database();
    let second = unique_database();
    assert_ne!(first, second);
    assert!(first.len() <= vecdb_setup_core::MAX_IDENTIFIER_LEN, "{first} is too long");
    assert!(first.contains(' ') && first.chars().any(char::is_uppercase));
}
