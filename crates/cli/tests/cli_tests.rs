use assert_cmd::Command;
use predicates::prelude::*;

const DB_VARS: [&str; 5] = ["DB_HOST", "DB_PORT", "DB_USER", "DB_PASSWORD", "DB_NAME"];

fn bare_command() -> Command {
    let mut cmd = Command::cargo_bin("vecdb-setup").unwrap();
    for var in DB_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_cli_help() {
    bare_command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Provision a PostgreSQL database with pgvector"))
        .stdout(predicate::str::contains("--db-host"));
}

#[test]
fn test_missing_configuration_fails_with_banner() {
    bare_command()
        .assert()
        .failure()
        .stdout(predicate::str::contains("DATABASE SETUP STARTED"))
        .stdout(predicate::str::contains("SETUP FAILED"))
        .stdout(predicate::str::contains("DB_PORT"))
        .stdout(predicate::str::contains("DATABASE SETUP COMPLETE!").not());
}

#[test]
fn test_invalid_port_fails_before_connecting() {
    bare_command()
        .args(["--db-host", "localhost", "--db-port", "not-a-port"])
        .args(["--db-user", "app", "--db-password", "secret", "--db-name", "vectors"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("SETUP FAILED"))
        .stdout(predicate::str::contains("not a port number"))
        .stdout(predicate::str::contains("Setting up database").not());
}

/// Needs a PostgreSQL server with pgvector, reached through the `DB_*`
/// variables (`DB_NAME` is replaced). The embedding service is mocked.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn test_live_setup_exits_zero_with_completion_banner() {
    use std::path::Path;

    use assert_cmd::assert::OutputAssertExt;
    use uuid::Uuid;
    use vecdb_setup_core::{DbConfig, DEFAULT_EMBEDDING_DIMENSION};
    use vecdb_setup_storage::{quote_identifier, ConnectTarget, ConnectionProvider, IsolationMode};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    let embedding = vec![0.01_f32; DEFAULT_EMBEDDING_DIMENSION];
    let data: Vec<_> = (0..3)
        .map(|index| serde_json::json!({ "index": index, "embedding": embedding }))
        .collect();
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data })))
        .expect(1)
        .mount(&server)
        .await;

    let database = format!("vecdb_setup_cli_{}", Uuid::new_v4().simple());
    let workspace_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let output = Command::cargo_bin("vecdb-setup")
        .unwrap()
        .current_dir(&workspace_root)
        .env("DB_NAME", &database)
        .env("EMBEDDING_API_URL", server.uri())
        .env("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION.to_string())
        .env("EMBEDDING_BATCH_SIZE", "64")
        .env_remove("EMBEDDING_API_KEY")
        .env_remove("EMBEDDING_MODEL")
        .env_remove("EMBEDDING_TARGETS")
        .output()
        .unwrap();

    let config = DbConfig::from_lookup(|key| match key {
        "DB_NAME" => Some(database.clone()),
        other => std::env::var(other).ok(),
    })
    .unwrap();
    let mut admin = ConnectionProvider::new(config)
        .open(ConnectTarget::Administrative, IsolationMode::AutoCommit)
        .await
        .unwrap();
    admin
        .execute(&format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", quote_identifier(&database)))
        .await
        .unwrap();
    admin.close().await.unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    output.assert().success().stdout(predicate::str::contains("SETUP FAILED").not());
    assert_eq!(stdout.matches("DATABASE SETUP COMPLETE!").count(), 1);
    assert!(stdout.contains("Generated embeddings for 3 rows of documents"), "{stdout}");
}
