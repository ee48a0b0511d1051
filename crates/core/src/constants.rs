//! Shared constants for vecdb-setup.
//!
//! Centralizes names and defaults used by more than one crate.

/// Database that always exists on a PostgreSQL server; used for `CREATE DATABASE`.
pub const ADMIN_DATABASE: &str = "postgres";

/// PostgreSQL identifiers longer than this are silently truncated by the server.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Name of the pgvector extension.
pub const VECTOR_EXTENSION: &str = "vector";

/// Directory (relative to the working directory) holding the SQL scripts.
pub const SCRIPTS_DIR: &str = "database";

/// Schema script, applied after the extension is enabled.
pub const SCHEMA_SCRIPT: &str = "schema.sql";

/// Seed-data script, applied after the schema.
pub const SEED_SCRIPT: &str = "seed_data.sql";

/// Default base URL of the OpenAI-compatible embeddings API.
pub const DEFAULT_EMBEDDING_API_URL: &str = "https://api.openai.com";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Embedding vector dimension of the default model; must match `vector(n)` in the schema.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Rows fetched per round trip while populating embeddings.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;

/// Tables and text columns embedded when `EMBEDDING_TARGETS` is not set.
pub const DEFAULT_EMBEDDING_TARGETS: &str = "documents.title+content";

/// Primary key column expected on every embedding target table.
pub const EMBEDDING_ID_COLUMN: &str = "id";

/// Vector column expected on every embedding target table.
pub const EMBEDDING_COLUMN: &str = "embedding";

/// Width of the `=` rule framing the setup banners.
pub const BANNER_WIDTH: usize = 50;
