//! Setup configuration: database connection settings, embedding service
//! settings and the scripts directory.
//!
//! Everything here is validated before the pipeline performs any side effect.

use std::fmt;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_EMBEDDING_API_URL, DEFAULT_EMBEDDING_BATCH_SIZE, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_TARGETS, MAX_IDENTIFIER_LEN, SCRIPTS_DIR,
};
use crate::env_config::{env_non_blank, env_parse_with_default};
use crate::error::ConfigError;

pub const DB_HOST: &str = "DB_HOST";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASSWORD: &str = "DB_PASSWORD";
pub const DB_NAME: &str = "DB_NAME";

pub const EMBEDDING_API_URL: &str = "EMBEDDING_API_URL";
pub const EMBEDDING_API_KEY: &str = "EMBEDDING_API_KEY";
pub const EMBEDDING_MODEL: &str = "EMBEDDING_MODEL";
pub const EMBEDDING_DIMENSION: &str = "EMBEDDING_DIMENSION";
pub const EMBEDDING_BATCH_SIZE: &str = "EMBEDDING_BATCH_SIZE";
pub const EMBEDDING_TARGETS: &str = "EMBEDDING_TARGETS";

/// pgvector refuses `vector(n)` columns wider than this.
const MAX_VECTOR_DIMENSION: usize = 16_000;

/// Connection settings for the PostgreSQL server and the application database.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    /// Build from `DB_*` environment variables.
    ///
    /// # Errors
    /// Returns `ConfigError` if a variable is missing, blank or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_non_blank)
    }

    /// Build from an arbitrary key lookup (CLI flags layered over env, tests).
    ///
    /// Blank values count as missing.
    ///
    /// # Errors
    /// Returns `ConfigError` if a key is missing, blank or malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let port_raw = required(DB_PORT)?;
        let port = port_raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
            key: DB_PORT,
            reason: format!("{port_raw:?} is not a port number: {e}"),
        })?;

        // Passwords may legitimately carry surrounding whitespace.
        let password = lookup(DB_PASSWORD)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(DB_PASSWORD))?;

        let config = Self {
            host: required(DB_HOST)?,
            port,
            user: required(DB_USER)?,
            password,
            database: required(DB_NAME)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field. Called again by the pipeline before its first step.
    ///
    /// # Errors
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing(DB_HOST));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid { key: DB_PORT, reason: "port must be non-zero".into() });
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::Missing(DB_USER));
        }
        if self.password.is_empty() {
            return Err(ConfigError::Missing(DB_PASSWORD));
        }
        validate_identifier(DB_NAME, &self.database)?;
        Ok(())
    }

    /// `user@host:port/database`, safe for logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

/// A table whose rows get an embedding computed from the listed text columns.
///
/// Rows are keyed by `id` and the vector lands in the `embedding` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingTarget {
    pub table: String,
    pub text_columns: Vec<String>,
}

impl EmbeddingTarget {
    /// Parse a comma-separated list of `table.col[+col...]` entries.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` on an empty list or a malformed entry.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, ConfigError> {
        let targets = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Self::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if targets.is_empty() {
            return Err(ConfigError::Invalid {
                key: EMBEDDING_TARGETS,
                reason: "at least one table.column entry is required".into(),
            });
        }
        Ok(targets)
    }

    fn parse(entry: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { key: EMBEDDING_TARGETS, reason };
        let (table, columns) = entry
            .split_once('.')
            .ok_or_else(|| invalid(format!("{entry:?} is not of the form table.column")))?;
        let text_columns: Vec<String> =
            columns.split('+').map(|c| c.trim().to_owned()).collect();
        let target = Self { table: table.trim().to_owned(), text_columns };
        target.validate()?;
        Ok(target)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_identifier(EMBEDDING_TARGETS, &self.table)?;
        if self.text_columns.is_empty() {
            return Err(ConfigError::Invalid {
                key: EMBEDDING_TARGETS,
                reason: format!("table {:?} has no text columns", self.table),
            });
        }
        for column in &self.text_columns {
            validate_identifier(EMBEDDING_TARGETS, column)?;
        }
        Ok(())
    }
}

/// Settings for the external embedding model service.
#[derive(Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    pub targets: Vec<EmbeddingTarget>,
}

impl EmbeddingConfig {
    /// Build from `EMBEDDING_*` environment variables, falling back to defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if `EMBEDDING_TARGETS` cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let targets = EmbeddingTarget::parse_list(
            &env_non_blank(EMBEDDING_TARGETS).unwrap_or_else(|| DEFAULT_EMBEDDING_TARGETS.into()),
        )?;
        Ok(Self {
            api_url: env_non_blank(EMBEDDING_API_URL)
                .unwrap_or_else(|| DEFAULT_EMBEDDING_API_URL.into()),
            api_key: env_non_blank(EMBEDDING_API_KEY),
            model: env_non_blank(EMBEDDING_MODEL).unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            dimension: env_parse_with_default(EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_DIMENSION),
            batch_size: env_parse_with_default(EMBEDDING_BATCH_SIZE, DEFAULT_EMBEDDING_BATCH_SIZE),
            targets,
        })
    }

    /// # Errors
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: EMBEDDING_API_URL,
                reason: format!("{:?} is not an http(s) URL", self.api_url),
            });
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Missing(EMBEDDING_MODEL));
        }
        if self.dimension == 0 || self.dimension > MAX_VECTOR_DIMENSION {
            return Err(ConfigError::Invalid {
                key: EMBEDDING_DIMENSION,
                reason: format!("must be between 1 and {MAX_VECTOR_DIMENSION}"),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: EMBEDDING_BATCH_SIZE,
                reason: "must be greater than zero".into(),
            });
        }
        if self.targets.is_empty() {
            return Err(ConfigError::Missing(EMBEDDING_TARGETS));
        }
        self.targets.iter().try_for_each(EmbeddingTarget::validate)
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_EMBEDDING_API_URL.to_owned(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.to_owned(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
            targets: vec![EmbeddingTarget {
                table: "documents".to_owned(),
                text_columns: vec!["title".to_owned(), "content".to_owned()],
            }],
        }
    }
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("batch_size", &self.batch_size)
            .field("targets", &self.targets)
            .finish()
    }
}

/// Everything one provisioning run needs.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    pub db: DbConfig,
    pub embedding: EmbeddingConfig,
    pub scripts_dir: PathBuf,
}

impl SetupConfig {
    #[must_use]
    pub fn new(db: DbConfig, embedding: EmbeddingConfig) -> Self {
        Self { db, embedding, scripts_dir: PathBuf::from(SCRIPTS_DIR) }
    }

    #[must_use]
    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }

    /// # Errors
    /// Returns the first `ConfigError` found in the database or embedding settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.db.validate()?;
        self.embedding.validate()
    }
}

fn validate_identifier(key: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Missing(key));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("{name:?} exceeds {MAX_IDENTIFIER_LEN} bytes"),
        });
    }
    if name.contains('\0') {
        return Err(ConfigError::Invalid { key, reason: "contains a NUL byte".into() });
    }
    Ok(())
}
