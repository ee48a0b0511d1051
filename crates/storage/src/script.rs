//! SQL scripts loaded from the scripts directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::sql_split::split_statements;

/// The ordered statements of one `.sql` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlScript {
    name: String,
    path: PathBuf,
    statements: Vec<String>,
}

impl SqlScript {
    /// Split already-read `source` text.
    #[must_use]
    pub fn parse(name: &str, path: PathBuf, source: &str) -> Self {
        let statements = split_statements(source).into_iter().map(str::to_owned).collect();
        Self { name: name.to_owned(), path, statements }
    }

    /// Read `dir/name` as UTF-8 and split it.
    ///
    /// # Errors
    /// `StorageError::ScriptNotFound` if the file does not exist,
    /// `StorageError::ScriptRead` if it cannot be read as UTF-8.
    pub async fn load(dir: &Path, name: &str) -> Result<Self, StorageError> {
        let path = dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(source) => Ok(Self::parse(name, path, &source)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::ScriptNotFound { path })
            },
            Err(source) => Err(StorageError::ScriptRead { path, source }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
