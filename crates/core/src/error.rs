use thiserror::Error;

/// Configuration could not be loaded or failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    /// Name of the offending setting.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Missing(key) | Self::Invalid { key, .. } => key,
        }
    }
}
