//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while resolving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("missing required setting {key}")]
    Missing {
        /// Environment key that was expected.
        key: String,
    },

    /// A setting was provided but could not be used.
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Environment key holding the bad value.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The same product was listed more than once.
    #[error("product '{name}' listed more than once")]
    DuplicateProduct {
        /// The repeated product name.
        name: String,
    },

    /// An override could not be parsed.
    #[error("invalid override '{raw}': expected KEY=VALUE")]
    InvalidOverride {
        /// The raw override text.
        raw: String,
    },

    /// Reading an env file failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
