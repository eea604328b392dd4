//! Manifest error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for manifest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Manifest error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Key material or token handling failed.
    #[error(transparent)]
    Keys(#[from] werk_jwt::Error),

    /// Filesystem operation failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Manifest could not be serialized.
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The product is not part of the configuration.
    #[error("product '{name}' is not configured")]
    UnknownProduct {
        /// The requested product.
        name: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_product_display() {
        let err = Error::UnknownProduct {
            name: "widget".to_string(),
        };
        assert_eq!(err.to_string(), "product 'widget' is not configured");
    }

    #[test]
    fn key_errors_are_transparent() {
        let err = Error::from(werk_jwt::Error::TokenExpired);
        assert_eq!(err.to_string(), "token expired");
    }
}
