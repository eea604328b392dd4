//! Error types for key material and token handling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing keys or tokens.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem operation on key material failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Keypair generation failed.
    #[error("key generation failed: {reason}")]
    KeyGeneration {
        /// The reason generation failed.
        reason: String,
    },

    /// A key file could not be parsed.
    #[error("invalid key {}: {reason}", path.display())]
    InvalidKey {
        /// The offending key file.
        path: PathBuf,
        /// The reason the key was rejected.
        reason: String,
    },

    /// The verification key directory holds no public keys.
    #[error("no public keys found in {}", dir.display())]
    NoPublicKeys {
        /// The directory that was searched.
        dir: PathBuf,
    },

    /// JWT token error.
    #[error("jwt error: {reason}")]
    JwtError {
        /// The reason the JWT operation failed.
        reason: String,
    },

    /// Token has expired.
    #[error("token expired")]
    TokenExpired,

    /// Invalid token.
    #[error("invalid token: {reason}")]
    InvalidToken {
        /// The reason the token is invalid.
        reason: String,
    },

    /// A blocking task did not complete.
    #[error("background task failed: {reason}")]
    Task {
        /// The reason the task failed.
        reason: String,
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

/// Result type alias for key and token operations.
pub type Result<T> = std::result::Result<T, Error>;
