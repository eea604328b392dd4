//! Certificate acquisition error types.

use std::path::PathBuf;

use thiserror::Error;
use werk_exec::CommandError;

/// Result type for certificate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Certificate acquisition error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend program failed, timed out or could not be started.
    #[error("certificate backend failed: {0}")]
    Command(#[from] CommandError),

    /// Filesystem operation failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The local CA did not report its root directory.
    #[error("local CA root lookup failed: {0}")]
    CaRoot(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit code of the backend program, if it ran and failed.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Command(e) => e.exit_code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_from_command() {
        let err = Error::from(CommandError::non_zero_exit("certbot certonly", 2, "boom"));
        assert_eq!(err.exit_code(), Some(2));
        assert!(err.to_string().starts_with("certificate backend failed"));
    }

    #[test]
    fn no_exit_code_for_io() {
        let err = Error::io(
            "/le_certs",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.exit_code(), None);
        assert_eq!(err.to_string(), "i/o error on /le_certs: denied");
    }
}
