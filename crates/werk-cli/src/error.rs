//! CLI error types.

use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] werk_config::ConfigError),

    /// Certificate acquisition failed.
    #[error("certificate error: {0}")]
    Certs(#[from] werk_certs::Error),

    /// Manifest generation failed.
    #[error("manifest error: {0}")]
    Manifest(#[from] werk_manifest::Error),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// A failed certificate backend passes its own exit code through;
    /// everything else exits with 1.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Certs(e) => e
                .exit_code()
                .and_then(|code| u8::try_from(code).ok())
                .filter(|code| *code != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }
}
