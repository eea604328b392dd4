//! Certificate acquisition command.

use std::io::Write;

use tracing::info;
use werk_certs::{Acquisition, CertBackend};
use werk_config::Config;

use crate::error::CliError;

/// Certs command executor.
pub struct CertsCommand<'a> {
    config: &'a Config,
}

impl<'a> CertsCommand<'a> {
    /// Create a new certs command.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Acquire certificates and print the destination directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or output fails.
    pub async fn execute<W: Write>(&self, writer: &mut W) -> Result<Acquisition, CliError> {
        let backend = CertBackend::from_config(self.config);
        info!(backend = ?backend.kind(), program = backend.program(), "acquiring certificates");
        let acquisition = backend.acquire().await?;
        writeln!(writer, "{}", acquisition.destination.display())?;
        Ok(acquisition)
    }
}
