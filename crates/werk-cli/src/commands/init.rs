//! First-boot command: manifests, then certificates.

use std::io::Write;

use werk_config::Config;

use super::{CertsCommand, ManifestsCommand};
use crate::error::CliError;

/// Init command executor.
pub struct InitCommand<'a> {
    config: &'a Config,
}

impl<'a> InitCommand<'a> {
    /// Create a new init command.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Write manifests, then acquire certificates.
    ///
    /// # Errors
    ///
    /// Returns the first failure; certificates are not attempted if the
    /// manifests could not be written.
    pub async fn execute<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        ManifestsCommand::new(self.config).execute(writer).await?;
        CertsCommand::new(self.config).execute(writer).await?;
        Ok(())
    }
}
