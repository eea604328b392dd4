//! Manifest generation command.

use std::io::Write;
use std::path::PathBuf;

use werk_config::Config;
use werk_manifest::ManifestWriter;

use crate::error::CliError;

/// Manifests command executor.
pub struct ManifestsCommand<'a> {
    config: &'a Config,
}

impl<'a> ManifestsCommand<'a> {
    /// Create a new manifests command.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Write all manifests and print their paths, one per line.
    ///
    /// # Errors
    ///
    /// Returns an error if any manifest cannot be written.
    pub async fn execute<W: Write>(&self, writer: &mut W) -> Result<Vec<PathBuf>, CliError> {
        let paths = ManifestWriter::new(self.config).write_all().await?;
        for path in &paths {
            writeln!(writer, "{}", path.display())?;
        }
        Ok(paths)
    }
}
