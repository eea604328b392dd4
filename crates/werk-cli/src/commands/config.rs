//! Configuration dump command.

use std::io::Write;

use werk_config::Config;

use crate::error::CliError;

/// Config command executor.
pub struct ConfigCommand<'a> {
    config: &'a Config,
}

impl<'a> ConfigCommand<'a> {
    /// Create a new config command.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Write the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn execute<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        serde_json::to_writer_pretty(&mut *writer, self.config)?;
        writeln!(writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use werk_config::EnvSource;

    #[test]
    fn writes_json() {
        let config = Config::from_env(&EnvSource::from_pairs([
            ("MW_DOMAIN", "example.com"),
            ("MW_LE_EMAIL", "ops@example.com"),
        ]))
        .unwrap();
        let mut out = Vec::new();

        ConfigCommand::new(&config).execute(&mut out).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["domain"], "example.com");
        assert_eq!(json["le_email"], "ops@example.com");
    }
}
