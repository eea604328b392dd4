//! # werk-cli
//!
//! The `miniwerk` command-line tool: writes bootstrap manifests and
//! obtains TLS certificates for a single-host deployment.
//!
//! Settings are read from the process environment, an optional dotenv
//! file and `--set KEY=VALUE` overrides, in increasing precedence, and
//! resolved once into a [`werk_config::Config`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

use std::path::Path;

use werk_config::{Config, EnvSource};

pub use cli::{Cli, Commands, LogFormat};
pub use error::CliError;

/// Resolve the configuration from `source`, an env file and overrides.
///
/// Values already in `source` win over the file; overrides win over both.
///
/// # Errors
///
/// Returns an error if the file cannot be read, an override is malformed,
/// or the resulting configuration is invalid.
pub fn resolve_config(
    mut source: EnvSource,
    env_file: &Path,
    overrides: &[String],
) -> Result<Config, CliError> {
    source.merge_env_file(env_file)?;
    for raw in overrides {
        source.apply_override(raw)?;
    }
    Ok(Config::from_env(&source)?)
}
