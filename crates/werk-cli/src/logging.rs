//! Log subscriber setup.
//!
//! Logs go to stderr; stdout carries command results only.

use std::io;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::LogFormat;

/// Default filter for a `-v` count and a numeric `--loglevel`.
///
/// Any `-v` wins over the numeric level.
#[must_use]
pub fn default_directive(verbose: u8, loglevel: u8) -> &'static str {
    match (verbose, loglevel) {
        (1, _) => "info",
        (2.., _) => "debug",
        (0, 0..10) => "trace",
        (0, 10..20) => "debug",
        (0, 20..30) => "info",
        (0, 30..40) => "warn",
        (0, _) => "error",
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose` and
/// `loglevel`.
///
/// # Errors
///
/// Returns an error if the filter is invalid or a subscriber is already
/// installed.
pub fn init(verbose: u8, loglevel: u8, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose, loglevel)))
        .context("invalid log filter")?;
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init(),
    }
    .context("failed to install log subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(default_directive(0, 30), "warn");
        assert_eq!(default_directive(1, 30), "info");
        assert_eq!(default_directive(2, 30), "debug");
        assert_eq!(default_directive(7, 30), "debug");
    }

    #[test]
    fn numeric_levels() {
        assert_eq!(default_directive(0, 0), "trace");
        assert_eq!(default_directive(0, 10), "debug");
        assert_eq!(default_directive(0, 20), "info");
        assert_eq!(default_directive(0, 25), "info");
        assert_eq!(default_directive(0, 30), "warn");
        assert_eq!(default_directive(0, 40), "error");
        assert_eq!(default_directive(0, 50), "error");
    }

    #[test]
    fn verbose_overrides_numeric_level() {
        assert_eq!(default_directive(1, 40), "info");
        assert_eq!(default_directive(2, 40), "debug");
        assert_eq!(default_directive(1, 10), "info");
    }
}
