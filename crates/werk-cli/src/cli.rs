//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// Minimal KRAFTWERK emulation: certificates and bootstrap manifests for a
/// RASENMAEHER deployment on a single host.
#[derive(Parser, Debug, Clone)]
#[command(name = "miniwerk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Numeric log level: 10 debug, 20 info, 30 warning, 40 error. `-v`
    /// takes precedence.
    #[arg(short, long, value_name = "LEVEL", default_value_t = 30, global = true)]
    pub loglevel: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Dotenv file to read settings from; ignored when missing.
    #[arg(long, env = "MW_ENV_FILE", default_value = ".env", global = true)]
    pub env_file: PathBuf,

    /// Override a setting, taking precedence over the environment.
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Log output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Show the resolved configuration as JSON.
    Config,

    /// Get and/or renew certificates.
    ///
    /// The exit code is the certificate backend's exit code.
    Certs,

    /// Write the orchestrator and product manifests.
    Manifests,

    /// Write manifests, then get certificates.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        for (arg, expected) in [
            ("config", Commands::Config),
            ("certs", Commands::Certs),
            ("manifests", Commands::Manifests),
            ("init", Commands::Init),
        ] {
            let cli = Cli::parse_from(["miniwerk", arg]);
            assert_eq!(cli.command, expected);
        }
    }

    #[test]
    fn counts_verbosity() {
        let cli = Cli::parse_from(["miniwerk", "-vv", "config"]);
        assert_eq!(cli.verbose, 2);
        let cli = Cli::parse_from(["miniwerk", "certs", "-v"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn numeric_loglevel() {
        let cli = Cli::parse_from(["miniwerk", "config"]);
        assert_eq!(cli.loglevel, 30);
        let cli = Cli::parse_from(["miniwerk", "-l", "10", "config"]);
        assert_eq!(cli.loglevel, 10);
        let cli = Cli::parse_from(["miniwerk", "manifests", "--loglevel", "40"]);
        assert_eq!(cli.loglevel, 40);
        assert!(Cli::try_parse_from(["miniwerk", "-l", "debug", "config"]).is_err());
    }

    #[test]
    fn collects_overrides() {
        let cli = Cli::parse_from([
            "miniwerk",
            "--set",
            "MW_DOMAIN=example.com",
            "--set",
            "MW_LE_TEST=false",
            "--log-format",
            "json",
            "init",
        ]);
        assert_eq!(cli.overrides, vec!["MW_DOMAIN=example.com", "MW_LE_TEST=false"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn requires_subcommand() {
        assert!(Cli::try_parse_from(["miniwerk"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
