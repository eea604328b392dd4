//! miniwerk binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::sync::OnceLock;

use clap::Parser;
use tracing::error;
use werk_config::{Config, EnvSource};

use werk_cli::commands::{CertsCommand, ConfigCommand, InitCommand, ManifestsCommand};
use werk_cli::{Cli, CliError, Commands, logging, resolve_config};

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Process-wide configuration, resolved on first use.
fn config(cli: &Cli) -> Result<&'static Config, CliError> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let resolved = resolve_config(EnvSource::from_process(), &cli.env_file, &cli.overrides)?;
    Ok(CONFIG.get_or_init(|| resolved))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.loglevel, cli.log_format) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    let config = config(cli)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Config => ConfigCommand::new(config).execute(&mut stdout)?,
        Commands::Certs => {
            CertsCommand::new(config).execute(&mut stdout).await?;
        }
        Commands::Manifests => {
            ManifestsCommand::new(config).execute(&mut stdout).await?;
        }
        Commands::Init => InitCommand::new(config).execute(&mut stdout).await?,
    }

    Ok(())
}
