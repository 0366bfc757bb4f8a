//! podcopy command-line entry point.

mod app;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use podcopy_transfer::TransferRequest;
use tracing_subscriber::EnvFilter;

use crate::app::TargetArgs;
use crate::config::Config;

/// Copy files and directories between this machine and a running
/// container, streaming a tar archive over `kubectl exec`.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Configuration file [default: ~/.config/podcopy/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy a local file or directory into a container.
    Push {
        local: PathBuf,
        remote: String,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Copy a file or directory out of a container.
    Pull {
        remote: String,
        local: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration.
    Show,

    /// Write the default configuration to disk.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_path()?,
    };

    match cli.command {
        Commands::Config { command } => {
            match command {
                ConfigCommand::Show => app::show_config(&config_path)?,
                ConfigCommand::Init { force } => app::init_config(&config_path, force)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Push {
            local,
            remote,
            target,
        } => transfer(&config_path, TransferRequest::outbound(local, remote), target),
        Commands::Pull {
            remote,
            local,
            target,
        } => transfer(&config_path, TransferRequest::inbound(remote, local), target),
    }
}

fn transfer(
    config_path: &std::path::Path,
    request: TransferRequest,
    target: TargetArgs,
) -> anyhow::Result<ExitCode> {
    let config = Config::load_from(config_path)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run_transfer(&config, request, target))
}
