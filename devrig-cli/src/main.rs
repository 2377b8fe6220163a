//! devrig — local development environment orchestrator.
//!
//! # Usage
//!
//! ```text
//! devrig services start|restart [--only CAT]... [--skip CAT]... [--dry-run] [--wait] [--verbose] [--show-errors] [--json]
//! devrig services list [--json]
//! devrig hosts scan|update [--dry-run] [--no-backup] [--verbose] [--json]
//! devrig hosts add|remove <name> [--dry-run] [--no-backup] [--verbose] [--json]
//! devrig detect <project> [--verbose] [--backend-info]
//! ```

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{detect::DetectArgs, hosts::HostsCommand, services::ServicesCommand};
use devrig_core::Config;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "devrig",
    version,
    about = "Start local infrastructure in order, keep /etc/hosts in step, classify projects",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start, restart or list inventory services.
    Services {
        #[command(subcommand)]
        command: ServicesCommand,
    },

    /// Reconcile the managed block of the hosts file.
    Hosts {
        #[command(subcommand)]
        command: HostsCommand,
    },

    /// Print the runtime tag of a project directory.
    Detect(DetectArgs),
}

impl Commands {
    /// Default log level when `RUST_LOG` is unset.
    fn log_level(&self) -> &'static str {
        let verbose = match self {
            Commands::Services { command } => command.verbose(),
            Commands::Hosts { command } => command.verbose(),
            Commands::Detect(args) => args.verbose,
        };
        match (verbose, self) {
            (true, _) => "debug",
            (false, Commands::Detect(_)) => "warn",
            (false, _) => "info",
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.command.log_level());

    let config = Config::load().context("failed to load ~/.devrig/config.yaml")?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Services { command } => commands::services::run(command, &config),
        Commands::Hosts { command } => commands::hosts::run(command, &config),
        Commands::Detect(args) => args.run(&config),
    }
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
