//! `devrig hosts` — reconcile the managed block of the hosts file.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use devrig_core::Config;
use devrig_hosts::{
    compute_desired_state, ApplyOptions, DesiredOptions, Mode, ReconcileReport, Reconciler,
    WriteResult,
};

use super::load_inventory_or_empty;

#[derive(Subcommand, Debug)]
pub enum HostsCommand {
    /// Compare desired hostnames with the hosts file (read-only).
    Scan(HostsArgs),
    /// Map one project or hostname.
    Add {
        /// Project name (`foo` -> `foo.<domain>`) or full hostname.
        name: String,
        #[command(flatten)]
        args: HostsArgs,
    },
    /// Unmap one project or hostname from the managed block.
    Remove {
        name: String,
        #[command(flatten)]
        args: HostsArgs,
    },
    /// Rewrite the managed block from the inventory and project tree.
    Update(HostsArgs),
}

impl HostsCommand {
    fn parts(self) -> (Mode, HostsArgs) {
        match self {
            HostsCommand::Scan(args) => (Mode::Scan, args),
            HostsCommand::Add { name, args } => (Mode::Add(name), args),
            HostsCommand::Remove { name, args } => (Mode::Remove(name), args),
            HostsCommand::Update(args) => (Mode::UpdateAll, args),
        }
    }

    pub fn verbose(&self) -> bool {
        match self {
            HostsCommand::Scan(args) | HostsCommand::Update(args) => args.verbose,
            HostsCommand::Add { args, .. } | HostsCommand::Remove { args, .. } => args.verbose,
        }
    }
}

#[derive(Args, Debug)]
pub struct HostsArgs {
    /// Show what would change without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not back up the hosts file before writing.
    #[arg(long)]
    pub no_backup: bool,

    #[arg(long, short)]
    pub verbose: bool,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(command: HostsCommand, config: &Config) -> Result<()> {
    let (mode, args) = command.parts();

    let inventory = load_inventory_or_empty(config)?;
    let desired = compute_desired_state(
        &inventory,
        std::slice::from_ref(&config.apps_dir),
        &DesiredOptions {
            domain: config.domain.clone(),
        },
    );

    let reconciler = Reconciler::new(&config.hosts_file, &config.backup_dir);
    let options = ApplyOptions {
        dry_run: args.dry_run,
        backup: !args.no_backup,
        verbose: args.verbose,
    };
    let report = reconciler
        .apply(&desired, &mode, &options)
        .with_context(|| format!("hosts {mode} failed for {}", config.hosts_file.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to render report JSON")?
        );
    } else {
        print_report(&report, args.verbose);
    }
    Ok(())
}

fn print_report(report: &ReconcileReport, verbose: bool) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    for warning in &report.warnings {
        eprintln!("{} {warning}", "warning:".yellow());
    }

    for name in &report.missing {
        println!("{prefix}{} {name}", "missing".yellow());
    }
    for name in &report.stale {
        println!("{prefix}{} {name}", "stale".red());
    }
    for name in &report.added {
        println!("{prefix}{} {name}", "+".green());
    }
    for name in &report.removed {
        println!("{prefix}{} {name}", "-".red());
    }

    if report.dry_run || verbose {
        if let Some(diff) = &report.diff {
            println!("{diff}");
        }
    }

    if let Some(backup) = &report.backup {
        println!("backup: {}", backup.display());
    }

    let path = report.hosts_file.display();
    match &report.write {
        WriteResult::NotAttempted if report.in_sync() => {
            println!("{} {path} is in sync", "✓".green())
        }
        WriteResult::NotAttempted => println!(
            "{} {path}: {} missing, {} stale; run `devrig hosts update`",
            "!".yellow(),
            report.missing.len(),
            report.stale.len()
        ),
        WriteResult::Unchanged => println!("{prefix}{} {path} unchanged", "✓".green()),
        WriteResult::WouldWrite => println!("{prefix}{} {path} would be rewritten", "~".cyan()),
        WriteResult::Written { strategy } => {
            println!("{} wrote {path} ({strategy:?})", "✓".green())
        }
    }
}
