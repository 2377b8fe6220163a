//! `devrig services` — category-ordered start / restart.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use devrig_core::types::ContainerRuntime;
use devrig_core::{Config, ServiceInventory};
use devrig_sequencer::{
    ActionTaken, ComposeCli, HealthOutcome, RunMode, SequenceReport, SequenceRequest, Sequencer,
    Supervisor,
};

use super::load_inventory;

#[derive(Subcommand, Debug)]
pub enum ServicesCommand {
    /// Start services category by category (`compose up -d`).
    Start(RunArgs),
    /// Restart services category by category (`compose down` + `up -d`).
    Restart(RunArgs),
    /// Show the inventory in start order.
    List(ListArgs),
}

impl ServicesCommand {
    pub fn verbose(&self) -> bool {
        match self {
            ServicesCommand::Start(args) | ServicesCommand::Restart(args) => args.verbose,
            ServicesCommand::List(_) => false,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only these categories, in the order given (repeatable).
    #[arg(long = "only", value_name = "CATEGORY")]
    pub only: Vec<String>,

    /// Skip these categories (repeatable; ignored with --only).
    #[arg(long = "skip", value_name = "CATEGORY")]
    pub skip: Vec<String>,

    /// Print the commands that would run without running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Wait for each unit to report healthy.
    #[arg(long)]
    pub wait: bool,

    #[arg(long, short)]
    pub verbose: bool,

    /// Print the full error text of failed units.
    #[arg(long)]
    pub show_errors: bool,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(command: ServicesCommand, config: &Config) -> Result<()> {
    match command {
        ServicesCommand::Start(args) => run_sequence(args, RunMode::Start, config),
        ServicesCommand::Restart(args) => run_sequence(args, RunMode::Restart, config),
        ServicesCommand::List(args) => list(args, config),
    }
}

// ---------------------------------------------------------------------------
// start / restart
// ---------------------------------------------------------------------------

fn run_sequence(args: RunArgs, mode: RunMode, config: &Config) -> Result<()> {
    let inventory = load_inventory(config)?;
    let orchestrator = match ComposeCli::detect(config.runtime, config.use_sudo) {
        Ok(cli) => cli,
        // Dry runs only render commands; the engine does not need to exist.
        Err(err) if args.dry_run => {
            tracing::debug!(error = %err, "no runtime detected; rendering for the configured one");
            ComposeCli::new(
                config.runtime.unwrap_or(ContainerRuntime::Podman),
                config.use_sudo,
            )
        }
        Err(err) => return Err(err).context("container infrastructure unavailable"),
    };

    let request = SequenceRequest {
        include: args.only.clone(),
        exclude: args.skip.clone(),
        mode,
        dry_run: args.dry_run,
        wait_for_healthy: args.wait,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let mut supervisor = Supervisor::default();
        let sequencer = Sequencer::new(&inventory, &orchestrator);

        let outcome = tokio::select! {
            result = sequencer.run(&request, &mut supervisor) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(result) = outcome else {
            tracing::warn!("interrupted; stopping foreground units");
            teardown(supervisor).await;
            bail!("interrupted");
        };
        let report = match result {
            Ok(report) => report,
            Err(err) => {
                teardown(supervisor).await;
                return Err(err).context("startup aborted");
            }
        };

        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render report JSON")?
            );
        } else {
            print_report(&report, args.show_errors);
        }

        if !supervisor.is_empty() {
            let names: Vec<&str> = supervisor.names().collect();
            eprintln!(
                "{} foreground unit(s) running ({}); press ctrl-c to stop",
                names.len(),
                names.join(", ")
            );
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            teardown(supervisor).await;
        }
        Ok(())
    })
}

async fn teardown(supervisor: Supervisor) {
    for (unit, result) in supervisor.shutdown().await {
        match result {
            Ok(outcome) => tracing::info!(unit = %unit, ?outcome, "foreground unit stopped"),
            Err(err) => tracing::error!(unit = %unit, error = %err, "foreground unit teardown failed"),
        }
    }
}

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "unit")]
    unit: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "health")]
    health: String,
}

fn print_report(report: &SequenceReport, show_errors: bool) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };

    if report.dry_run {
        for line in &report.prerequisites {
            println!("{prefix}{line}");
        }
        for unit in report.categories.iter().flat_map(|c| &c.units) {
            if unit.action == ActionTaken::WouldExecute {
                for line in &unit.commands {
                    println!("{prefix}{line}");
                }
            }
        }
    }

    let rows: Vec<UnitRow> = report
        .categories
        .iter()
        .flat_map(|c| {
            c.units.iter().map(move |u| UnitRow {
                category: c.name.clone(),
                unit: u.name.clone(),
                action: action_label(u.action),
                health: health_label(u.health),
            })
        })
        .collect();
    if rows.is_empty() {
        println!("{prefix}No services selected.");
        return;
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let failed: Vec<_> = report
        .categories
        .iter()
        .flat_map(|c| &c.units)
        .filter(|u| u.error.is_some())
        .collect();
    if show_errors {
        for unit in &failed {
            if let Some(error) = &unit.error {
                eprintln!("{} {}: {}", "✗".red(), unit.name.bold(), error);
            }
        }
    } else if !failed.is_empty() {
        eprintln!(
            "{} unit(s) reported problems; rerun with --show-errors for details",
            failed.len()
        );
    }

    let c = &report.counts;
    let summary = if report.dry_run {
        format!("{prefix}{} unit(s) would be started, {} skipped", c.would_execute, c.skipped)
    } else {
        format!(
            "{} started, {} failed, {} skipped, {} unhealthy",
            c.started, c.failed, c.skipped, c.unhealthy
        )
    };
    if report.has_problems() {
        println!("{} {summary}", "!".yellow());
    } else {
        println!("{} {summary}", "✓".green());
    }
}

fn action_label(action: ActionTaken) -> String {
    match action {
        ActionTaken::Started => "started".green().to_string(),
        ActionTaken::Restarted => "restarted".green().to_string(),
        ActionTaken::Launched => "launched".green().to_string(),
        ActionTaken::WouldExecute => "would execute".cyan().to_string(),
        ActionTaken::Skipped => "skipped".yellow().to_string(),
        ActionTaken::Failed => "failed".red().to_string(),
    }
}

fn health_label(health: HealthOutcome) -> String {
    match health {
        HealthOutcome::Healthy => "healthy".green().to_string(),
        HealthOutcome::Unhealthy => "unhealthy".red().to_string(),
        HealthOutcome::Skipped => "-".dimmed().to_string(),
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct InventoryRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "category")]
    category: String,
    #[tabled(rename = "unit")]
    unit: String,
    #[tabled(rename = "hostnames")]
    hostnames: String,
    #[tabled(rename = "compose")]
    compose: String,
}

#[derive(Serialize)]
struct InventoryJson<'a> {
    network: &'a str,
    categories: Vec<CategoryJson<'a>>,
}

#[derive(Serialize)]
struct CategoryJson<'a> {
    name: &'a str,
    units: Vec<&'a str>,
}

fn list(args: ListArgs, config: &Config) -> Result<()> {
    let inventory = load_inventory(config)?;
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&inventory_json(&inventory))
                .context("failed to render inventory JSON")?
        );
        return Ok(());
    }

    let rows: Vec<InventoryRow> = inventory
        .categories
        .iter()
        .enumerate()
        .flat_map(|(index, category)| {
            category.units.iter().map(move |unit| InventoryRow {
                position: index + 1,
                category: category.name.0.clone(),
                unit: unit.name.0.clone(),
                hostnames: unit.hostnames.join(", "),
                compose: unit.compose.display().to_string(),
            })
        })
        .collect();
    if rows.is_empty() {
        println!("No services in the inventory.");
        return Ok(());
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("network: {}", inventory.network);
    Ok(())
}

fn inventory_json(inventory: &ServiceInventory) -> InventoryJson<'_> {
    InventoryJson {
        network: &inventory.network,
        categories: inventory
            .categories
            .iter()
            .map(|c| CategoryJson {
                name: &c.name.0,
                units: c.units.iter().map(|u| u.name.0.as_str()).collect(),
            })
            .collect(),
    }
}
