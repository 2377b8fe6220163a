//! Per-run outcome, ordered category -> unit.

use serde::Serialize;

use crate::orchestrator::ComposeAction;

/// Whether units are started or restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Start,
    Restart,
}

impl RunMode {
    pub fn compose_action(self) -> ComposeAction {
        match self {
            RunMode::Start => ComposeAction::Up,
            RunMode::Restart => ComposeAction::Restart,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    Started,
    Restarted,
    /// Foreground unit launched attached and handed to the supervisor.
    Launched,
    /// Dry run: the recorded commands would have been executed.
    WouldExecute,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthOutcome {
    Healthy,
    Unhealthy,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub name: String,
    pub action: ActionTaken,
    pub health: HealthOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Exact command lines issued (or that would be issued).
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub name: String,
    pub units: Vec<UnitReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub total: usize,
    pub started: usize,
    pub would_execute: usize,
    pub skipped: usize,
    pub failed: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceReport {
    pub mode: RunMode,
    pub dry_run: bool,
    pub network: String,
    /// Prerequisite commands (network creation) recorded in dry-run mode.
    pub prerequisites: Vec<String>,
    pub categories: Vec<CategoryReport>,
    pub warnings: Vec<String>,
    pub counts: ReportCounts,
}

impl SequenceReport {
    pub(crate) fn new(mode: RunMode, dry_run: bool, network: &str) -> Self {
        Self {
            mode,
            dry_run,
            network: network.to_string(),
            prerequisites: Vec::new(),
            categories: Vec::new(),
            warnings: Vec::new(),
            counts: ReportCounts::default(),
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        let mut counts = ReportCounts::default();
        for unit in self.categories.iter().flat_map(|c| &c.units) {
            counts.total += 1;
            match unit.action {
                ActionTaken::Started | ActionTaken::Restarted | ActionTaken::Launched => {
                    counts.started += 1
                }
                ActionTaken::WouldExecute => counts.would_execute += 1,
                ActionTaken::Skipped => counts.skipped += 1,
                ActionTaken::Failed => counts.failed += 1,
            }
            match unit.health {
                HealthOutcome::Healthy => counts.healthy += 1,
                HealthOutcome::Unhealthy => counts.unhealthy += 1,
                HealthOutcome::Skipped => {}
            }
        }
        self.counts = counts;
        self
    }

    /// Unit names in the order they were visited.
    pub fn visited(&self) -> Vec<&str> {
        self.categories
            .iter()
            .flat_map(|c| c.units.iter().map(|u| u.name.as_str()))
            .collect()
    }

    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.categories
            .iter()
            .flat_map(|c| &c.units)
            .find(|u| u.name == name)
    }

    /// True when at least one unit failed or ended unhealthy.
    pub fn has_problems(&self) -> bool {
        self.counts.failed > 0 || self.counts.unhealthy > 0
    }
}
