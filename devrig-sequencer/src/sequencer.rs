//! Category-ordered startup.
//!
//! A run moves through `Planning -> Prerequisites -> Running -> Done`. Units
//! are processed strictly one at a time: category order first, declaration
//! order within a category. Only an unreachable engine, an unknown category
//! name or a network that cannot be ensured abort the run; everything else is
//! recorded per unit and the run continues.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use devrig_core::types::{Category, ServiceInventory, ServiceUnit};

use crate::error::SequenceError;
use crate::orchestrator::ContainerOrchestrator;
use crate::report::{
    ActionTaken, CategoryReport, HealthOutcome, RunMode, SequenceReport, UnitReport,
};
use crate::supervisor::Supervisor;

// ---------------------------------------------------------------------------
// Request / timing
// ---------------------------------------------------------------------------

/// What to start and how.
#[derive(Debug, Clone)]
pub struct SequenceRequest {
    /// When non-empty, exactly these categories in this order; `exclude` is
    /// then ignored.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub mode: RunMode,
    pub dry_run: bool,
    pub wait_for_healthy: bool,
}

impl Default for SequenceRequest {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            mode: RunMode::Start,
            dry_run: false,
            wait_for_healthy: false,
        }
    }
}

/// Pauses between steps and health-poll budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub unit_pause: Duration,
    pub category_pause: Duration,
    pub health_attempts: u32,
    pub health_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            unit_pause: Duration::from_secs(2),
            category_pause: Duration::from_secs(5),
            health_attempts: 30,
            health_delay: Duration::from_secs(2),
        }
    }
}

impl Timing {
    /// No pauses; a short health budget. Handy for tests.
    pub fn immediate() -> Self {
        Self {
            unit_pause: Duration::ZERO,
            category_pause: Duration::ZERO,
            health_attempts: 3,
            health_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Planning,
    Prerequisites,
    Running,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Planning => "planning",
            Phase::Prerequisites => "prerequisites",
            Phase::Running => "running",
            Phase::Done => "done",
        })
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

pub struct Sequencer<'a, O: ?Sized> {
    inventory: &'a ServiceInventory,
    orchestrator: &'a O,
    timing: Timing,
}

impl<'a, O> Sequencer<'a, O>
where
    O: ContainerOrchestrator + ?Sized,
{
    pub fn new(inventory: &'a ServiceInventory, orchestrator: &'a O) -> Self {
        Self {
            inventory,
            orchestrator,
            timing: Timing::default(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Resolve the ordered list of categories to visit.
    pub fn plan(&self, request: &SequenceRequest) -> Result<Vec<&'a Category>, SequenceError> {
        let inventory = self.inventory;
        if !request.include.is_empty() {
            let mut seen = HashSet::new();
            let mut planned = Vec::new();
            for name in &request.include {
                if !seen.insert(name.as_str()) {
                    continue;
                }
                let category = inventory
                    .category(name)
                    .ok_or_else(|| self.invalid_category(name))?;
                planned.push(category);
            }
            if !request.exclude.is_empty() {
                tracing::debug!("explicit category list given; exclusions ignored");
            }
            return Ok(planned);
        }

        for name in &request.exclude {
            if inventory.category(name).is_none() {
                return Err(self.invalid_category(name));
            }
        }
        Ok(inventory
            .categories
            .iter()
            .filter(|c| !request.exclude.iter().any(|x| *x == c.name.0))
            .collect())
    }

    /// Execute `request`. Foreground units are handed to `supervisor`.
    pub async fn run(
        &self,
        request: &SequenceRequest,
        supervisor: &mut Supervisor,
    ) -> Result<SequenceReport, SequenceError> {
        let mut phase = Phase::Planning;
        let categories = self.plan(request)?;
        tracing::info!(
            categories = ?categories.iter().map(|c| c.name.0.as_str()).collect::<Vec<_>>(),
            mode = ?request.mode,
            dry_run = request.dry_run,
            "startup planned"
        );

        let network = self.inventory.network.as_str();
        let mut report = SequenceReport::new(request.mode, request.dry_run, network);

        advance(&mut phase, Phase::Prerequisites);
        if request.dry_run {
            report
                .prerequisites
                .push(self.orchestrator.network_command(network).to_string());
        } else {
            self.orchestrator
                .ping()
                .await
                .map_err(SequenceError::InfrastructureUnavailable)?;
            self.orchestrator
                .ensure_network(network)
                .await
                .map_err(|source| SequenceError::NetworkUnavailable {
                    network: network.to_string(),
                    source,
                })?;
        }

        advance(&mut phase, Phase::Running);
        for (index, category) in categories.iter().enumerate() {
            if index > 0 {
                self.pause(request, self.timing.category_pause).await;
            }
            tracing::info!(category = %category.name, units = category.units.len(), "starting category");

            let mut units = Vec::with_capacity(category.units.len());
            for (position, unit) in category.units.iter().enumerate() {
                if position > 0 {
                    self.pause(request, self.timing.unit_pause).await;
                }
                let unit_report = self
                    .run_unit(unit, request, supervisor, &mut report.warnings)
                    .await;
                units.push(unit_report);
            }
            report.categories.push(CategoryReport {
                name: category.name.0.clone(),
                units,
            });
        }

        advance(&mut phase, Phase::Done);
        let report = report.finish();
        tracing::info!(
            total = report.counts.total,
            started = report.counts.started,
            failed = report.counts.failed,
            skipped = report.counts.skipped,
            "startup finished"
        );
        Ok(report)
    }

    async fn run_unit(
        &self,
        unit: &ServiceUnit,
        request: &SequenceRequest,
        supervisor: &mut Supervisor,
        warnings: &mut Vec<String>,
    ) -> UnitReport {
        let action = request.mode.compose_action();
        let commands: Vec<String> = if unit.foreground {
            vec![self.orchestrator.attached_command(&unit.compose).to_string()]
        } else {
            self.orchestrator
                .compose_commands(&unit.compose, action)
                .iter()
                .map(ToString::to_string)
                .collect()
        };
        let mut outcome = UnitReport {
            name: unit.name.0.clone(),
            action: ActionTaken::Skipped,
            health: HealthOutcome::Skipped,
            error: None,
            commands,
        };

        if !unit.compose.is_file() {
            let message = format!("compose descriptor not found: {}", unit.compose.display());
            tracing::warn!(unit = %unit.name, path = %unit.compose.display(), "skipping unit without compose descriptor");
            warnings.push(format!("{}: {message}", unit.name));
            outcome.error = Some(message);
            return outcome;
        }

        if request.dry_run {
            outcome.action = ActionTaken::WouldExecute;
            return outcome;
        }

        if unit.foreground {
            match self.orchestrator.spawn_attached(&unit.compose) {
                Ok(child) => {
                    supervisor.supervise(unit.name.0.clone(), child);
                    outcome.action = ActionTaken::Launched;
                }
                Err(err) => {
                    tracing::error!(unit = %unit.name, error = %err, "foreground launch failed");
                    outcome.action = ActionTaken::Failed;
                    outcome.error = Some(err.to_string());
                    return outcome;
                }
            }
        } else {
            tracing::info!(unit = %unit.name, ?action, "compose");
            match self.orchestrator.compose(&unit.compose, action).await {
                Ok(()) => {
                    outcome.action = match request.mode {
                        RunMode::Start => ActionTaken::Started,
                        RunMode::Restart => ActionTaken::Restarted,
                    };
                }
                Err(err) => {
                    tracing::error!(unit = %unit.name, error = %err, "compose failed");
                    outcome.action = ActionTaken::Failed;
                    outcome.error = Some(err.to_string());
                    return outcome;
                }
            }
        }

        if request.wait_for_healthy {
            outcome.health = self.wait_healthy(unit).await;
        }
        outcome
    }

    async fn wait_healthy(&self, unit: &ServiceUnit) -> HealthOutcome {
        let container = unit.container_name();
        let attempts = self.timing.health_attempts.max(1);
        for attempt in 1..=attempts {
            match self.orchestrator.health(container).await {
                Ok(status) if status.is_ready() => {
                    tracing::info!(unit = %unit.name, attempt, "healthy");
                    return HealthOutcome::Healthy;
                }
                Ok(status) => tracing::debug!(unit = %unit.name, attempt, ?status, "not ready"),
                Err(err) => tracing::debug!(unit = %unit.name, attempt, error = %err, "health probe failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.timing.health_delay).await;
            }
        }
        tracing::warn!(unit = %unit.name, attempts, "did not become healthy");
        HealthOutcome::Unhealthy
    }

    async fn pause(&self, request: &SequenceRequest, duration: Duration) {
        if !request.dry_run && !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    fn invalid_category(&self, name: &str) -> SequenceError {
        SequenceError::InvalidCategory {
            name: name.to_string(),
            known: self
                .inventory
                .category_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

fn advance(phase: &mut Phase, next: Phase) {
    tracing::debug!(from = %phase, to = %next, "sequencer phase");
    *phase = next;
}
