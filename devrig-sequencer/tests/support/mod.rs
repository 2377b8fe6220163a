//! In-memory orchestrator that records every call.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Child;

use devrig_core::types::{Category, CategoryName, ServiceInventory, ServiceUnit};
use devrig_sequencer::{
    CommandLine, ComposeAction, ContainerOrchestrator, HealthStatus, OrchestratorError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Ping,
    EnsureNetwork(String),
    Compose(String, ComposeAction),
    Health(String),
}

#[derive(Default)]
pub struct RecordingOrchestrator {
    calls: Mutex<Vec<Call>>,
    health: Mutex<HashMap<String, VecDeque<HealthStatus>>>,
    pub failing_units: HashSet<String>,
    pub unreachable: bool,
    pub network_broken: bool,
}

impl RecordingOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Health answers for `container`, consumed in order; the last one repeats.
    pub fn script_health(&self, container: &str, statuses: &[HealthStatus]) {
        self.health
            .lock()
            .unwrap()
            .insert(container.to_string(), statuses.iter().copied().collect());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Unit names passed to `compose`, in call order.
    pub fn composed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Compose(unit, _) => Some(unit),
                _ => None,
            })
            .collect()
    }

    pub fn health_probes(&self, container: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Health(name) if name == container))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unit_of(descriptor: &Path) -> String {
    descriptor
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl ContainerOrchestrator for RecordingOrchestrator {
    fn compose_commands(&self, descriptor: &Path, action: ComposeAction) -> Vec<CommandLine> {
        let file = descriptor.display().to_string();
        match action {
            ComposeAction::Up => vec![CommandLine::new("fake", ["-f", file.as_str(), "up"])],
            ComposeAction::Restart => vec![
                CommandLine::new("fake", ["-f", file.as_str(), "down"]),
                CommandLine::new("fake", ["-f", file.as_str(), "up"]),
            ],
        }
    }

    fn attached_command(&self, descriptor: &Path) -> CommandLine {
        CommandLine::new("fake", ["-f".to_string(), descriptor.display().to_string(), "attach".to_string()])
    }

    fn network_command(&self, network: &str) -> CommandLine {
        CommandLine::new("fake", ["network", "create", network])
    }

    async fn ping(&self) -> Result<(), OrchestratorError> {
        self.record(Call::Ping);
        if self.unreachable {
            return Err(OrchestratorError::Unavailable("engine down".into()));
        }
        Ok(())
    }

    async fn ensure_network(&self, network: &str) -> Result<(), OrchestratorError> {
        self.record(Call::EnsureNetwork(network.to_string()));
        if self.network_broken {
            return Err(OrchestratorError::CommandFailed {
                command: "fake network create".into(),
                status: Some(125),
                stderr: "permission denied".into(),
            });
        }
        Ok(())
    }

    async fn compose(
        &self,
        descriptor: &Path,
        action: ComposeAction,
    ) -> Result<(), OrchestratorError> {
        let unit = unit_of(descriptor);
        self.record(Call::Compose(unit.clone(), action));
        if self.failing_units.contains(&unit) {
            return Err(OrchestratorError::CommandFailed {
                command: format!("fake -f {} up", descriptor.display()),
                status: Some(1),
                stderr: "boom".into(),
            });
        }
        Ok(())
    }

    async fn health(&self, container: &str) -> Result<HealthStatus, OrchestratorError> {
        self.record(Call::Health(container.to_string()));
        let mut scripts = self.health.lock().unwrap();
        let status = match scripts.get_mut(container) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(HealthStatus::Stopped),
            Some(queue) => queue.front().copied().unwrap_or(HealthStatus::Stopped),
            None => HealthStatus::Healthy,
        };
        Ok(status)
    }

    fn spawn_attached(&self, _descriptor: &Path) -> Result<Child, OrchestratorError> {
        Err(OrchestratorError::Unsupported("attached launch"))
    }
}

/// Build an inventory whose descriptors live under `compose_dir`, creating
/// a file for every unit not listed in `missing`.
pub fn inventory(
    compose_dir: &Path,
    layout: &[(&str, &[&str])],
    missing: &[&str],
) -> ServiceInventory {
    let categories = layout
        .iter()
        .map(|(category, units)| Category {
            name: CategoryName::from(*category),
            units: units
                .iter()
                .map(|unit| {
                    let path: PathBuf = compose_dir.join(category).join(format!("{unit}.yml"));
                    if !missing.contains(unit) {
                        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                        std::fs::write(&path, "services: {}\n").unwrap();
                    }
                    ServiceUnit::new(*unit, *category, path)
                })
                .collect(),
        })
        .collect();
    ServiceInventory {
        network: "microservices-net".into(),
        categories,
    }
}
