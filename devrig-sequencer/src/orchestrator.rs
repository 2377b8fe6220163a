//! Container-orchestration collaborator.
//!
//! The sequencer only talks to [`ContainerOrchestrator`]. [`ComposeCli`] is the
//! production implementation and shells out to `podman compose` /
//! `docker compose` (optionally through `sudo`).

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};

use devrig_core::types::ContainerRuntime;

use crate::error::OrchestratorError;

/// What to do with a unit's compose descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComposeAction {
    /// `up -d`
    Up,
    /// `down` followed by `up -d`
    Restart,
}

/// Health signal reported for a named container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Container health check passes.
    Healthy,
    /// Running, and the image declares no health check.
    Running,
    /// Health check has not passed yet.
    Starting,
    Unhealthy,
    /// Not running (or does not exist).
    Stopped,
}

impl HealthStatus {
    pub fn is_ready(self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Running)
    }
}

/// An exact command line, kept for dry-run auditing and error messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(word: &str) -> String {
    if !word.is_empty() && !word.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Capability the sequencer drives. Implementations must be cheap to call
/// repeatedly; the sequencer polls [`health`](Self::health) in a loop.
#[async_trait]
pub trait ContainerOrchestrator: Send + Sync {
    /// Command lines `compose` would run, in order. Pure.
    fn compose_commands(&self, descriptor: &Path, action: ComposeAction) -> Vec<CommandLine>;

    /// Command line for an attached (foreground) launch. Pure.
    fn attached_command(&self, descriptor: &Path) -> CommandLine;

    /// Command line that creates the shared network. Pure.
    fn network_command(&self, network: &str) -> CommandLine;

    /// Fails if the engine cannot be reached at all.
    async fn ping(&self) -> Result<(), OrchestratorError>;

    /// Create `network` unless it already exists.
    async fn ensure_network(&self, network: &str) -> Result<(), OrchestratorError>;

    async fn compose(&self, descriptor: &Path, action: ComposeAction)
        -> Result<(), OrchestratorError>;

    async fn health(&self, container: &str) -> Result<HealthStatus, OrchestratorError>;

    /// Launch `descriptor` attached; the caller owns the returned process.
    fn spawn_attached(&self, descriptor: &Path) -> Result<Child, OrchestratorError>;
}

// ---------------------------------------------------------------------------
// ComposeCli
// ---------------------------------------------------------------------------

/// Compose front-end flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeFlavor {
    /// `<runtime> compose ...`
    Plugin,
    /// `podman-compose ...`
    Standalone,
}

/// Shells out to the container engine's compose front-end.
#[derive(Debug, Clone)]
pub struct ComposeCli {
    runtime: ContainerRuntime,
    flavor: ComposeFlavor,
    use_sudo: bool,
}

impl ComposeCli {
    pub fn new(runtime: ContainerRuntime, use_sudo: bool) -> Self {
        Self {
            runtime,
            flavor: ComposeFlavor::Plugin,
            use_sudo,
        }
    }

    pub fn with_flavor(mut self, flavor: ComposeFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Resolve the engine: an explicit `preferred` runtime must be on `PATH`;
    /// otherwise podman is preferred over docker.
    pub fn detect(
        preferred: Option<ContainerRuntime>,
        use_sudo: bool,
    ) -> Result<Self, OrchestratorError> {
        let runtime = match preferred {
            Some(runtime) => {
                if !on_path(runtime.binary()) {
                    return Err(OrchestratorError::Unavailable(format!(
                        "runtime '{runtime}' was requested but is not installed"
                    )));
                }
                runtime
            }
            None => [ContainerRuntime::Podman, ContainerRuntime::Docker]
                .into_iter()
                .find(|rt| on_path(rt.binary()))
                .ok_or_else(|| {
                    OrchestratorError::Unavailable("no container runtime found".to_string())
                })?,
        };

        let flavor = if runtime == ContainerRuntime::Podman && !podman_compose_plugin_available() {
            ComposeFlavor::Standalone
        } else {
            ComposeFlavor::Plugin
        };
        tracing::debug!(%runtime, ?flavor, use_sudo, "container runtime selected");
        Ok(Self::new(runtime, use_sudo).with_flavor(flavor))
    }

    fn engine(&self, args: &[&str]) -> CommandLine {
        self.wrap(self.runtime.binary(), args.iter().map(|a| a.to_string()).collect())
    }

    fn compose_line(&self, descriptor: &Path, tail: &[&str]) -> CommandLine {
        let file = descriptor.display().to_string();
        let (program, mut args) = match self.flavor {
            ComposeFlavor::Plugin => (
                self.runtime.binary(),
                vec!["compose".to_string(), "-f".to_string(), file],
            ),
            ComposeFlavor::Standalone => ("podman-compose", vec!["-f".to_string(), file]),
        };
        args.extend(tail.iter().map(|a| a.to_string()));
        self.wrap(program, args)
    }

    fn wrap(&self, program: &str, args: Vec<String>) -> CommandLine {
        if self.use_sudo {
            let mut sudo_args = vec![program.to_string()];
            sudo_args.extend(args);
            CommandLine::new("sudo", sudo_args)
        } else {
            CommandLine::new(program, args)
        }
    }
}

#[async_trait]
impl ContainerOrchestrator for ComposeCli {
    fn compose_commands(&self, descriptor: &Path, action: ComposeAction) -> Vec<CommandLine> {
        match action {
            ComposeAction::Up => vec![self.compose_line(descriptor, &["up", "-d"])],
            ComposeAction::Restart => vec![
                self.compose_line(descriptor, &["down"]),
                self.compose_line(descriptor, &["up", "-d"]),
            ],
        }
    }

    fn attached_command(&self, descriptor: &Path) -> CommandLine {
        self.compose_line(descriptor, &["up"])
    }

    fn network_command(&self, network: &str) -> CommandLine {
        self.engine(&["network", "create", network])
    }

    async fn ping(&self) -> Result<(), OrchestratorError> {
        let line = self.engine(&["info"]);
        run(&line).await.map(|_| ()).map_err(|err| match err {
            OrchestratorError::Spawn { source, .. } => OrchestratorError::Unavailable(format!(
                "{} is not installed or not executable: {source}",
                self.runtime
            )),
            OrchestratorError::CommandFailed { stderr, .. } => OrchestratorError::Unavailable(
                format!("{} is not responding: {}", self.runtime, stderr.trim()),
            ),
            other => other,
        })
    }

    async fn ensure_network(&self, network: &str) -> Result<(), OrchestratorError> {
        let inspect = self.engine(&["network", "inspect", network]);
        if run(&inspect).await.is_ok() {
            tracing::debug!(network, "network already exists");
            return Ok(());
        }
        tracing::info!(network, "creating container network");
        run(&self.network_command(network)).await.map(|_| ())
    }

    async fn compose(
        &self,
        descriptor: &Path,
        action: ComposeAction,
    ) -> Result<(), OrchestratorError> {
        for line in self.compose_commands(descriptor, action) {
            run(&line).await?;
        }
        Ok(())
    }

    async fn health(&self, container: &str) -> Result<HealthStatus, OrchestratorError> {
        let line = self.engine(&["inspect", "--format", "{{json .State}}", container]);
        match run(&line).await {
            Ok(stdout) => parse_state(&stdout),
            // A container that cannot be inspected is not running.
            Err(OrchestratorError::CommandFailed { .. }) => Ok(HealthStatus::Stopped),
            Err(err) => Err(err),
        }
    }

    fn spawn_attached(&self, descriptor: &Path) -> Result<Child, OrchestratorError> {
        let line = self.attached_command(descriptor);
        line.to_command()
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OrchestratorError::Spawn {
                command: line.to_string(),
                source,
            })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn run(line: &CommandLine) -> Result<String, OrchestratorError> {
    tracing::debug!(command = %line, "exec");
    let output = line
        .to_command()
        .output()
        .await
        .map_err(|source| OrchestratorError::Spawn {
            command: line.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(OrchestratorError::CommandFailed {
            command: line.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Running", default)]
    running: bool,
    #[serde(rename = "Health", alias = "Healthcheck", default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
struct InspectHealth {
    #[serde(rename = "Status", default)]
    status: String,
}

/// Map `inspect --format '{{json .State}}'` output to a [`HealthStatus`].
pub(crate) fn parse_state(stdout: &str) -> Result<HealthStatus, OrchestratorError> {
    let state: InspectState = serde_json::from_str(stdout.trim())
        .map_err(|e| OrchestratorError::Parse(format!("container state: {e}")))?;

    let health = state
        .health
        .map(|h| h.status.to_ascii_lowercase())
        .unwrap_or_default();
    let status = match health.as_str() {
        "healthy" => HealthStatus::Healthy,
        "starting" => HealthStatus::Starting,
        "unhealthy" => HealthStatus::Unhealthy,
        _ if state.running || state.status.eq_ignore_ascii_case("running") => {
            HealthStatus::Running
        }
        _ => HealthStatus::Stopped,
    };
    Ok(status)
}

fn on_path(binary: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(binary);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}

fn podman_compose_plugin_available() -> bool {
    std::process::Command::new("podman")
        .args(["compose", "version"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
