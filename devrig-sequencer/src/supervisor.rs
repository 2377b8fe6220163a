//! Owns foreground unit processes for the lifetime of a run.
//!
//! Each child gets its own task that races the process exit against the
//! shared shutdown signal. On shutdown the child is asked to stop (SIGTERM on
//! unix), given `grace` to exit, and killed after that.

use std::time::Duration;

use serde::Serialize;
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::SupervisorError;

pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "code")]
pub enum ExitOutcome {
    /// Exited on its own before shutdown was requested.
    Exited(Option<i32>),
    /// Stopped within the grace period after being asked to.
    Terminated,
    /// Force-killed after the grace period elapsed.
    Killed,
}

type SupervisedTask = JoinHandle<Result<ExitOutcome, std::io::Error>>;

pub struct Supervisor {
    grace: Duration,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(String, SupervisedTask)>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE)
    }
}

impl Supervisor {
    pub fn new(grace: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            grace,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(name, _)| name.as_str())
    }

    /// Take ownership of `child`. It is torn down by [`shutdown`](Self::shutdown).
    pub fn supervise(&mut self, unit: impl Into<String>, child: Child) {
        let unit = unit.into();
        tracing::info!(unit = %unit, pid = ?child.id(), "supervising foreground unit");
        let shutdown_rx = self.shutdown_tx.subscribe();
        let grace = self.grace;
        let task_unit = unit.clone();
        let handle = tokio::spawn(async move {
            let outcome = watch_child(child, shutdown_rx, grace).await;
            match &outcome {
                Ok(result) => tracing::debug!(unit = %task_unit, ?result, "foreground unit ended"),
                Err(err) => tracing::warn!(unit = %task_unit, error = %err, "foreground unit wait failed"),
            }
            outcome
        });
        self.tasks.push((unit, handle));
    }

    /// Wait until every supervised process has exited on its own.
    pub async fn wait(self) -> Vec<(String, Result<ExitOutcome, SupervisorError>)> {
        let mut results = Vec::with_capacity(self.tasks.len());
        for (unit, handle) in self.tasks {
            let result = handle_join(&unit, handle.await);
            results.push((unit, result));
        }
        results
    }

    /// Signal every supervised process to stop and wait for all of them.
    pub async fn shutdown(self) -> Vec<(String, Result<ExitOutcome, SupervisorError>)> {
        if !self.tasks.is_empty() {
            tracing::info!(units = self.tasks.len(), "stopping foreground units");
        }
        let _ = self.shutdown_tx.send(true);
        self.wait().await
    }
}

async fn watch_child(
    mut child: Child,
    mut shutdown_rx: watch::Receiver<bool>,
    grace: Duration,
) -> Result<ExitOutcome, std::io::Error> {
    if !*shutdown_rx.borrow() {
        tokio::select! {
            status = child.wait() => return Ok(ExitOutcome::Exited(status?.code())),
            // A dropped sender also means shutdown.
            _ = shutdown_rx.changed() => {}
        }
    }

    request_stop(&mut child);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            status?;
            Ok(ExitOutcome::Terminated)
        }
        Err(_) => {
            child.kill().await?;
            Ok(ExitOutcome::Killed)
        }
    }
}

#[cfg(unix)]
fn request_stop(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: kill(2) with a pid we spawned and still own.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    let _ = child.start_kill();
}

fn handle_join(
    unit: &str,
    result: Result<Result<ExitOutcome, std::io::Error>, tokio::task::JoinError>,
) -> Result<ExitOutcome, SupervisorError> {
    match result {
        Ok(inner) => inner.map_err(|source| SupervisorError::Io {
            unit: unit.to_string(),
            source,
        }),
        Err(err) => Err(SupervisorError::Join {
            unit: unit.to_string(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::process::Command;

    fn spawn(script: &str) -> Child {
        Command::new("sh")
            .args(["-c", script])
            .kill_on_drop(true)
            .spawn()
            .expect("spawn sh")
    }

    #[tokio::test]
    async fn child_exiting_on_its_own_is_reported() {
        let mut supervisor = Supervisor::new(Duration::from_secs(5));
        supervisor.supervise("quick", spawn("exit 3"));
        let results = supervisor.wait().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "quick");
        assert_eq!(*results[0].1.as_ref().unwrap(), ExitOutcome::Exited(Some(3)));
    }

    #[tokio::test]
    async fn shutdown_terminates_within_grace() {
        let mut supervisor = Supervisor::new(Duration::from_secs(5));
        supervisor.supervise("sleeper", spawn("exec sleep 30"));
        assert_eq!(supervisor.len(), 1);

        let started = std::time::Instant::now();
        let results = supervisor.shutdown().await;
        assert_eq!(*results[0].1.as_ref().unwrap(), ExitOutcome::Terminated);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn shutdown_kills_after_grace_when_term_is_ignored() {
        let mut supervisor = Supervisor::new(Duration::from_millis(200));
        supervisor.supervise("stubborn", spawn("trap '' TERM; while true; do sleep 1; done"));
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let results = supervisor.shutdown().await;
        assert_eq!(*results[0].1.as_ref().unwrap(), ExitOutcome::Killed);
    }

    #[tokio::test]
    async fn empty_supervisor_shuts_down_immediately() {
        let supervisor = Supervisor::default();
        assert!(supervisor.is_empty());
        assert!(supervisor.shutdown().await.is_empty());
    }
}
