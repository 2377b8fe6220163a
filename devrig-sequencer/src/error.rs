use thiserror::Error;

/// Failures reported by a [`ContainerOrchestrator`](crate::ContainerOrchestrator).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {}", exit_label(.status), .stderr.trim())]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("unexpected runtime output: {0}")]
    Parse(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "signal".to_string(),
    }
}

/// Fatal sequencing errors. Per-unit failures are recorded in the
/// [`SequenceReport`](crate::SequenceReport) instead.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("unknown category '{name}' (known: {})", .known.join(", "))]
    InvalidCategory { name: String, known: Vec<String> },

    #[error("container infrastructure unavailable: {0}")]
    InfrastructureUnavailable(#[source] OrchestratorError),

    #[error("network '{network}' could not be ensured: {source}")]
    NetworkUnavailable {
        network: String,
        #[source]
        source: OrchestratorError,
    },
}

/// Errors from tearing down supervised foreground units.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("I/O error while supervising '{unit}': {source}")]
    Io {
        unit: String,
        #[source]
        source: std::io::Error,
    },

    #[error("supervisor task for '{unit}' failed: {reason}")]
    Join { unit: String, reason: String },
}
