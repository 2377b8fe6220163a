//! Category-ordered container startup with optional health gating.

mod error;
pub mod orchestrator;
pub mod report;
pub mod sequencer;
pub mod supervisor;

pub use error::{OrchestratorError, SequenceError, SupervisorError};
pub use orchestrator::{
    CommandLine, ComposeAction, ComposeCli, ComposeFlavor, ContainerOrchestrator, HealthStatus,
};
pub use report::{
    ActionTaken, CategoryReport, HealthOutcome, ReportCounts, RunMode, SequenceReport, UnitReport,
};
pub use sequencer::{SequenceRequest, Sequencer, Timing};
pub use supervisor::{ExitOutcome, Supervisor};
