//! # devrig-hosts
//!
//! Hosts-file reconciliation.
//!
//! [`compute_desired_state`] derives the wanted hostname mappings from the
//! service inventory and the project tree; [`Reconciler::apply`] compares them
//! with the live file and, outside `scan`, rewrites only the managed block
//! through a digest-gated, backed-up write.

pub mod desired;
pub mod diff;
pub mod document;
pub mod error;
pub mod reconcile;
pub mod writer;

pub use desired::{
    compute_desired_state, discover_projects, slugify, DesiredHostsState, DesiredOptions,
    HostEntry, MAX_HOSTNAMES_PER_LINE,
};
pub use document::{HostsDocument, ManagedBlock, BEGIN_MARKER, END_MARKER};
pub use error::HostsError;
pub use reconcile::{ApplyOptions, Mode, ReconcileReport, Reconciler};
pub use writer::{WriteResult, WriteStrategy};
