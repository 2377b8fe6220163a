//! Error types for devrig-hosts.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from hosts reconciliation.
#[derive(Debug, Error)]
pub enum HostsError {
    /// The live hosts file could not be read at all.
    #[error("cannot read hosts file {path}: {source}")]
    HostsFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `BEGIN` marker without its matching `END` marker (or vice versa).
    #[error("hosts file {path} has a malformed managed block: {reason}")]
    MalformedBlock { path: PathBuf, reason: String },

    /// Both the atomic write and the fallback strategy failed.
    #[error("failed to write {path}: {primary}; fallback ({fallback}) also failed: {fallback_error}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        primary: std::io::Error,
        fallback: &'static str,
        fallback_error: String,
    },

    /// `add` of a hostname that is already mapped (verbose mode only).
    #[error("{hostname} is already present in the hosts file")]
    AlreadyPresent { hostname: String },

    #[error("invalid hostname '{name}': {reason}")]
    InvalidHostname { name: String, reason: &'static str },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`HostsError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> HostsError {
    HostsError::Io {
        path: path.into(),
        source,
    }
}
