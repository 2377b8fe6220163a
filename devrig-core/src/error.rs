//! Error types for devrig-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or discovering the service inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Underlying I/O failure, annotated with the path being read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse inventory at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Neither an inventory file nor a compose directory could be found.
    #[error("inventory not found at {path}")]
    NotFound { path: PathBuf },

    /// The same category name is declared twice.
    #[error("category '{name}' is declared more than once")]
    DuplicateCategory { name: String },

    /// The same unit name is declared twice across the inventory.
    #[error("service unit '{name}' is declared more than once")]
    DuplicateUnit { name: String },
}

/// Errors from loading `~/.devrig/config.yaml` and its environment overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.devrig/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// An environment override carried a value we do not understand.
    #[error("{var}={value} invalid — {expected}")]
    InvalidOverride {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> InventoryError {
    InventoryError::Io {
        path: path.into(),
        source,
    }
}
