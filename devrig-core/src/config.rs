//! Operator configuration.
//!
//! Read from `~/.devrig/config.yaml`; every key is optional. After the file is
//! applied, `DEVRIG_RUNTIME` and `DEVRIG_USE_SUDO` override the runtime
//! selection.
//!
//! Every loader has an `_at(home)` form so tests never touch the real home
//! directory.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::inventory::DEFAULT_NETWORK;
use crate::paths;
use crate::types::ContainerRuntime;

pub const ENV_RUNTIME: &str = "DEVRIG_RUNTIME";
pub const ENV_USE_SUDO: &str = "DEVRIG_USE_SUDO";

/// Resolved configuration with all defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory whose children are the application projects.
    pub apps_dir: PathBuf,
    /// Explicit inventory declaration; discovery is used when it is absent.
    pub inventory: PathBuf,
    pub compose_dir: PathBuf,
    pub hosts_file: PathBuf,
    pub backup_dir: PathBuf,
    /// Domain suffix for project hostnames (`foo` -> `foo.test`).
    pub domain: String,
    pub network: String,
    /// `None` means auto-detect on `PATH`.
    pub runtime: Option<ContainerRuntime>,
    pub use_sudo: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    apps_dir: Option<PathBuf>,
    inventory: Option<PathBuf>,
    compose_dir: Option<PathBuf>,
    hosts_file: Option<PathBuf>,
    backup_dir: Option<PathBuf>,
    domain: Option<String>,
    network: Option<String>,
    runtime: Option<ContainerRuntime>,
    use_sudo: Option<bool>,
}

impl Config {
    /// Defaults rooted at `home`.
    pub fn defaults_at(home: &Path) -> Self {
        Self {
            apps_dir: paths::default_apps_dir(home),
            inventory: paths::default_inventory_path(home),
            compose_dir: paths::default_compose_dir(home),
            hosts_file: paths::system_hosts_file(),
            backup_dir: paths::default_backup_dir(home),
            domain: "test".to_string(),
            network: DEFAULT_NETWORK.to_string(),
            runtime: None,
            use_sudo: false,
        }
    }

    /// Load `<home>/.devrig/config.yaml` over the defaults, then apply the
    /// process environment.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file_at(home)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// `load_at` convenience wrapper.
    pub fn load() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Self::load_at(&home)
    }

    /// Load the file only, without environment overrides.
    pub fn from_file_at(home: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::defaults_at(home);
        let path = paths::config_path(home);
        if !path.exists() {
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        // An empty file deserializes to `null`; treat it as "all defaults".
        let file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        };

        let root = paths::devrig_root(home);
        if let Some(p) = file.apps_dir {
            config.apps_dir = expand(&root, p);
        }
        if let Some(p) = file.inventory {
            config.inventory = expand(&root, p);
        }
        if let Some(p) = file.compose_dir {
            config.compose_dir = expand(&root, p);
        }
        if let Some(p) = file.hosts_file {
            config.hosts_file = expand(&root, p);
        }
        if let Some(p) = file.backup_dir {
            config.backup_dir = expand(&root, p);
        }
        if let Some(domain) = file.domain {
            config.domain = domain.trim_start_matches('.').to_string();
        }
        if let Some(network) = file.network {
            config.network = network;
        }
        config.runtime = file.runtime.or(config.runtime);
        config.use_sudo = file.use_sudo.unwrap_or(config.use_sudo);
        Ok(config)
    }

    /// Apply `DEVRIG_RUNTIME` / `DEVRIG_USE_SUDO` from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_RUNTIME).filter(|v| !v.is_empty()) {
            self.runtime = Some(value.parse().map_err(|_| ConfigError::InvalidOverride {
                var: ENV_RUNTIME,
                value,
                expected: "must be 'podman' or 'docker'",
            })?);
        }
        if let Some(value) = lookup(ENV_USE_SUDO) {
            self.use_sudo = value == "true";
        }
        Ok(())
    }
}

/// Relative paths in the config file resolve against `~/.devrig/`; a leading
/// `~/` resolves against the home directory.
fn expand(root: &Path, path: PathBuf) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = root.parent() {
            return home.join(rest);
        }
    }
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}
