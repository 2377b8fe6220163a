//! Domain types shared by the classifier, sequencer and hosts reconciler.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Address every project hostname and most service hostnames resolve to.
pub const LOOPBACK: &str = "127.0.0.1";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a service unit in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceName(pub String);

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ServiceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed name for a startup category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryName(pub String);

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CategoryName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CategoryName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Runtime a project directory was classified as.
///
/// `unknown` is deliberately not a variant: an unclassified project is
/// represented by the detector's `Classification::Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeTag {
    Php,
    Go,
    Rust,
    Python,
    Node,
}

impl RuntimeTag {
    /// Every declared tag, in classification priority order.
    pub fn all() -> &'static [RuntimeTag] {
        &[
            RuntimeTag::Php,
            RuntimeTag::Go,
            RuntimeTag::Rust,
            RuntimeTag::Python,
            RuntimeTag::Node,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeTag::Php => "php",
            RuntimeTag::Go => "go",
            RuntimeTag::Rust => "rust",
            RuntimeTag::Python => "python",
            RuntimeTag::Node => "node",
        }
    }
}

impl fmt::Display for RuntimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuntimeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuntimeTag::all()
            .iter()
            .copied()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown runtime '{s}'; expected: php, go, rust, python, node")
            })
    }
}

/// Container engine the compose commands are issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Podman,
    Docker,
}

impl ContainerRuntime {
    pub fn binary(self) -> &'static str {
        match self {
            ContainerRuntime::Podman => "podman",
            ContainerRuntime::Docker => "docker",
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

impl FromStr for ContainerRuntime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "podman" => Ok(ContainerRuntime::Podman),
            "docker" => Ok(ContainerRuntime::Docker),
            other => Err(format!("unknown container runtime '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Inventory structs
// ---------------------------------------------------------------------------

/// One deployable backend component addressed by a compose descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUnit {
    pub name: ServiceName,
    pub category: CategoryName,
    /// Absolute path to the compose descriptor. May not exist on disk; the
    /// sequencer treats a missing file as a per-unit warning.
    pub compose: PathBuf,
    /// Hostnames this unit answers on, written into the hosts file.
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Address the hostnames resolve to.
    #[serde(default = "default_address")]
    pub address: String,
    /// Container name used for health inspection; defaults to the unit name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Launch attached (`compose up` without `-d`) under the supervisor.
    #[serde(default)]
    pub foreground: bool,
}

impl ServiceUnit {
    /// Convenience constructor for a detached unit without hostnames.
    pub fn new(
        name: impl Into<ServiceName>,
        category: impl Into<CategoryName>,
        compose: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            compose: compose.into(),
            hostnames: Vec::new(),
            address: default_address(),
            container: None,
            foreground: false,
        }
    }

    pub fn container_name(&self) -> &str {
        self.container.as_deref().unwrap_or(&self.name.0)
    }
}

/// A named, ordered group of units sharing a startup phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: CategoryName,
    #[serde(default)]
    pub units: Vec<ServiceUnit>,
}

/// The static service inventory: categories in their global start order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInventory {
    /// Shared container network every unit joins.
    pub network: String,
    pub categories: Vec<Category>,
}

impl ServiceInventory {
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name.0 == name)
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.0.as_str()).collect()
    }

    /// All units in declared start order.
    pub fn units(&self) -> impl Iterator<Item = &ServiceUnit> {
        self.categories.iter().flat_map(|c| c.units.iter())
    }
}

fn default_address() -> String {
    LOOPBACK.to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(ServiceName::from("postgres").to_string(), "postgres");
        assert_eq!(CategoryName::from("database").to_string(), "database");
    }

    #[test]
    fn runtime_tag_parse_roundtrips_display() {
        for tag in RuntimeTag::all() {
            let parsed: RuntimeTag = tag.to_string().parse().expect("parse");
            assert_eq!(parsed, *tag);
        }
        assert!("unknown".parse::<RuntimeTag>().is_err());
    }

    #[test]
    fn container_runtime_parse_is_case_insensitive() {
        assert_eq!(
            "Podman".parse::<ContainerRuntime>().unwrap(),
            ContainerRuntime::Podman
        );
        assert!("lxc".parse::<ContainerRuntime>().is_err());
    }

    #[test]
    fn container_name_defaults_to_unit_name() {
        let mut unit = ServiceUnit::new("pg", "database", "/compose/database/pg.yml");
        assert_eq!(unit.container_name(), "pg");
        unit.container = Some("devrig-postgres".into());
        assert_eq!(unit.container_name(), "devrig-postgres");
    }

    #[test]
    fn unit_deserializes_with_defaults() {
        let yaml = "name: redis\ncategory: database\ncompose: /x/redis.yml\n";
        let unit: ServiceUnit = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(unit.address, LOOPBACK);
        assert!(unit.hostnames.is_empty());
        assert!(!unit.foreground);
    }
}
