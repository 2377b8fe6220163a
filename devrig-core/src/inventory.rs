//! Static service inventory.
//!
//! # Sources
//!
//! ```text
//! ~/.devrig/
//!   inventory.yaml            (explicit declaration — wins when present)
//!   compose/
//!     <category>/
//!       <unit>.yml            (discovered when no inventory.yaml exists)
//! ```
//!
//! The declaration format is:
//!
//! ```yaml
//! network: microservices-net
//! categories:
//!   - name: database
//!     units:
//!       - name: postgres
//!         compose: database/postgres.yml
//!         hostnames: [postgres.test]
//! ```
//!
//! Relative `compose` paths resolve against the compose directory.
//!
//! # API pattern
//!
//! Loading never touches `dirs::home_dir()`; callers pass the resolved paths
//! from [`crate::config::Config`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{io_err, InventoryError};
use crate::types::{Category, CategoryName, ServiceInventory, ServiceName, ServiceUnit};

/// Start order used when categories are discovered from the compose tree.
/// Categories not listed here start afterwards, sorted by name.
pub const DEFAULT_CATEGORY_ORDER: &[&str] = &[
    "database",
    "storage",
    "dbms",
    "erp",
    "security",
    "registry",
    "gateway",
    "proxy",
    "management",
    "backend",
    "ci",
    "project",
    "mail",
    "exporters",
    "analytics",
    "messaging",
    "search",
    "workflow",
    "docs",
    "testing",
    "collaboration",
    "ai",
    "support",
];

pub const DEFAULT_NETWORK: &str = "microservices-net";

// ---------------------------------------------------------------------------
// 1. Declaration file shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    categories: Vec<CategoryDecl>,
}

#[derive(Debug, Deserialize)]
struct CategoryDecl {
    name: String,
    #[serde(default)]
    units: Vec<UnitDecl>,
}

#[derive(Debug, Deserialize)]
struct UnitDecl {
    name: String,
    /// Defaults to `<category>/<name>.yml`.
    #[serde(default)]
    compose: Option<PathBuf>,
    #[serde(default)]
    hostnames: Vec<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    container: Option<String>,
    #[serde(default)]
    foreground: bool,
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load an explicit inventory declaration.
///
/// Returns `InventoryError::NotFound` if absent,
/// `InventoryError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path, compose_dir: &Path) -> Result<ServiceInventory, InventoryError> {
    if !path.exists() {
        return Err(InventoryError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse(&contents, path, compose_dir)
}

/// Parse an inventory declaration already read into memory.
pub fn parse(
    contents: &str,
    source: &Path,
    compose_dir: &Path,
) -> Result<ServiceInventory, InventoryError> {
    let file: InventoryFile = serde_yaml::from_str(contents).map_err(|e| InventoryError::Parse {
        path: source.to_path_buf(),
        source: e,
    })?;

    let mut seen_categories = HashSet::new();
    let mut seen_units = HashSet::new();
    let mut categories = Vec::with_capacity(file.categories.len());

    for decl in file.categories {
        if !seen_categories.insert(decl.name.clone()) {
            return Err(InventoryError::DuplicateCategory { name: decl.name });
        }
        let category = CategoryName::from(decl.name.clone());
        let mut units = Vec::with_capacity(decl.units.len());
        for unit in decl.units {
            if !seen_units.insert(unit.name.clone()) {
                return Err(InventoryError::DuplicateUnit { name: unit.name });
            }
            let compose = unit
                .compose
                .unwrap_or_else(|| PathBuf::from(&decl.name).join(format!("{}.yml", unit.name)));
            let mut resolved = ServiceUnit::new(
                ServiceName::from(unit.name),
                category.clone(),
                resolve(compose_dir, compose),
            );
            resolved.hostnames = unit.hostnames;
            if let Some(address) = unit.address {
                resolved.address = address;
            }
            resolved.container = unit.container;
            resolved.foreground = unit.foreground;
            units.push(resolved);
        }
        categories.push(Category {
            name: category,
            units,
        });
    }

    Ok(ServiceInventory {
        network: file.network.unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
        categories,
    })
}

// ---------------------------------------------------------------------------
// 3. Discover
// ---------------------------------------------------------------------------

/// Build an inventory from `<compose_dir>/<category>/*.yml`.
///
/// Categories follow [`DEFAULT_CATEGORY_ORDER`], then any others by name.
/// Units inside a category are sorted by file name.
pub fn discover_at(compose_dir: &Path) -> Result<ServiceInventory, InventoryError> {
    if !compose_dir.is_dir() {
        return Err(InventoryError::NotFound {
            path: compose_dir.to_path_buf(),
        });
    }

    let mut found = BTreeMap::new();
    for entry in std::fs::read_dir(compose_dir).map_err(|e| io_err(compose_dir, e))? {
        let entry = entry.map_err(|e| io_err(compose_dir, e))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dir && !name.starts_with('.') {
            found.insert(name, entry.path());
        }
    }

    let mut ordered = Vec::new();
    for name in DEFAULT_CATEGORY_ORDER {
        if let Some(path) = found.remove(*name) {
            ordered.push(((*name).to_string(), path));
        }
    }
    // BTreeMap drains the leftovers sorted by name.
    ordered.extend(found);

    let mut categories = Vec::with_capacity(ordered.len());
    for (name, dir) in ordered {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| io_err(&dir, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_compose_file(p))
            .collect();
        files.sort();

        let units = files
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_string_lossy().into_owned();
                Some(ServiceUnit::new(stem, name.as_str(), path))
            })
            .collect();
        categories.push(Category {
            name: CategoryName::from(name),
            units,
        });
    }

    Ok(ServiceInventory {
        network: DEFAULT_NETWORK.to_string(),
        categories,
    })
}

/// Load `inventory_path` if it exists, otherwise discover from `compose_dir`.
pub fn resolve_at(
    inventory_path: &Path,
    compose_dir: &Path,
) -> Result<ServiceInventory, InventoryError> {
    if inventory_path.exists() {
        tracing::debug!(path = %inventory_path.display(), "loading declared inventory");
        load_at(inventory_path, compose_dir)
    } else {
        tracing::debug!(path = %compose_dir.display(), "discovering inventory from compose tree");
        discover_at(compose_dir)
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn resolve(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn is_compose_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
