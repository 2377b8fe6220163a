pub mod detect;
pub mod hosts;
pub mod services;

use anyhow::{Context, Result};

use devrig_core::inventory::{self, DEFAULT_NETWORK};
use devrig_core::{Config, InventoryError, ServiceInventory};

/// Resolve the service inventory described by `config`.
pub(crate) fn load_inventory(config: &Config) -> Result<ServiceInventory> {
    resolve(config).with_context(|| inventory_context(config))
}

/// Like [`load_inventory`], but a missing inventory is an empty one.
pub(crate) fn load_inventory_or_empty(config: &Config) -> Result<ServiceInventory> {
    match resolve(config) {
        Err(InventoryError::NotFound { path }) => {
            tracing::warn!(path = %path.display(), "no service inventory; only projects are considered");
            Ok(ServiceInventory {
                network: config.network.clone(),
                categories: Vec::new(),
            })
        }
        other => other.with_context(|| inventory_context(config)),
    }
}

fn resolve(config: &Config) -> Result<ServiceInventory, InventoryError> {
    let mut inventory = inventory::resolve_at(&config.inventory, &config.compose_dir)?;
    if config.network != DEFAULT_NETWORK {
        inventory.network = config.network.clone();
    }
    Ok(inventory)
}

fn inventory_context(config: &Config) -> String {
    format!(
        "failed to load service inventory (looked for {} and {})",
        config.inventory.display(),
        config.compose_dir.display()
    )
}
