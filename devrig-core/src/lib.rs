//! devrig core library — domain types, service inventory, configuration, errors.
//!
//! - [`types`] — newtypes, runtime tags and inventory structs
//! - [`inventory`] — load a declared inventory or discover one from the compose tree
//! - [`config`] — `~/.devrig/config.yaml` plus environment overrides
//! - [`paths`] — well-known locations under `~/.devrig/`
//! - [`error`] — [`InventoryError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod inventory;
pub mod paths;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, InventoryError};
pub use types::{
    Category, CategoryName, ContainerRuntime, RuntimeTag, ServiceInventory, ServiceName,
    ServiceUnit, LOOPBACK,
};
