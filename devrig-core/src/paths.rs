use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yaml";
pub const INVENTORY_FILE: &str = "inventory.yaml";

pub fn devrig_root(home: &Path) -> PathBuf {
    home.join(".devrig")
}

pub fn config_path(home: &Path) -> PathBuf {
    devrig_root(home).join(CONFIG_FILE)
}

pub fn default_inventory_path(home: &Path) -> PathBuf {
    devrig_root(home).join(INVENTORY_FILE)
}

pub fn default_compose_dir(home: &Path) -> PathBuf {
    devrig_root(home).join("compose")
}

pub fn default_backup_dir(home: &Path) -> PathBuf {
    devrig_root(home).join("backups")
}

pub fn default_apps_dir(home: &Path) -> PathBuf {
    home.join("devrig").join("apps")
}

/// The platform's system hosts file.
pub fn system_hosts_file() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}
