use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const HOSTS: &str = "127.0.0.1 localhost\n::1 localhost\n";

fn devrig_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("devrig"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("DEVRIG_RUNTIME")
        .env_remove("DEVRIG_USE_SUDO");
    cmd
}

/// A home with config, inventory, compose descriptors, one project and a
/// private hosts file.
struct Workspace {
    home: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let home = TempDir::new().expect("home");
        let root = home.path().join(".devrig");
        fs::create_dir_all(root.join("compose/database")).unwrap();
        fs::create_dir_all(root.join("compose/backend")).unwrap();
        fs::write(root.join("compose/database/pg.yml"), "services: {}\n").unwrap();
        fs::write(root.join("compose/backend/api.yml"), "services: {}\n").unwrap();
        fs::write(
            root.join("inventory.yaml"),
            "categories:\n  - name: database\n    units:\n      - name: pg\n        hostnames: [pg.test]\n  - name: backend\n    units:\n      - name: api\n",
        )
        .unwrap();
        fs::write(home.path().join("hosts"), HOSTS).unwrap();
        fs::write(
            root.join("config.yaml"),
            format!(
                "hosts_file: {}\nruntime: docker\n",
                home.path().join("hosts").display()
            ),
        )
        .unwrap();
        fs::create_dir_all(home.path().join("devrig/apps/foo")).unwrap();
        Self { home }
    }

    fn cmd(&self) -> Command {
        devrig_cmd(self.home.path())
    }

    fn hosts(&self) -> String {
        fs::read_to_string(self.home.path().join("hosts")).unwrap()
    }

    fn backups(&self) -> Vec<PathBuf> {
        fs::read_dir(self.home.path().join(".devrig/backups"))
            .map(|d| d.filter_map(Result::ok).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    fn compose(&self, relative: &str) -> String {
        self.home
            .path()
            .join(".devrig/compose")
            .join(relative)
            .display()
            .to_string()
    }
}

// ---------------------------------------------------------------------------
// services
// ---------------------------------------------------------------------------

#[test]
fn services_dry_run_prints_commands_in_category_order() {
    let ws = Workspace::new();

    let output = ws
        .cmd()
        .args(["services", "start", "--dry-run"])
        .output()
        .expect("run devrig");
    assert!(
        output.status.success(),
        "command failed: status={} stderr={}",
        output.status,
        String::from_utf8_lossy(&output.stderr),
    );
    let stdout = String::from_utf8(output.stdout).unwrap();

    let pg = format!("docker compose -f {} up -d", ws.compose("database/pg.yml"));
    let api = format!("docker compose -f {} up -d", ws.compose("backend/api.yml"));
    let pg_at = stdout.find(&pg).expect("pg command");
    let api_at = stdout.find(&api).expect("api command");
    assert!(pg_at < api_at, "database must start before backend");
    assert!(stdout.contains("[dry-run] docker network create microservices-net"));
    assert!(stdout.contains("2 unit(s) would be started"));
}

#[test]
fn services_dry_run_json_report() {
    let ws = Workspace::new();

    let output = ws
        .cmd()
        .args(["services", "restart", "--dry-run", "--json", "--only", "backend"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");

    assert_eq!(report["mode"], "restart");
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["counts"]["would_execute"], 1);
    let unit = &report["categories"][0]["units"][0];
    assert_eq!(unit["name"], "api");
    assert_eq!(unit["action"], "would_execute");
    assert_eq!(unit["commands"].as_array().unwrap().len(), 2);
}

#[test]
fn services_unknown_category_is_fatal() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["services", "start", "--dry-run", "--skip", "cache"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown category 'cache'"));
}

#[test]
fn services_list_shows_start_order() {
    let ws = Workspace::new();

    let output = ws.cmd().args(["services", "list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let inventory: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(inventory["network"], "microservices-net");
    assert_eq!(inventory["categories"][0]["name"], "database");
    assert_eq!(inventory["categories"][1]["units"][0], "api");
}

// ---------------------------------------------------------------------------
// hosts
// ---------------------------------------------------------------------------

#[test]
fn hosts_scan_reports_without_writing() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["hosts", "scan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("missing foo.test"))
        .stdout(predicate::str::contains("missing pg.test"));
    assert_eq!(ws.hosts(), HOSTS);
    assert!(ws.backups().is_empty());
}

#[test]
fn hosts_update_dry_run_previews_diff() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["hosts", "update", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+# BEGIN devrig managed hosts"))
        .stdout(predicate::str::contains("+127.0.0.1 foo.test"))
        .stdout(predicate::str::contains("would be rewritten"));
    assert_eq!(ws.hosts(), HOSTS);
}

#[test]
fn hosts_update_writes_once_with_backup() {
    let ws = Workspace::new();

    ws.cmd().args(["hosts", "update"]).assert().success();
    let written = ws.hosts();
    assert!(written.starts_with(HOSTS));
    assert!(written.contains("127.0.0.1 foo.test\n"));
    assert!(written.contains("127.0.0.1 pg.test\n"));
    assert_eq!(ws.backups().len(), 1);

    ws.cmd()
        .args(["hosts", "update"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));
    assert_eq!(ws.hosts(), written);
    assert_eq!(ws.backups().len(), 1);
}

#[test]
fn hosts_add_and_remove_single_names() {
    let ws = Workspace::new();

    ws.cmd()
        .args(["hosts", "add", "blog", "--no-backup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+ blog.test"));
    assert!(ws.hosts().contains("127.0.0.1 blog.test\n"));
    assert!(ws.backups().is_empty());

    ws.cmd()
        .args(["hosts", "add", "blog", "--verbose"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already present"));

    ws.cmd()
        .args(["hosts", "remove", "blog", "--no-backup"])
        .assert()
        .success();
    assert!(!ws.hosts().contains("blog.test"));

    ws.cmd()
        .args(["hosts", "remove", "blog", "--no-backup"])
        .assert()
        .success();
}
