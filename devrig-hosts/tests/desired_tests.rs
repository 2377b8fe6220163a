use std::fs;

use devrig_core::types::{Category, CategoryName, ServiceInventory, ServiceUnit};
use devrig_hosts::{compute_desired_state, DesiredOptions, HostEntry};
use tempfile::TempDir;

fn inventory(units: Vec<ServiceUnit>) -> ServiceInventory {
    ServiceInventory {
        network: "microservices-net".into(),
        categories: vec![Category {
            name: CategoryName::from("proxy"),
            units,
        }],
    }
}

fn unit(name: &str, address: &str, hostnames: &[&str]) -> ServiceUnit {
    let mut unit = ServiceUnit::new(name, "proxy", format!("/c/{name}.yml"));
    unit.address = address.to_string();
    unit.hostnames = hostnames.iter().map(|h| h.to_string()).collect();
    unit
}

fn apps(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        fs::create_dir_all(dir.path().join(name)).unwrap();
    }
    dir
}

#[test]
fn projects_become_loopback_hostnames_and_exclusions_apply() {
    let root = apps(&["foo", "My_App", "node_modules", ".git", "vendor", "target"]);
    fs::write(root.path().join("notes.txt"), "not a project").unwrap();

    let state = compute_desired_state(
        &inventory(vec![]),
        &[root.path().to_path_buf()],
        &DesiredOptions::default(),
    );

    assert_eq!(
        state.projects,
        vec![HostEntry {
            ip: "127.0.0.1".into(),
            hostnames: vec!["foo.test".into(), "my-app.test".into()],
        }]
    );
    assert!(state.infrastructure.is_empty());
    assert!(state.warnings.is_empty());
}

#[test]
fn derivation_is_deterministic() {
    let root = apps(&["zeta", "alpha", "mid"]);
    let inv = inventory(vec![unit("nginx", "127.0.0.1", &["b.test", "a.test"])]);
    let roots = [root.path().to_path_buf()];
    let options = DesiredOptions::default();

    let first = compute_desired_state(&inv, &roots, &options);
    let second = compute_desired_state(&inv, &roots, &options);

    assert_eq!(first, second);
    assert_eq!(first.infrastructure[0].hostnames, vec!["a.test", "b.test"]);
    assert_eq!(
        first.projects[0].hostnames,
        vec!["alpha.test", "mid.test", "zeta.test"]
    );
}

#[test]
fn lines_hold_at_most_eight_hostnames() {
    let names: Vec<String> = (0..11).map(|i| format!("p{i:02}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let root = apps(&refs);

    let state = compute_desired_state(
        &inventory(vec![]),
        &[root.path().to_path_buf()],
        &DesiredOptions::default(),
    );

    let sizes: Vec<usize> = state.projects.iter().map(|e| e.hostnames.len()).collect();
    assert_eq!(sizes, vec![8, 3]);
}

#[test]
fn infrastructure_wins_duplicate_hostnames() {
    let root = apps(&["api"]);
    let inv = inventory(vec![
        unit("gateway", "10.0.0.2", &["api.test", "gw.test"]),
        unit("proxy", "127.0.0.1", &["gw.test"]),
    ]);

    let state = compute_desired_state(
        &inv,
        &[root.path().to_path_buf()],
        &DesiredOptions::default(),
    );

    let mappings = state.mappings();
    assert_eq!(mappings["api.test"], "10.0.0.2");
    assert_eq!(mappings["gw.test"], "10.0.0.2");
    assert!(state.projects.is_empty());
    assert_eq!(state.warnings.len(), 2);
}

#[test]
fn same_address_duplicates_collapse_silently() {
    let root = apps(&["pg"]);
    let inv = inventory(vec![
        unit("postgres", "127.0.0.1", &["pg.test"]),
        unit("pgadmin", "127.0.0.1", &["pg.test", "PGADMIN.test"]),
    ]);

    let state = compute_desired_state(
        &inv,
        &[root.path().to_path_buf()],
        &DesiredOptions::default(),
    );

    assert_eq!(
        state.infrastructure[0].hostnames,
        vec!["pg.test", "pgadmin.test"]
    );
    assert!(state.projects.is_empty());
    assert!(state.warnings.is_empty());
}

#[test]
fn custom_domain_and_missing_root() {
    let root = apps(&["shop"]);
    let state = compute_desired_state(
        &inventory(vec![]),
        &[root.path().to_path_buf(), root.path().join("does-not-exist")],
        &DesiredOptions {
            domain: ".local".into(),
        },
    );
    assert_eq!(state.projects[0].hostnames, vec!["shop.local"]);
}

#[test]
fn invalid_declared_hostnames_are_skipped_with_warning() {
    let inv = inventory(vec![unit("bad", "127.0.0.1", &["under_score.test", "ok.test"])]);
    let state = compute_desired_state(&inv, &[], &DesiredOptions::default());
    assert_eq!(state.infrastructure[0].hostnames, vec!["ok.test"]);
    assert_eq!(state.warnings.len(), 1);
}
