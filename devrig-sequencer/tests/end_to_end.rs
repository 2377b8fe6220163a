//! Inventory -> classifier -> sequencer -> desired hosts, in one pass.

mod support;

use std::fs;

use tempfile::TempDir;

use devrig_core::inventory;
use devrig_core::types::RuntimeTag;
use devrig_detector::{classify, Classification};
use devrig_hosts::{compute_desired_state, DesiredOptions};
use devrig_sequencer::{SequenceRequest, Sequencer, Supervisor, Timing};
use support::RecordingOrchestrator;

#[tokio::test]
async fn inventory_to_hosts_round_trip() {
    let root = TempDir::new().unwrap();
    let compose = root.path().join("compose");
    fs::create_dir_all(compose.join("database")).unwrap();
    fs::create_dir_all(compose.join("backend")).unwrap();
    fs::write(compose.join("database/pg.yml"), "services: {}\n").unwrap();
    fs::write(compose.join("backend/api.yml"), "services: {}\n").unwrap();
    let declared = root.path().join("inventory.yaml");
    fs::write(
        &declared,
        "categories:\n  - name: database\n    units:\n      - name: pg\n        hostnames: [pg.test]\n  - name: backend\n    units:\n      - name: api\n        hostnames: [api.test]\n",
    )
    .unwrap();

    let apps = root.path().join("apps");
    fs::create_dir_all(apps.join("foo")).unwrap();
    fs::write(apps.join("foo/go.mod"), "module example.com/foo\n").unwrap();

    // classify
    assert_eq!(
        classify(&apps.join("foo")).unwrap(),
        Classification::Classified(RuntimeTag::Go)
    );

    // sequence
    let inv = inventory::resolve_at(&declared, &compose).unwrap();
    let orch = RecordingOrchestrator::new();
    let report = Sequencer::new(&inv, &orch)
        .with_timing(Timing::immediate())
        .run(&SequenceRequest::default(), &mut Supervisor::default())
        .await
        .unwrap();
    assert_eq!(orch.composed(), vec!["pg", "api"]);
    assert_eq!(report.counts.started, 2);

    // reconcile
    let state = compute_desired_state(&inv, &[apps], &DesiredOptions::default());
    let lines: Vec<String> = state
        .infrastructure
        .iter()
        .chain(&state.projects)
        .map(|e| e.render())
        .collect();
    assert!(lines.contains(&"127.0.0.1 foo.test".to_string()));
    assert!(lines.contains(&"127.0.0.1 api.test pg.test".to_string()));
}
