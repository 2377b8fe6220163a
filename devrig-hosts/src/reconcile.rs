//! Scan / add / remove / update-all against the live hosts file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use devrig_core::types::LOOPBACK;

use crate::desired::{DesiredHostsState, Section};
use crate::diff;
use crate::document::{HostsDocument, ManagedBlock};
use crate::error::HostsError;
use crate::writer::{self, WriteOptions, WriteResult};

/// What a reconciliation should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Read-only comparison.
    Scan,
    /// Ensure one name is mapped.
    Add(String),
    /// Drop one name from the managed block.
    Remove(String),
    /// Replace the managed block with the desired state.
    UpdateAll,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Scan => f.write_str("scan"),
            Mode::Add(name) => write!(f, "add {name}"),
            Mode::Remove(name) => write!(f, "remove {name}"),
            Mode::UpdateAll => f.write_str("update"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    pub dry_run: bool,
    pub backup: bool,
    pub verbose: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub mode: String,
    pub dry_run: bool,
    pub hosts_file: PathBuf,
    /// Desired hostnames not mapped anywhere in the live file.
    pub missing: Vec<String>,
    /// Managed hostnames that are no longer desired.
    pub stale: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub write: WriteResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
    pub warnings: Vec<String>,
    /// Unified diff of the change (or of a full update, for `scan`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl ReconcileReport {
    pub fn in_sync(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty()
    }
}

pub struct Reconciler {
    hosts_file: PathBuf,
    backup_dir: PathBuf,
}

impl Reconciler {
    pub fn new(hosts_file: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            hosts_file: hosts_file.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn hosts_file(&self) -> &Path {
        &self.hosts_file
    }

    /// Read and parse the live file.
    pub fn read(&self) -> Result<(String, HostsDocument), HostsError> {
        let live = std::fs::read_to_string(&self.hosts_file).map_err(|source| {
            HostsError::HostsFileUnreadable {
                path: self.hosts_file.clone(),
                source,
            }
        })?;
        let doc = HostsDocument::parse(&live, &self.hosts_file)?;
        Ok((live, doc))
    }

    pub fn apply(
        &self,
        desired: &DesiredHostsState,
        mode: &Mode,
        options: &ApplyOptions,
    ) -> Result<ReconcileReport, HostsError> {
        let (live, mut doc) = self.read()?;
        let mapped = doc.mapped_hostnames();
        let managed = doc.managed_hostnames();
        let wanted = desired.mappings();

        let mut report = ReconcileReport {
            mode: mode.to_string(),
            dry_run: options.dry_run,
            hosts_file: self.hosts_file.clone(),
            missing: wanted
                .keys()
                .filter(|h| !mapped.contains(**h))
                .map(|h| h.to_string())
                .collect(),
            stale: managed
                .iter()
                .filter(|h| !wanted.contains_key(h.as_str()))
                .cloned()
                .collect(),
            added: Vec::new(),
            removed: Vec::new(),
            write: WriteResult::NotAttempted,
            backup: None,
            warnings: desired.warnings.clone(),
            diff: None,
        };
        tracing::debug!(
            "{}: {} missing, {} stale",
            self.hosts_file.display(),
            report.missing.len(),
            report.stale.len()
        );

        match mode {
            Mode::Scan => {
                let mut updated = doc.clone();
                updated.managed = Some(ManagedBlock::from_desired(desired));
                report.diff = diff::preview(&live, &updated.render(), "hosts");
                return Ok(report);
            }
            Mode::UpdateAll => {
                report.added = wanted
                    .keys()
                    .filter(|h| !managed.contains(**h))
                    .map(|h| h.to_string())
                    .collect();
                report.removed = report.stale.clone();
                doc.managed = Some(ManagedBlock::from_desired(desired));
            }
            Mode::Add(name) => {
                let hostname = desired.resolve_name(name)?;
                if mapped.contains(&hostname) {
                    if options.verbose {
                        return Err(HostsError::AlreadyPresent { hostname });
                    }
                    tracing::debug!("{} already present; nothing to add", hostname);
                } else {
                    let (section, ip) = desired
                        .section_of(&hostname)
                        .unwrap_or((Section::Projects, LOOPBACK));
                    doc.managed_mut().insert(section, ip, &hostname);
                    report.added.push(hostname);
                }
            }
            Mode::Remove(name) => {
                let hostname = desired.resolve_name(name)?;
                let removed = doc
                    .managed
                    .as_mut()
                    .map(|block| block.remove(&hostname))
                    .unwrap_or(false);
                if removed {
                    report.removed.push(hostname);
                } else {
                    tracing::debug!("{} not in managed block; nothing to remove", hostname);
                }
            }
        }

        let rendered = doc.render();
        if options.dry_run {
            report.diff = diff::preview(&live, &rendered, "hosts");
        }
        let backup_dir = options.backup.then_some(self.backup_dir.as_path());
        let outcome = writer::write_hosts(
            &self.hosts_file,
            &live,
            &rendered,
            &WriteOptions {
                backup_dir,
                dry_run: options.dry_run,
            },
        )?;
        report.write = outcome.result;
        report.backup = outcome.backup;
        report.warnings.extend(outcome.warnings);
        Ok(report)
    }
}
