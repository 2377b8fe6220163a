//! Desired hosts state, derived fresh from the inventory and project tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use devrig_core::types::{ServiceInventory, LOOPBACK};

use crate::error::HostsError;

pub const MAX_HOSTNAMES_PER_LINE: usize = 8;

/// Directory names never treated as projects.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "dist",
    "build",
    "__pycache__",
    "venv",
];

const MAX_LABEL_LEN: usize = 63;
const MAX_HOSTNAME_LEN: usize = 253;

/// One hosts-file line: an address and up to [`MAX_HOSTNAMES_PER_LINE`] names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostEntry {
    pub ip: String,
    pub hostnames: Vec<String>,
}

impl HostEntry {
    pub fn render(&self) -> String {
        format!("{} {}", self.ip, self.hostnames.join(" "))
    }
}

#[derive(Debug, Clone)]
pub struct DesiredOptions {
    /// Suffix for project hostnames, without the leading dot.
    pub domain: String,
}

impl Default for DesiredOptions {
    fn default() -> Self {
        Self {
            domain: "test".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DesiredHostsState {
    pub domain: String,
    pub infrastructure: Vec<HostEntry>,
    pub projects: Vec<HostEntry>,
    /// Names that were skipped or overridden during derivation.
    pub warnings: Vec<String>,
}

impl DesiredHostsState {
    /// hostname -> ip across both sections.
    pub fn mappings(&self) -> BTreeMap<&str, &str> {
        self.infrastructure
            .iter()
            .chain(&self.projects)
            .flat_map(|e| e.hostnames.iter().map(move |h| (h.as_str(), e.ip.as_str())))
            .collect()
    }

    /// Resolve an operator-supplied name: a dotted name is taken as a
    /// hostname, a bare name is slugged and suffixed with the domain.
    pub fn resolve_name(&self, name: &str) -> Result<String, HostsError> {
        let name = name.trim();
        if name.contains('.') {
            let hostname = name.to_ascii_lowercase();
            validate_hostname(&hostname)?;
            return Ok(hostname);
        }
        let slug = slugify(name).ok_or_else(|| HostsError::InvalidHostname {
            name: name.to_string(),
            reason: "contains no DNS-safe characters",
        })?;
        Ok(format!("{slug}.{}", self.domain))
    }

    pub(crate) fn section_of<'s>(&'s self, hostname: &str) -> Option<(Section, &'s str)> {
        let find = |entries: &'s [HostEntry]| -> Option<&'s str> {
            entries
                .iter()
                .find(|e| e.hostnames.iter().any(|h| h == hostname))
                .map(|e| e.ip.as_str())
        };
        find(&self.infrastructure)
            .map(|ip| (Section::Infrastructure, ip))
            .or_else(|| find(&self.projects).map(|ip| (Section::Projects, ip)))
    }
}

/// Which part of the managed block a hostname belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Infrastructure,
    Projects,
}

/// Derive the desired state.
///
/// `project_roots` are directories whose immediate children are projects.
/// Missing roots are ignored. The result depends only on the inventory, the
/// directory listing and `options`.
pub fn compute_desired_state(
    inventory: &ServiceInventory,
    project_roots: &[PathBuf],
    options: &DesiredOptions,
) -> DesiredHostsState {
    let domain = options.domain.trim_start_matches('.').to_ascii_lowercase();
    let mut warnings = Vec::new();
    let mut claimed: BTreeMap<String, String> = BTreeMap::new();

    let mut infra_pairs = Vec::new();
    for unit in inventory.units() {
        for raw in &unit.hostnames {
            let hostname = raw.trim().to_ascii_lowercase();
            if let Err(err) = validate_hostname(&hostname) {
                tracing::warn!("skipping hostname of unit {}: {}", unit.name, err);
                warnings.push(err.to_string());
                continue;
            }
            match claimed.get(&hostname) {
                Some(ip) if *ip != unit.address => {
                    let msg = format!(
                        "{hostname} declared with {} by {} but already mapped to {ip}; keeping {ip}",
                        unit.address, unit.name
                    );
                    tracing::warn!("{}", msg);
                    warnings.push(msg);
                }
                Some(_) => {}
                None => {
                    claimed.insert(hostname.clone(), unit.address.clone());
                    infra_pairs.push((unit.address.clone(), hostname));
                }
            }
        }
    }

    let mut project_pairs = Vec::new();
    for name in project_roots.iter().flat_map(|root| discover_projects(root)) {
        let Some(slug) = slugify(&name) else {
            let msg = format!("project '{name}' has no DNS-safe characters; skipped");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            continue;
        };
        let hostname = format!("{slug}.{domain}");
        match claimed.get(&hostname) {
            Some(ip) if ip != LOOPBACK => {
                let msg = format!(
                    "project hostname {hostname} is already mapped to {ip} by the inventory; keeping {ip}"
                );
                tracing::warn!("{}", msg);
                warnings.push(msg);
            }
            Some(_) => {}
            None => {
                claimed.insert(hostname.clone(), LOOPBACK.to_string());
                project_pairs.push((LOOPBACK.to_string(), hostname));
            }
        }
    }

    DesiredHostsState {
        domain,
        infrastructure: group_entries(infra_pairs),
        projects: group_entries(project_pairs),
        warnings,
    }
}

/// Immediate subdirectories of `root` that look like projects, sorted.
pub fn discover_projects(root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(root) else {
        tracing::debug!("project root {} not readable; skipping", root.display());
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .filter(|name| !name.starts_with('.') && !EXCLUDED_DIRS.contains(&name.as_str()))
        .collect();
    names.sort();
    names
}

/// Group `(ip, hostname)` pairs into sorted, deduplicated lines.
pub(crate) fn group_entries<I>(pairs: I) -> Vec<HostEntry>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut by_ip: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (ip, hostname) in pairs {
        by_ip.entry(ip).or_default().insert(hostname);
    }
    by_ip
        .into_iter()
        .flat_map(|(ip, names)| {
            let names: Vec<String> = names.into_iter().collect();
            names
                .chunks(MAX_HOSTNAMES_PER_LINE)
                .map(|chunk| HostEntry {
                    ip: ip.clone(),
                    hostnames: chunk.to_vec(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// DNS-safe label for a project name: lowercase, `_`, `.` and whitespace
/// become `-`, anything else outside `[a-z0-9-]` is dropped, at most 63
/// characters. `None` if nothing survives.
pub fn slugify(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let mapped = match c {
            'a'..='z' | '0'..='9' => Some(c),
            '-' | '_' | '.' => Some('-'),
            c if c.is_whitespace() => Some('-'),
            _ => None,
        };
        if let Some(m) = mapped {
            if m == '-' && (slug.is_empty() || slug.ends_with('-')) {
                continue;
            }
            slug.push(m);
        }
    }
    slug.truncate(MAX_LABEL_LEN);
    let slug = slug.trim_end_matches('-');
    (!slug.is_empty()).then(|| slug.to_string())
}

pub fn validate_hostname(hostname: &str) -> Result<(), HostsError> {
    let invalid = |reason| HostsError::InvalidHostname {
        name: hostname.to_string(),
        reason,
    };
    if hostname.is_empty() {
        return Err(invalid("empty"));
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(invalid("longer than 253 characters"));
    }
    for label in hostname.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid("each label must be 1-63 characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid("labels cannot start or end with '-'"));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(invalid("only a-z, 0-9 and '-' are allowed"));
        }
    }
    Ok(())
}
