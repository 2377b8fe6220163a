//! Three-region view of a hosts file.
//!
//! ```text
//! <preamble>                      kept byte-for-byte
//! # BEGIN devrig managed hosts
//! # infrastructure
//! 127.0.0.1 pg.test redis.test
//! # projects
//! 127.0.0.1 foo.test
//! # END devrig managed hosts
//! <postamble>                     kept byte-for-byte
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use crate::desired::{group_entries, DesiredHostsState, HostEntry, Section};
use crate::error::HostsError;

pub const BEGIN_MARKER: &str = "# BEGIN devrig managed hosts";
pub const END_MARKER: &str = "# END devrig managed hosts";
const INFRASTRUCTURE_HEADER: &str = "# infrastructure";
const PROJECTS_HEADER: &str = "# projects";

/// Entries inside the managed block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedBlock {
    pub infrastructure: Vec<HostEntry>,
    pub projects: Vec<HostEntry>,
}

impl ManagedBlock {
    pub fn from_desired(desired: &DesiredHostsState) -> Self {
        Self {
            infrastructure: desired.infrastructure.clone(),
            projects: desired.projects.clone(),
        }
    }

    pub fn hostnames(&self) -> BTreeSet<&str> {
        self.infrastructure
            .iter()
            .chain(&self.projects)
            .flat_map(|e| e.hostnames.iter().map(String::as_str))
            .collect()
    }

    pub(crate) fn insert(&mut self, section: Section, ip: &str, hostname: &str) {
        let target = match section {
            Section::Infrastructure => &mut self.infrastructure,
            Section::Projects => &mut self.projects,
        };
        let mut pairs = flatten(target);
        pairs.push((ip.to_string(), hostname.to_string()));
        *target = group_entries(pairs);
    }

    /// Returns true when `hostname` was present.
    pub(crate) fn remove(&mut self, hostname: &str) -> bool {
        let mut removed = false;
        for section in [&mut self.infrastructure, &mut self.projects] {
            let before = section.iter().map(|e| e.hostnames.len()).sum::<usize>();
            let pairs: Vec<_> = flatten(section)
                .into_iter()
                .filter(|(_, h)| h != hostname)
                .collect();
            if pairs.len() != before {
                removed = true;
                *section = group_entries(pairs);
            }
        }
        removed
    }

    fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(BEGIN_MARKER);
        out.push('\n');
        for (header, entries) in [
            (INFRASTRUCTURE_HEADER, &self.infrastructure),
            (PROJECTS_HEADER, &self.projects),
        ] {
            out.push_str(header);
            out.push('\n');
            for entry in entries {
                out.push_str(&entry.render());
                out.push('\n');
            }
        }
        out.push_str(END_MARKER);
        out.push('\n');
        out
    }
}

fn flatten(entries: &[HostEntry]) -> Vec<(String, String)> {
    entries
        .iter()
        .flat_map(|e| e.hostnames.iter().map(|h| (e.ip.clone(), h.clone())))
        .collect()
}

/// A parsed hosts file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostsDocument {
    pub preamble: String,
    pub managed: Option<ManagedBlock>,
    pub postamble: String,
}

impl HostsDocument {
    /// Split `contents` into regions. `source` is only used for errors.
    pub fn parse(contents: &str, source: &Path) -> Result<Self, HostsError> {
        let malformed = |reason: &str| HostsError::MalformedBlock {
            path: source.to_path_buf(),
            reason: reason.to_string(),
        };

        let mut offset = 0;
        let mut begin = None;
        let mut end = None;
        for line in contents.split_inclusive('\n') {
            let trimmed = line.trim();
            if trimmed == BEGIN_MARKER {
                if begin.is_some() {
                    return Err(malformed("duplicate BEGIN marker"));
                }
                begin = Some((offset, offset + line.len()));
            } else if trimmed == END_MARKER {
                if begin.is_none() || end.is_some() {
                    return Err(malformed("END marker without BEGIN"));
                }
                end = Some((offset, offset + line.len()));
            }
            offset += line.len();
        }

        match (begin, end) {
            (None, None) => Ok(Self {
                preamble: contents.to_string(),
                managed: None,
                postamble: String::new(),
            }),
            (Some((begin_start, begin_end)), Some((end_start, end_end))) => Ok(Self {
                preamble: contents[..begin_start].to_string(),
                managed: Some(parse_block(&contents[begin_end..end_start])),
                postamble: contents[end_end..].to_string(),
            }),
            _ => Err(malformed("BEGIN marker without END")),
        }
    }

    /// Every hostname mapped by a non-comment line, managed or not.
    pub fn mapped_hostnames(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = [&self.preamble, &self.postamble]
            .into_iter()
            .flat_map(|region| region.lines())
            .flat_map(parse_line)
            .flat_map(|entry| entry.hostnames)
            .collect();
        if let Some(block) = &self.managed {
            names.extend(block.hostnames().into_iter().map(str::to_string));
        }
        names
    }

    /// Hostnames inside the managed block only.
    pub fn managed_hostnames(&self) -> BTreeSet<String> {
        self.managed
            .as_ref()
            .map(|b| b.hostnames().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn render(&self) -> String {
        let Some(block) = &self.managed else {
            return format!("{}{}", self.preamble, self.postamble);
        };
        let mut out = String::with_capacity(self.preamble.len() + self.postamble.len() + 256);
        out.push_str(&self.preamble);
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&block.render());
        out.push_str(&self.postamble);
        out
    }

    /// Mutable access to the managed block, creating an empty one at the end
    /// of the file when none exists.
    pub fn managed_mut(&mut self) -> &mut ManagedBlock {
        self.managed.get_or_insert_with(ManagedBlock::default)
    }
}

fn parse_block(body: &str) -> ManagedBlock {
    let mut block = ManagedBlock::default();
    let mut section = Section::Projects;
    let mut infra_pairs = Vec::new();
    let mut project_pairs = Vec::new();
    for line in body.lines() {
        match line.trim() {
            INFRASTRUCTURE_HEADER => section = Section::Infrastructure,
            PROJECTS_HEADER => section = Section::Projects,
            _ => {
                for entry in parse_line(line) {
                    let pairs = match section {
                        Section::Infrastructure => &mut infra_pairs,
                        Section::Projects => &mut project_pairs,
                    };
                    pairs.extend(entry.hostnames.into_iter().map(|h| (entry.ip.clone(), h)));
                }
            }
        }
    }
    block.infrastructure = group_entries(infra_pairs);
    block.projects = group_entries(project_pairs);
    block
}

/// Parse `ip name [name...] [# comment]`.
fn parse_line(line: &str) -> Option<HostEntry> {
    let content = line.split('#').next().unwrap_or("");
    let mut fields = content.split_whitespace();
    let ip = fields.next()?;
    let hostnames: Vec<String> = fields.map(|h| h.to_ascii_lowercase()).collect();
    if hostnames.is_empty() {
        return None;
    }
    Some(HostEntry {
        ip: ip.to_string(),
        hostnames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(contents: &str) -> Result<HostsDocument, HostsError> {
        HostsDocument::parse(contents, &PathBuf::from("/etc/hosts"))
    }

    #[test]
    fn file_without_block_round_trips() {
        let raw = "127.0.0.1 localhost\n::1 localhost # v6\n";
        let doc = parse(raw).unwrap();
        assert!(doc.managed.is_none());
        assert_eq!(doc.render(), raw);
        assert!(doc.mapped_hostnames().contains("localhost"));
    }

    #[test]
    fn regions_are_split_at_markers() {
        let raw = format!(
            "127.0.0.1 localhost\n{BEGIN_MARKER}\n# infrastructure\n127.0.0.1 pg.test\n# projects\n127.0.0.1 foo.test\n{END_MARKER}\n10.0.0.1 nas\n"
        );
        let doc = parse(&raw).unwrap();
        assert_eq!(doc.preamble, "127.0.0.1 localhost\n");
        assert_eq!(doc.postamble, "10.0.0.1 nas\n");
        let block = doc.managed.as_ref().unwrap();
        assert_eq!(block.infrastructure[0].hostnames, vec!["pg.test"]);
        assert_eq!(block.projects[0].hostnames, vec!["foo.test"]);
        assert_eq!(doc.render(), raw);
    }

    #[test]
    fn appended_block_keeps_preamble_bytes() {
        let mut doc = parse("127.0.0.1 localhost").unwrap();
        doc.managed_mut()
            .insert(Section::Projects, "127.0.0.1", "foo.test");
        let rendered = doc.render();
        assert!(rendered.starts_with("127.0.0.1 localhost\n# BEGIN"));
        assert!(rendered.ends_with(&format!("127.0.0.1 foo.test\n{END_MARKER}\n")));
    }

    #[test]
    fn unbalanced_markers_are_rejected() {
        assert!(parse(&format!("{BEGIN_MARKER}\n127.0.0.1 a\n")).is_err());
        assert!(parse(&format!("{END_MARKER}\n")).is_err());
    }

    #[test]
    fn remove_drops_empty_lines() {
        let mut block = ManagedBlock::default();
        block.insert(Section::Projects, "127.0.0.1", "a.test");
        assert!(block.remove("a.test"));
        assert!(block.projects.is_empty());
        assert!(!block.remove("a.test"));
    }
}
