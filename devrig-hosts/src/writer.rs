//! Digest-gated hosts writer.
//!
//! ## `write_hosts` protocol
//!
//! 1. SHA-256 the rendered content and the live content.
//! 2. Identical digests: nothing is written and no backup is taken.
//! 3. Back up the live file (a failure is reported, never fatal).
//! 4. Write to `<path>.devrig.tmp` and rename over the target.
//! 5. If that fails, retry once: in-place rewrite when the file is writable,
//!    `sudo tee` otherwise.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::Local;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{io_err, HostsError};

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// How the new content reached the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    AtomicRename,
    InPlace,
    SudoTee,
}

impl WriteStrategy {
    fn label(self) -> &'static str {
        match self {
            WriteStrategy::AtomicRename => "atomic rename",
            WriteStrategy::InPlace => "in-place rewrite",
            WriteStrategy::SudoTee => "sudo tee",
        }
    }
}

/// Outcome of a hosts write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum WriteResult {
    /// File was written.
    Written { strategy: WriteStrategy },
    /// Rendered content matches the live file.
    Unchanged,
    /// `--dry-run`: the file *would* have been written.
    WouldWrite,
    /// The operation did not require a write (scan).
    NotAttempted,
}

/// Result of [`write_hosts`] including the backup outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub result: WriteResult,
    pub backup: Option<PathBuf>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WriteOptions<'a> {
    /// `None` disables the backup.
    pub backup_dir: Option<&'a Path>,
    pub dry_run: bool,
}

pub fn digest(content: &str) -> String {
    let mut h = Sha256::new();
    h.update(content.as_bytes());
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// write_hosts
// ---------------------------------------------------------------------------

/// Replace the hosts file at `path` with `content`, whose current contents
/// are `live`.
pub fn write_hosts(
    path: &Path,
    live: &str,
    content: &str,
    options: &WriteOptions<'_>,
) -> Result<WriteOutcome, HostsError> {
    let tmp = PathBuf::from(format!("{}.devrig.tmp", path.display()));
    write_hosts_with_tmp(path, live, content, options, &tmp)
}

fn write_hosts_with_tmp(
    path: &Path,
    live: &str,
    content: &str,
    options: &WriteOptions<'_>,
    tmp: &Path,
) -> Result<WriteOutcome, HostsError> {
    let mut outcome = WriteOutcome {
        result: WriteResult::Unchanged,
        backup: None,
        warnings: Vec::new(),
    };

    if digest(live) == digest(content) {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(outcome);
    }

    if options.dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        outcome.result = WriteResult::WouldWrite;
        return Ok(outcome);
    }

    if let Some(dir) = options.backup_dir {
        match backup(path, dir) {
            Ok(saved) => {
                tracing::info!("backed up {} to {}", path.display(), saved.display());
                outcome.backup = Some(saved);
            }
            Err(err) => {
                let msg = format!("backup skipped: {err}");
                tracing::warn!("{}", msg);
                outcome.warnings.push(msg);
            }
        }
    }

    let strategy = match atomic_replace(path, content, tmp) {
        Ok(()) => WriteStrategy::AtomicRename,
        Err(primary) => {
            tracing::warn!(
                "atomic write of {} failed ({}); retrying",
                path.display(),
                primary
            );
            let fallback = if is_writable(path) {
                WriteStrategy::InPlace
            } else {
                WriteStrategy::SudoTee
            };
            let retry = match fallback {
                WriteStrategy::SudoTee => sudo_tee(path, content),
                _ => write_in_place(path, content).map_err(|e| e.to_string()),
            };
            if let Err(fallback_error) = retry {
                return Err(HostsError::WriteFailed {
                    path: path.to_path_buf(),
                    primary,
                    fallback: fallback.label(),
                    fallback_error,
                });
            }
            fallback
        }
    };

    tracing::info!("wrote: {} ({})", path.display(), strategy.label());
    outcome.result = WriteResult::Written { strategy };
    Ok(outcome)
}

/// Copy `path` to `<dir>/hosts.<YYYYmmdd-HHMMSS>.bak`, adding a `-N` suffix
/// when a backup from the same second already exists. Existing backups are
/// never overwritten.
pub fn backup(path: &Path, dir: &Path) -> Result<PathBuf, HostsError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let mut source = std::fs::File::open(path).map_err(|e| io_err(path, e))?;

    let mut attempt = 0u32;
    let (target, mut file) = loop {
        let name = match attempt {
            0 => format!("hosts.{stamp}.bak"),
            n => format!("hosts.{stamp}-{n}.bak"),
        };
        let target = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => break (target, file),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(io_err(&target, e)),
        }
    };
    std::io::copy(&mut source, &mut file).map_err(|e| io_err(&target, e))?;
    file.sync_all().map_err(|e| io_err(&target, e))?;
    Ok(target)
}

fn atomic_replace(path: &Path, content: &str, tmp: &Path) -> std::io::Result<()> {
    std::fs::write(tmp, content)?;
    // Keep the live file's mode across the rename.
    if let Ok(meta) = std::fs::metadata(path) {
        let _ = std::fs::set_permissions(tmp, meta.permissions());
    }
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(e);
    }
    Ok(())
}

fn is_writable(path: &Path) -> bool {
    match OpenOptions::new().append(true).open(path) {
        Ok(_) => true,
        Err(e) => e.kind() != ErrorKind::PermissionDenied,
    }
}

fn write_in_place(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

fn sudo_tee(path: &Path, content: &str) -> Result<(), String> {
    let mut child = Command::new("sudo")
        .arg("tee")
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .map_err(|e| format!("cannot run sudo: {e}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(content.as_bytes())
            .map_err(|e| format!("cannot pipe to sudo tee: {e}"))?;
    }
    let status = child.wait().map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("sudo tee exited with {status}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn apply_opts(backup_dir: Option<&Path>) -> WriteOptions<'_> {
        WriteOptions {
            backup_dir,
            dry_run: false,
        }
    }

    #[test]
    fn changed_content_is_written_atomically() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        fs::write(&path, "old\n").unwrap();

        let outcome = write_hosts(&path, "old\n", "new\n", &apply_opts(None)).unwrap();
        assert_eq!(
            outcome.result,
            WriteResult::Written {
                strategy: WriteStrategy::AtomicRename
            }
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        let tmp_path = PathBuf::from(format!("{}.devrig.tmp", path.display()));
        assert!(!tmp_path.exists(), ".devrig.tmp must be cleaned up");
    }

    #[test]
    fn identical_content_skips_write_and_backup() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        let backups = tmp.path().join("backups");
        fs::write(&path, "same\n").unwrap();

        let outcome = write_hosts(&path, "same\n", "same\n", &apply_opts(Some(&backups))).unwrap();
        assert_eq!(outcome.result, WriteResult::Unchanged);
        assert!(outcome.backup.is_none());
        assert!(!backups.exists());
    }

    #[test]
    fn dry_run_does_not_write_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        fs::write(&path, "a\n").unwrap();
        let options = WriteOptions {
            backup_dir: Some(tmp.path()),
            dry_run: true,
        };
        let outcome = write_hosts(&path, "a\n", "b\n", &options).unwrap();
        assert_eq!(outcome.result, WriteResult::WouldWrite);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n");
    }

    #[test]
    fn backup_copies_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        let backups = tmp.path().join("nested").join("backups");
        fs::write(&path, "before\n").unwrap();

        let outcome =
            write_hosts(&path, "before\n", "after\n", &apply_opts(Some(&backups))).unwrap();
        let saved = outcome.backup.expect("backup path");
        assert!(saved.starts_with(&backups));
        assert!(saved
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("hosts."));
        assert_eq!(fs::read_to_string(saved).unwrap(), "before\n");
    }

    #[test]
    fn repeated_backups_never_overwrite_each_other() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        let backups = tmp.path().join("backups");

        fs::write(&path, "first\n").unwrap();
        let a = backup(&path, &backups).unwrap();
        fs::write(&path, "second\n").unwrap();
        let b = backup(&path, &backups).unwrap();
        fs::write(&path, "third\n").unwrap();
        let c = backup(&path, &backups).unwrap();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_eq!(fs::read_to_string(&a).unwrap(), "first\n");
        assert_eq!(fs::read_to_string(&b).unwrap(), "second\n");
        assert_eq!(fs::read_to_string(&c).unwrap(), "third\n");
    }

    #[test]
    fn backup_failure_is_a_warning_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        fs::write(&path, "before\n").unwrap();
        // A regular file where the backup directory should be.
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let outcome =
            write_hosts(&path, "before\n", "after\n", &apply_opts(Some(&blocker))).unwrap();
        assert!(outcome.backup.is_none());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "after\n");
    }

    #[test]
    fn failed_rename_falls_back_to_in_place_rewrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hosts");
        fs::write(&path, "original\n").unwrap();
        // The temp file cannot be created beneath a regular file.
        let tmp_path = path.join("hosts.devrig.tmp");

        let outcome = write_hosts_with_tmp(
            &path,
            "original\n",
            "replacement\n",
            &apply_opts(None),
            &tmp_path,
        )
        .unwrap();

        assert_eq!(
            outcome.result,
            WriteResult::Written {
                strategy: WriteStrategy::InPlace
            }
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "replacement\n");
    }
}
