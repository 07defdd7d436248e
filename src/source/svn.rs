//! Subversion working copy source.
//!
//! Tracked files are listed with `svn status -v`; the change signal of each
//! file is the revision in which it last changed. Working copy metadata comes
//! from `svn info`.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::source::SourceEnumerator;
use crate::sync::{AssetRecord, ExcludePatterns, LocalSignal};

/// Working copy metadata reported by `svn info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopyInfo {
    pub url: String,
    pub revision: u64,
    pub uuid: Option<String>,
}

/// Item status, first column of `svn status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Normal,
    Added,
    Conflicted,
    Deleted,
    Ignored,
    Modified,
    Replaced,
    External,
    Unversioned,
    Missing,
    Obstructed,
    Other(char),
}

impl EntryStatus {
    fn from_code(code: char) -> Self {
        match code {
            ' ' => Self::Normal,
            'A' => Self::Added,
            'C' => Self::Conflicted,
            'D' => Self::Deleted,
            'I' => Self::Ignored,
            'M' => Self::Modified,
            'R' => Self::Replaced,
            'X' => Self::External,
            '?' => Self::Unversioned,
            '!' => Self::Missing,
            '~' => Self::Obstructed,
            other => Self::Other(other),
        }
    }

    /// Local edits that are not committed yet.
    pub fn is_uncommitted(&self) -> bool {
        matches!(
            self,
            Self::Added | Self::Conflicted | Self::Deleted | Self::Modified | Self::Replaced | Self::Obstructed
        )
    }
}

/// One line of `svn status -v`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Path relative to the working copy root.
    pub path: String,
    pub status: EntryStatus,
    pub last_changed: Option<u64>,
}

/// The version-control operations a working copy sync needs.
pub trait VcsClient {
    fn info(&self, root: &Path) -> Result<WorkingCopyInfo>;

    fn status(&self, root: &Path) -> Result<Vec<StatusEntry>>;
}

/// [`VcsClient`] shelling out to the `svn` command-line client.
#[derive(Debug, Clone)]
pub struct SvnCli {
    program: PathBuf,
}

impl Default for SvnCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("svn"),
        }
    }
}

impl SvnCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, root: &Path, args: &[&str]) -> Result<String> {
        debug!(program = %self.program.display(), ?args, root = %root.display(), "running svn");
        let output = Command::new(&self.program)
            .args(args)
            .arg("--non-interactive")
            .current_dir(root)
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "svn {} failed ({}): {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VcsClient for SvnCli {
    fn info(&self, root: &Path) -> Result<WorkingCopyInfo> {
        parse_info(&self.run(root, &["info"])?)
    }

    fn status(&self, root: &Path) -> Result<Vec<StatusEntry>> {
        Ok(parse_status(&self.run(root, &["status", "-v"])?))
    }
}

/// Parse the `Key: value` output of `svn info`.
pub fn parse_info(output: &str) -> Result<WorkingCopyInfo> {
    let mut url = None;
    let mut revision = None;
    let mut uuid = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };
        match key.trim() {
            "URL" => url = Some(value.trim().to_string()),
            "Revision" => {
                revision = Some(
                    value
                        .trim()
                        .parse::<u64>()
                        .with_context(|| format!("Invalid revision '{}'", value.trim()))?,
                )
            }
            "Repository UUID" => uuid = Some(value.trim().to_string()),
            _ => {}
        }
    }

    Ok(WorkingCopyInfo {
        url: url.context("svn info did not report a URL")?,
        revision: revision.context("svn info did not report a revision")?,
        uuid,
    })
}

/// Parse `svn status -v` output.
///
/// Versioned lines are seven flag columns followed by working revision, last
/// changed revision, author and path. Unversioned lines carry only the path.
pub fn parse_status(output: &str) -> Vec<StatusEntry> {
    output.lines().filter_map(parse_status_line).collect()
}

fn parse_status_line(line: &str) -> Option<StatusEntry> {
    let flags = line.get(..7)?;
    let rest = line.get(7..)?.trim_start();
    // Tree conflict details and changelist headers
    if rest.is_empty() || rest.starts_with('>') || line.starts_with("---") {
        return None;
    }

    let status = EntryStatus::from_code(flags.chars().next()?);
    if matches!(status, EntryStatus::Unversioned | EntryStatus::Ignored) {
        return Some(StatusEntry {
            path: rest.trim_end().to_string(),
            status,
            last_changed: None,
        });
    }

    let (_working, rest) = next_field(rest)?;
    let (last_changed, rest) = next_field(rest)?;
    let (_author, path) = next_field(rest)?;
    let path = path.trim_end();
    if path.is_empty() {
        return None;
    }

    Some(StatusEntry {
        path: path.to_string(),
        status,
        last_changed: last_changed.parse().ok(),
    })
}

fn next_field(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    Some((&s[..end], s[end..].trim_start()))
}

/// Options of a working copy sync.
#[derive(Debug, Clone, Default)]
pub struct SvnOptions {
    /// URL recorded by the previous sync.
    pub recorded_url: Option<String>,
    /// Accept a working copy whose URL differs from the recorded one.
    pub ignore_url: bool,
    /// Revision the caller expects the working copy to be at.
    pub revision: Option<u64>,
    pub exclude_ignored: bool,
}

/// Working copy source, checked when opened.
///
/// Every `svn` call happens in [`SvnTree::open`], which blocks; async callers
/// run it on the blocking pool.
pub struct SvnTree {
    root: PathBuf,
    info: WorkingCopyInfo,
    entries: Vec<StatusEntry>,
    exclude: ExcludePatterns,
}

impl SvnTree {
    /// Read working copy metadata and status, verifying revision and URL
    /// expectations.
    pub fn open<C: VcsClient>(
        client: &C,
        root: impl Into<PathBuf>,
        options: &SvnOptions,
    ) -> Result<Self, SyncError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SyncError::enumeration(&root, "not a directory"));
        }

        let info = client
            .info(&root)
            .map_err(|e| SyncError::enumeration(&root, format!("{:#}", e)))?;
        info!(url = %info.url, revision = info.revision, "working copy");

        if let Some(requested) = options.revision {
            if requested != info.revision {
                return Err(SyncError::enumeration(
                    &root,
                    format!(
                        "working copy is at revision {}, not the requested {}",
                        info.revision, requested
                    ),
                ));
            }
        }

        if let Some(recorded) = options.recorded_url.as_deref().filter(|u| !u.is_empty()) {
            if recorded != info.url {
                if options.ignore_url {
                    warn!(recorded, current = %info.url, "repository URL differs, ignoring");
                } else {
                    return Err(SyncError::enumeration(
                        &root,
                        format!(
                            "bucket was synced from {} but the working copy is {} (use --ignore-url to override)",
                            recorded, info.url
                        ),
                    ));
                }
            }
        }

        let entries = client
            .status(&root)
            .map_err(|e| SyncError::enumeration(&root, format!("{:#}", e)))?;
        debug!(entries = entries.len(), "working copy status");

        let exclude = if options.exclude_ignored {
            ExcludePatterns::with_defaults()
        } else {
            ExcludePatterns::none()
        };

        Ok(Self {
            root,
            info,
            entries,
            exclude,
        })
    }

    pub fn info(&self) -> &WorkingCopyInfo {
        &self.info
    }

    fn records(&self) -> Result<Vec<AssetRecord>, SyncError> {
        let uncommitted: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.status.is_uncommitted())
            .map(|e| format!("{} ({:?})", e.path, e.status))
            .collect();
        if !uncommitted.is_empty() {
            return Err(SyncError::enumeration(
                &self.root,
                format!(
                    "working copy is not in a readable state, commit or revert first: {}",
                    uncommitted.join(", ")
                ),
            ));
        }

        let mut records = Vec::new();
        for entry in &self.entries {
            match entry.status {
                EntryStatus::Normal => {}
                EntryStatus::Missing => {
                    warn!(path = %entry.path, "tracked file missing, omitting");
                    continue;
                }
                _ => continue,
            }
            if entry.path == "." {
                continue;
            }

            let key = entry.path.replace('\\', "/");
            if self.exclude.is_excluded(&key) {
                debug!(key = %key, "excluded");
                continue;
            }

            let local_path = self.root.join(&entry.path);
            let metadata = match std::fs::symlink_metadata(&local_path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %local_path.display(), error = %e, "cannot stat file, omitting");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let Some(revision) = entry.last_changed else {
                warn!(path = %entry.path, "no last changed revision, omitting");
                continue;
            };

            records.push(AssetRecord {
                local_path,
                logical_key: key,
                size: metadata.len(),
                signal: LocalSignal::Revision(revision),
            });
        }

        Ok(records)
    }
}

impl SourceEnumerator for SvnTree {
    fn describe(&self) -> String {
        format!("{} ({}@{})", self.root.display(), self.info.url, self.info.revision)
    }

    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = AssetRecord> + '_>, SyncError> {
        Ok(Box::new(self.records()?.into_iter()))
    }
}
