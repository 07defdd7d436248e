use chrono::{DateTime, Utc};
use jwalk::WalkDir;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::source::SourceEnumerator;
use crate::sync::{AssetRecord, ExcludePatterns, LocalSignal};

/// Plain directory tree; change signal is the file modification time.
pub struct LocalTree {
    root: PathBuf,
    exclude: ExcludePatterns,
}

impl LocalTree {
    /// `exclude_ignored` applies the built-in filter list on top of the
    /// hidden-entry rule.
    pub fn new(root: impl Into<PathBuf>, exclude_ignored: bool) -> Self {
        Self {
            root: root.into(),
            exclude: if exclude_ignored {
                ExcludePatterns::with_defaults()
            } else {
                ExcludePatterns::none()
            },
        }
    }

    fn to_record(&self, path: PathBuf) -> Option<AssetRecord> {
        let key = relative_key(&self.root, &path)?;
        if self.exclude.is_excluded(&key) {
            debug!(key = %key, "excluded");
            return None;
        }

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat file, omitting");
                return None;
            }
        };

        let modified = match metadata.modified().ok().and_then(to_datetime) {
            Some(modified) => modified,
            None => {
                warn!(path = %path.display(), "no modification time, omitting");
                return None;
            }
        };

        Some(AssetRecord {
            local_path: path,
            logical_key: key,
            size: metadata.len(),
            signal: LocalSignal::Modified(modified),
        })
    }
}

impl SourceEnumerator for LocalTree {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn enumerate(&self) -> Result<Box<dyn Iterator<Item = AssetRecord> + '_>, SyncError> {
        if !self.root.is_dir() {
            return Err(SyncError::enumeration(&self.root, "not a directory"));
        }

        let walk = WalkDir::new(&self.root)
            .skip_hidden(true)
            .follow_links(false)
            .sort(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(entry.path()),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "error walking directory");
                    None
                }
            })
            .filter_map(move |path| self.to_record(path));

        Ok(Box::new(walk))
    }
}

/// Store key of `path` relative to `root`, components joined with `/`.
pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Whole-second UTC time, matching the resolution of remote timestamps.
fn to_datetime(time: std::time::SystemTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.duration_since(UNIX_EPOCH).ok()?.as_secs() as i64, 0)
}
