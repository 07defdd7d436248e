//! Exclude pattern matching for enumerated files.
//!
//! Patterns are globs matched against the relative path, the file name and
//! every path component.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path};

/// Files never worth publishing.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    // Version control
    ".svn",
    ".git",
    ".hg",
    // Project files
    ".project",
    ".pydevproject",
    // OS
    ".DS_Store",
    "Thumbs.db",
    // Editor swap and backup files
    "*.swp",
    "*.swo",
    "*~",
    "#*#",
];

/// Compiled set of exclude globs.
#[derive(Debug, Clone)]
pub struct ExcludePatterns {
    glob_set: GlobSet,
}

impl Default for ExcludePatterns {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ExcludePatterns {
    /// A set that matches nothing.
    pub fn none() -> Self {
        Self {
            glob_set: GlobSet::empty(),
        }
    }

    /// The built-in filter list.
    pub fn with_defaults() -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_EXCLUDES {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }

        Self {
            glob_set: builder.build().unwrap_or_else(|_| GlobSet::empty()),
        }
    }

    /// Check if a relative path should be excluded.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.glob_set.is_match(path) {
            return true;
        }

        // Directory patterns like ".svn" must hit files below them too
        Path::new(path).components().any(|component| match component {
            Component::Normal(name) => self.glob_set.is_match(name.to_string_lossy().as_ref()),
            _ => false,
        })
    }
}
