//! Error taxonomy for sync runs.
//!
//! Fatal kinds abort a run before any upload is attempted. Per-task kinds are
//! captured into that task's [`UploadResult`](crate::sync::UploadResult) and
//! never escape the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while planning or executing a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid deployment settings.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The source tree or working copy cannot be enumerated.
    #[error("cannot enumerate {}: {reason}", path.display())]
    Enumeration { path: PathBuf, reason: String },

    /// The metadata lookup for a key failed.
    #[error("remote lookup failed for {key}: {source:#}")]
    RemoteLookup {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The put of a transformed payload failed.
    #[error("upload failed for {key}: {source:#}")]
    Upload {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The payload could not be transformed.
    #[error("transform failed for {key}: {reason}")]
    Transform { key: String, reason: String },

    /// The source file disappeared or became unreadable after enumeration.
    #[error("cannot read {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn enumeration(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Enumeration {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Enumeration { .. })
    }
}
