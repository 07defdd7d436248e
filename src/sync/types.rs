//! Records, decisions and results flowing through a sync run.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::transform::TransformOptions;

/// What tells us a local file changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSignal {
    /// Filesystem modification time (plain directory mode).
    Modified(DateTime<Utc>),
    /// Revision at which the file last changed (working copy mode).
    Revision(u64),
}

impl fmt::Display for LocalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modified(at) => write!(f, "mtime {}", at.format("%Y-%m-%d %H:%M:%S")),
            Self::Revision(rev) => write!(f, "r{}", rev),
        }
    }
}

/// One local file considered for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub local_path: PathBuf,
    /// Store-relative key, unique within a run.
    pub logical_key: String,
    pub size: u64,
    pub signal: LocalSignal,
}

impl AssetRecord {
    /// Move the record under a key namespace.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.logical_key = join_key(prefix, &self.logical_key);
        self
    }
}

/// Join a key namespace and a relative key with a single `/`.
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let key = key.trim_start_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Why the planner decided what it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// No object under the key yet.
    NewObject,
    /// Remote size differs from the local file.
    SizeDiffers { local: u64, remote: u64 },
    /// Local signal is strictly newer than the remote one.
    NewerLocal,
    /// Upload requested regardless of remote state.
    Forced,
    /// Same size and local signal not newer.
    Unchanged,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewObject => write!(f, "absent remotely"),
            Self::SizeDiffers { local, remote } => {
                write!(f, "size differs ({} -> {} bytes)", remote, local)
            }
            Self::NewerLocal => write!(f, "newer local signal"),
            Self::Forced => write!(f, "forced"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Planner verdict for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDecision {
    Skip { reason: DecisionReason },
    Upload { reason: DecisionReason },
    ForceUpload,
}

impl UploadDecision {
    pub fn reason(&self) -> DecisionReason {
        match self {
            Self::Skip { reason } | Self::Upload { reason } => *reason,
            Self::ForceUpload => DecisionReason::Forced,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }
}

/// Unit of work handed to the pipeline.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub record: AssetRecord,
    pub decision: UploadDecision,
    pub options: TransformOptions,
}

/// How a single task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success,
    /// Nothing was sent. `dry_run` marks a task that would have been uploaded.
    Skipped { reason: DecisionReason, dry_run: bool },
    Failed { reason: String },
}

/// Result reported for exactly one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub logical_key: String,
    pub outcome: UploadOutcome,
    pub bytes_sent: u64,
}

impl UploadResult {
    pub fn success(logical_key: String, bytes_sent: u64) -> Self {
        Self {
            logical_key,
            outcome: UploadOutcome::Success,
            bytes_sent,
        }
    }

    pub fn skipped(logical_key: String, reason: DecisionReason) -> Self {
        Self {
            logical_key,
            outcome: UploadOutcome::Skipped { reason, dry_run: false },
            bytes_sent: 0,
        }
    }

    pub fn dry_run(task: &UploadTask) -> Self {
        Self {
            logical_key: task.record.logical_key.clone(),
            outcome: UploadOutcome::Skipped {
                reason: task.decision.reason(),
                dry_run: true,
            },
            bytes_sent: 0,
        }
    }

    pub fn failed(logical_key: String, reason: impl Into<String>) -> Self {
        Self {
            logical_key,
            outcome: UploadOutcome::Failed {
                reason: reason.into(),
            },
            bytes_sent: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Failed { .. })
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    AllSucceeded,
    CompletedWithFailures,
    /// Enumeration or configuration failure prevented any work.
    Aborted,
}

impl RunState {
    /// Process exit status for this state.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::AllSucceeded => 0,
            Self::CompletedWithFailures => 1,
            Self::Aborted => 2,
        }
    }
}

/// A failed key and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub logical_key: String,
    pub reason: String,
}

/// Aggregate of all results of one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub uploaded: usize,
    pub skipped: usize,
    /// Tasks a dry run would have uploaded.
    pub would_upload: usize,
    pub failed: usize,
    pub bytes_sent: u64,
    pub failures: Vec<Failure>,
    pub dry_run: bool,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Fold one result into the totals.
    pub fn record(&mut self, result: &UploadResult) {
        match &result.outcome {
            UploadOutcome::Success => {
                self.uploaded += 1;
                self.bytes_sent += result.bytes_sent;
            }
            UploadOutcome::Skipped { dry_run: true, .. } => self.would_upload += 1,
            UploadOutcome::Skipped { dry_run: false, .. } => self.skipped += 1,
            UploadOutcome::Failed { reason } => {
                self.failed += 1;
                self.failures.push(Failure {
                    logical_key: result.logical_key.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }

    pub fn total(&self) -> usize {
        self.uploaded + self.skipped + self.would_upload + self.failed
    }

    pub fn state(&self) -> RunState {
        if self.failed == 0 {
            RunState::AllSucceeded
        } else {
            RunState::CompletedWithFailures
        }
    }
}
