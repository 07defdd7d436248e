//! Run controller.
//!
//! Ties enumeration, planning and the upload pipeline together:
//! enumerate -> plan -> drop skips -> upload -> summarize.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::fs::ObjectStore;
use crate::source::SourceEnumerator;
use crate::sync::pipeline::{clamp_workers, UploadPipeline};
use crate::sync::planner::DiffPlanner;
use crate::sync::transform::TransformOptions;
use crate::sync::types::{AssetRecord, RunSummary, UploadDecision, UploadResult, UploadTask};

/// Sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Key namespace prepended to every relative key.
    pub prefix: String,
    /// Upload everything without looking at the remote side.
    pub force: bool,
    /// Plan only; nothing is transformed or sent.
    pub dry_run: bool,
    /// Concurrent lookups and uploads.
    pub workers: usize,
    pub transform: TransformOptions,
    /// Revision of the last successful working copy sync, if any.
    pub synced_revision: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            force: false,
            dry_run: false,
            workers: 1,
            transform: TransformOptions::default(),
            synced_revision: None,
        }
    }
}

/// Sync engine pushing one source to one object store.
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>, mut config: SyncConfig) -> Self {
        config.workers = clamp_workers(config.workers);
        Self { store, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Perform a sync run.
    ///
    /// Only enumeration failures are returned as errors; everything that goes
    /// wrong for a single file ends up in the summary.
    pub async fn run(&self, source: &dyn SourceEnumerator) -> Result<RunSummary, SyncError> {
        let started = Instant::now();
        let mut summary = RunSummary::new(self.config.dry_run);

        info!(source = %source.describe(), prefix = %self.config.prefix, "enumerating");
        let records = self.collect_records(source)?;
        info!(files = records.len(), "enumerated");

        let tasks = self.plan(records, &mut summary).await;

        let pipeline = UploadPipeline::new(self.store.clone(), self.config.workers, self.config.dry_run);
        for result in pipeline.run(tasks).await {
            summary.record(&result);
        }

        summary.duration = started.elapsed();
        info!(
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            would_upload = summary.would_upload,
            failed = summary.failed,
            bytes_sent = summary.bytes_sent,
            "run finished"
        );
        Ok(summary)
    }

    /// Enumerate, apply the prefix and drop duplicate keys.
    fn collect_records(&self, source: &dyn SourceEnumerator) -> Result<Vec<AssetRecord>, SyncError> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for record in source.enumerate()? {
            let record = record.with_prefix(&self.config.prefix);
            if !seen.insert(record.logical_key.clone()) {
                warn!(key = %record.logical_key, path = %record.local_path.display(), "duplicate key, dropping");
                continue;
            }
            records.push(record);
        }

        Ok(records)
    }

    /// Decide every record, recording skips and lookup failures directly.
    async fn plan(&self, records: Vec<AssetRecord>, summary: &mut RunSummary) -> Vec<UploadTask> {
        let planner = DiffPlanner::new(self.store.clone(), self.config.force, self.config.synced_revision);

        let decided: Vec<_> = stream::iter(records)
            .map(|record| {
                let planner = &planner;
                async move {
                    let decision = planner.decide(&record).await;
                    (record, decision)
                }
            })
            .buffer_unordered(self.config.workers)
            .collect()
            .await;

        let mut tasks = Vec::new();
        for (record, decision) in decided {
            match decision {
                Ok(UploadDecision::Skip { reason }) => {
                    info!(key = %record.logical_key, reason = %reason, "skip");
                    summary.record(&UploadResult::skipped(record.logical_key, reason));
                }
                Ok(decision) => tasks.push(UploadTask {
                    record,
                    decision,
                    options: self.config.transform,
                }),
                Err(e) => {
                    warn!(key = %record.logical_key, error = %e, "remote lookup failed");
                    summary.record(&UploadResult::failed(record.logical_key, e.to_string()));
                }
            }
        }
        tasks
    }
}
