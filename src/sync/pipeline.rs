//! Bounded worker pool executing upload tasks.
//!
//! Tasks are queued on a channel shared by `workers` tokio tasks; each worker
//! reports one [`UploadResult`] per task on a result channel. Every submitted
//! task yields exactly one result, whatever happens to the workers.
//!
//! The queue is filled and closed before any worker starts, so taking the
//! next task never waits on the channel.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::fs::ObjectStore;
use crate::sync::transform::ContentTransformer;
use crate::sync::types::{UploadResult, UploadTask};

type TaskQueue = Arc<Mutex<mpsc::UnboundedReceiver<UploadTask>>>;

/// Executes upload tasks against an object store.
pub struct UploadPipeline {
    store: Arc<dyn ObjectStore>,
    workers: usize,
    dry_run: bool,
}

impl UploadPipeline {
    pub fn new(store: Arc<dyn ObjectStore>, workers: usize, dry_run: bool) -> Self {
        Self {
            store,
            workers: clamp_workers(workers),
            dry_run,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run all tasks to completion and return one result per task, in no
    /// particular order.
    pub async fn run(&self, tasks: Vec<UploadTask>) -> Vec<UploadResult> {
        if self.dry_run {
            return tasks
                .iter()
                .map(|task| {
                    info!(key = %task.record.logical_key, reason = %task.decision.reason(), "would upload");
                    UploadResult::dry_run(task)
                })
                .collect();
        }

        if tasks.is_empty() {
            return Vec::new();
        }

        let expected: Vec<String> = tasks.iter().map(|t| t.record.logical_key.clone()).collect();

        let (task_tx, task_rx) = mpsc::unbounded_channel();
        for task in tasks {
            // Receiver is alive until the workers below finish
            let _ = task_tx.send(task);
        }
        drop(task_tx);

        let queue: TaskQueue = Arc::new(Mutex::new(task_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let now = Utc::now();

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(worker(id, queue.clone(), self.store.clone(), result_tx.clone(), now));
        }
        drop(result_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "upload worker stopped unexpectedly");
            }
        }

        let mut results = Vec::with_capacity(expected.len());
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }

        let answered: HashSet<String> = results.iter().map(|r| r.logical_key.clone()).collect();
        for key in expected {
            if !answered.contains(&key) {
                warn!(key = %key, "no result reported for task");
                results.push(UploadResult::failed(key, "worker stopped before reporting"));
            }
        }

        results
    }
}

/// At least one worker, warning when the request was lower.
pub fn clamp_workers(requested: usize) -> usize {
    if requested < 1 {
        warn!(requested, "worker count below 1, using 1");
        1
    } else {
        requested
    }
}

async fn worker(
    id: usize,
    queue: TaskQueue,
    store: Arc<dyn ObjectStore>,
    results: mpsc::UnboundedSender<UploadResult>,
    now: DateTime<Utc>,
) {
    loop {
        // Empty or closed both mean the batch is drained
        let Ok(task) = queue.lock().await.try_recv() else {
            break;
        };

        let key = task.record.logical_key.clone();
        info!(worker = id, key = %key, reason = %task.decision.reason(), "uploading");

        let result = match execute(store.as_ref(), &task, now).await {
            Ok(bytes_sent) => {
                info!(worker = id, destination = %store.display_key(&key), bytes_sent, "uploaded");
                UploadResult::success(key, bytes_sent)
            }
            Err(e) => {
                warn!(worker = id, key = %key, error = %e, "upload failed");
                UploadResult::failed(key, e.to_string())
            }
        };

        if results.send(result).is_err() {
            break;
        }
    }
}

/// Read, transform and put a single task. Returns the payload size sent.
async fn execute(
    store: &dyn ObjectStore,
    task: &UploadTask,
    now: DateTime<Utc>,
) -> Result<u64, SyncError> {
    let record = &task.record;
    let data = tokio::fs::read(&record.local_path)
        .await
        .map_err(|source| SyncError::SourceRead {
            path: record.local_path.clone(),
            source,
        })?;

    let transformer = ContentTransformer::new(task.options);
    let key = record.logical_key.clone();
    let object = tokio::task::spawn_blocking(move || transformer.transform(&key, data, now))
        .await
        .map_err(|e| SyncError::Transform {
            key: record.logical_key.clone(),
            reason: e.to_string(),
        })?
        .map_err(|e| SyncError::Transform {
            key: record.logical_key.clone(),
            reason: e.to_string(),
        })?;

    let bytes_sent = object.payload.len() as u64;
    debug!(
        key = %record.logical_key,
        source_size = record.size,
        payload_size = bytes_sent,
        headers = ?object.headers.pairs(),
        "transformed"
    );

    store
        .put(&record.logical_key, object.payload, &object.headers)
        .await
        .map_err(|source| SyncError::Upload {
            key: record.logical_key.clone(),
            source,
        })?;

    Ok(bytes_sent)
}
