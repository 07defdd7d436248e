//! The two sync flows: plain directory push and working copy sync.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SyncError;
use crate::fs::ObjectStore;
use crate::source::svn::SvnOptions;
use crate::source::{LocalTree, SvnTree, VcsClient};
use crate::sync::{RevisionMarker, RunState, RunSummary, SyncConfig, SyncEngine, UploadResult};

/// Push a plain directory tree.
pub async fn push(
    store: Arc<dyn ObjectStore>,
    root: PathBuf,
    config: SyncConfig,
) -> Result<RunSummary, SyncError> {
    let tree = LocalTree::new(root, true);
    SyncEngine::new(store, config).run(&tree).await
}

/// Settings of a working copy sync.
#[derive(Debug, Clone)]
pub struct SvnSyncRequest {
    pub root: PathBuf,
    pub marker_key: String,
    pub ignore_url: bool,
    pub revision: Option<u64>,
    pub config: SyncConfig,
}

/// Sync a working copy and record the published revision.
///
/// The marker is only rewritten after a run without failures that was not a
/// dry run.
pub async fn svn_sync<C>(
    store: Arc<dyn ObjectStore>,
    client: C,
    request: SvnSyncRequest,
) -> Result<RunSummary, SyncError>
where
    C: VcsClient + Send + 'static,
{
    let previous = RevisionMarker::load(store.as_ref(), &request.marker_key)
        .await
        .map_err(|source| SyncError::RemoteLookup {
            key: request.marker_key.clone(),
            source,
        })?;
    match &previous {
        Some(marker) => info!(revision = marker.revision, url = %marker.url, "last synced revision"),
        None => info!("no revision marker, first sync"),
    }

    let options = SvnOptions {
        recorded_url: previous.as_ref().map(|m| m.url.clone()),
        ignore_url: request.ignore_url,
        revision: request.revision,
        exclude_ignored: true,
    };
    let root = request.root.clone();
    let tree = tokio::task::spawn_blocking(move || SvnTree::open(&client, root, &options))
        .await
        .map_err(|e| SyncError::enumeration(&request.root, e.to_string()))??;
    let working = tree.info().clone();

    if let Some(marker) = &previous {
        if marker.revision > working.revision {
            warn!(
                synced = marker.revision,
                working = working.revision,
                "working copy is older than the last synced revision"
            );
        }
    }

    let config = SyncConfig {
        force: false,
        synced_revision: previous.as_ref().map(|m| m.revision),
        ..request.config
    };
    let dry_run = config.dry_run;
    let mut summary = SyncEngine::new(store.clone(), config).run(&tree).await?;

    if dry_run || summary.state() != RunState::AllSucceeded {
        return Ok(summary);
    }

    let url = match &previous {
        Some(marker) if request.ignore_url && !marker.url.is_empty() => marker.url.clone(),
        _ => working.url.clone(),
    };
    let marker = RevisionMarker {
        url,
        uuid: working.uuid.clone(),
        revision: working.revision,
        last_update: Some(Utc::now()),
    };
    match marker.save(store.as_ref(), &request.marker_key).await {
        Ok(()) => info!(revision = marker.revision, "recorded synced revision"),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "cannot record synced revision");
            summary.record(&UploadResult::failed(request.marker_key.clone(), format!("{:#}", e)));
        }
    }

    Ok(summary)
}
