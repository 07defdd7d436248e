//! Per-record upload decisions.

use std::sync::Arc;
use tracing::debug;

use crate::error::SyncError;
use crate::fs::{ObjectStore, RemoteState};
use crate::sync::types::{AssetRecord, DecisionReason, LocalSignal, UploadDecision};

/// Compares local records with remote object state.
#[derive(Clone)]
pub struct DiffPlanner {
    store: Arc<dyn ObjectStore>,
    force: bool,
    /// Revision recorded by the last successful working copy sync.
    synced_revision: Option<u64>,
}

impl DiffPlanner {
    pub fn new(store: Arc<dyn ObjectStore>, force: bool, synced_revision: Option<u64>) -> Self {
        Self {
            store,
            force,
            synced_revision,
        }
    }

    /// Decide what to do with one record.
    ///
    /// With `force` set no lookup is made at all.
    pub async fn decide(&self, record: &AssetRecord) -> Result<UploadDecision, SyncError> {
        if self.force {
            return Ok(UploadDecision::ForceUpload);
        }

        let remote = self
            .store
            .head(&record.logical_key)
            .await
            .map_err(|source| SyncError::RemoteLookup {
                key: record.logical_key.clone(),
                source,
            })?;

        let decision = match remote {
            None => UploadDecision::Upload {
                reason: DecisionReason::NewObject,
            },
            Some(remote) => self.compare(record, &remote),
        };

        debug!(key = %record.logical_key, signal = %record.signal, decision = ?decision, "planned");
        Ok(decision)
    }

    fn compare(&self, record: &AssetRecord, remote: &RemoteState) -> UploadDecision {
        if record.size != remote.size {
            return UploadDecision::Upload {
                reason: DecisionReason::SizeDiffers {
                    local: record.size,
                    remote: remote.size,
                },
            };
        }

        if self.is_newer(record.signal, remote) {
            UploadDecision::Upload {
                reason: DecisionReason::NewerLocal,
            }
        } else {
            UploadDecision::Skip {
                reason: DecisionReason::Unchanged,
            }
        }
    }

    fn is_newer(&self, signal: LocalSignal, remote: &RemoteState) -> bool {
        match signal {
            // No remote timestamp counts as not older
            LocalSignal::Modified(local) => remote.modified.is_some_and(|remote| local > remote),
            LocalSignal::Revision(changed) => match self.synced_revision {
                Some(synced) => changed > synced,
                None => true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::backend::MockObjectStore;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn record(key: &str, size: u64, signal: LocalSignal) -> AssetRecord {
        AssetRecord {
            local_path: PathBuf::from("/srv/media").join(key),
            logical_key: key.to_string(),
            size,
            signal,
        }
    }

    fn mtime(hour: u32) -> LocalSignal {
        LocalSignal::Modified(Utc.with_ymd_and_hms(2024, 5, 10, hour, 0, 0).unwrap())
    }

    fn remote(size: u64, hour: Option<u32>) -> RemoteState {
        RemoteState {
            size,
            modified: hour.map(|h| Utc.with_ymd_and_hms(2024, 5, 10, h, 0, 0).unwrap()),
            etag: None,
        }
    }

    fn planner_with(mock: MockObjectStore, force: bool, synced: Option<u64>) -> DiffPlanner {
        DiffPlanner::new(Arc::new(mock), force, synced)
    }

    #[tokio::test]
    async fn test_force_makes_no_lookup() {
        let mut mock = MockObjectStore::new();
        mock.expect_head().times(0);
        let planner = planner_with(mock, true, None);

        let decision = planner.decide(&record("a.css", 10, mtime(9))).await.unwrap();
        assert_eq!(decision, UploadDecision::ForceUpload);
    }

    #[tokio::test]
    async fn test_absent_object_is_uploaded() {
        let mut mock = MockObjectStore::new();
        mock.expect_head().times(1).returning(|_| Ok(None));
        let planner = planner_with(mock, false, None);

        let decision = planner.decide(&record("a.css", 10, mtime(9))).await.unwrap();
        assert_eq!(
            decision,
            UploadDecision::Upload {
                reason: DecisionReason::NewObject
            }
        );
    }

    #[tokio::test]
    async fn test_size_change_always_uploads() {
        let mut mock = MockObjectStore::new();
        mock.expect_head()
            .withf(|key| key == "js/b.js")
            .returning(|_| Ok(Some(remote(100, Some(12)))));
        let planner = planner_with(mock, false, None);

        // Local file is older but bigger
        let decision = planner.decide(&record("js/b.js", 120, mtime(8))).await.unwrap();
        assert_eq!(
            decision,
            UploadDecision::Upload {
                reason: DecisionReason::SizeDiffers { local: 120, remote: 100 }
            }
        );
    }

    #[tokio::test]
    async fn test_timestamp_comparison() {
        let mut mock = MockObjectStore::new();
        mock.expect_head().returning(|_| Ok(Some(remote(10, Some(10)))));
        let planner = planner_with(mock, false, None);

        let newer = planner.decide(&record("a.css", 10, mtime(11))).await.unwrap();
        assert_eq!(newer.reason(), DecisionReason::NewerLocal);

        let same = planner.decide(&record("a.css", 10, mtime(10))).await.unwrap();
        assert!(same.is_skip());

        let older = planner.decide(&record("a.css", 10, mtime(9))).await.unwrap();
        assert!(older.is_skip());
    }

    #[tokio::test]
    async fn test_missing_remote_timestamp_skips() {
        let mut mock = MockObjectStore::new();
        mock.expect_head().returning(|_| Ok(Some(remote(10, None))));
        let planner = planner_with(mock, false, None);

        let decision = planner.decide(&record("a.css", 10, mtime(23))).await.unwrap();
        assert!(decision.is_skip());
    }

    #[tokio::test]
    async fn test_revision_against_synced_baseline() {
        let mut mock = MockObjectStore::new();
        mock.expect_head().returning(|_| Ok(Some(remote(10, Some(10)))));
        let planner = planner_with(mock, false, Some(40));

        let changed = planner
            .decide(&record("a.css", 10, LocalSignal::Revision(41)))
            .await
            .unwrap();
        assert_eq!(changed.reason(), DecisionReason::NewerLocal);

        let untouched = planner
            .decide(&record("a.css", 10, LocalSignal::Revision(40)))
            .await
            .unwrap();
        assert!(untouched.is_skip());
    }

    #[tokio::test]
    async fn test_revision_without_baseline_is_newer() {
        let mut mock = MockObjectStore::new();
        mock.expect_head().returning(|_| Ok(Some(remote(10, Some(10)))));
        let planner = planner_with(mock, false, None);

        let decision = planner
            .decide(&record("a.css", 10, LocalSignal::Revision(3)))
            .await
            .unwrap();
        assert_eq!(decision.reason(), DecisionReason::NewerLocal);
    }

    #[tokio::test]
    async fn test_lookup_error_is_per_record() {
        let mut mock = MockObjectStore::new();
        mock.expect_head()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let planner = planner_with(mock, false, None);

        let err = planner
            .decide(&record("img/logo.png", 10, mtime(9)))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteLookup { ref key, .. } if key == "img/logo.png"));
        assert!(!err.is_fatal());
    }
}
