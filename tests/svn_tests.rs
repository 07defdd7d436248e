// Working copy sync and revision marker

mod common;

use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use common::{write_file, MemoryStore};
use mediasync::commands::{self, SvnSyncRequest};
use mediasync::source::svn::{parse_status, StatusEntry};
use mediasync::source::{VcsClient, WorkingCopyInfo};
use mediasync::sync::marker::DEFAULT_MARKER_KEY;
use mediasync::sync::{RevisionMarker, RunState, SyncConfig};

const URL: &str = "https://svn.example.com/repo/media";

struct FakeSvn {
    url: &'static str,
    revision: u64,
    status: String,
}

impl FakeSvn {
    fn at(revision: u64, status: &str) -> Self {
        Self {
            url: URL,
            revision,
            status: status.to_string(),
        }
    }
}

impl VcsClient for FakeSvn {
    fn info(&self, _root: &Path) -> Result<WorkingCopyInfo> {
        Ok(WorkingCopyInfo {
            url: self.url.to_string(),
            revision: self.revision,
            uuid: Some("6a1b2c3d-0000-4000-8000-123456789abc".to_string()),
        })
    }

    fn status(&self, _root: &Path) -> Result<Vec<StatusEntry>> {
        Ok(parse_status(&self.status))
    }
}

const CLEAN: &str = concat!(
    "                57       57 alice        .\n",
    "                57       41 bob          css/site.css\n",
    "                57       33 alice        img/logo.png\n",
);

fn working_copy() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "css/site.css", b"body{}");
    write_file(dir.path(), "img/logo.png", b"\x89PNG");
    dir
}

fn request(root: &Path) -> SvnSyncRequest {
    SvnSyncRequest {
        root: root.to_path_buf(),
        marker_key: DEFAULT_MARKER_KEY.to_string(),
        ignore_url: false,
        revision: None,
        config: SyncConfig {
            workers: 2,
            ..Default::default()
        },
    }
}

async fn marker(store: &MemoryStore) -> Option<RevisionMarker> {
    RevisionMarker::load(store, DEFAULT_MARKER_KEY).await.unwrap()
}

#[tokio::test]
async fn test_first_sync_uploads_and_records_revision() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());

    let summary = commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), request(dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.state(), RunState::AllSucceeded);
    assert_eq!(summary.uploaded, 2);

    let recorded = marker(&store).await.unwrap();
    assert_eq!(recorded.revision, 57);
    assert_eq!(recorded.url, URL);
    assert!(recorded.uuid.is_some());
    assert!(recorded.last_update.is_some());
}

#[tokio::test]
async fn test_root_entry_is_listed_but_not_uploaded() {
    let entries = parse_status(CLEAN);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].path, ".");

    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());
    commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), request(dir.path()))
        .await
        .unwrap();

    assert_eq!(store.keys(), vec![DEFAULT_MARKER_KEY, "css/site.css", "img/logo.png"]);
}

#[tokio::test]
async fn test_unchanged_revision_skips_everything() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());
    commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), request(dir.path()))
        .await
        .unwrap();

    store.reset_counters();
    let summary = commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), request(dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 0);
    assert_eq!(summary.skipped, 2);
    // Only the marker is rewritten
    assert_eq!(store.puts(), 1);
}

#[tokio::test]
async fn test_newer_revision_uploads_changed_file() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());
    commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), request(dir.path()))
        .await
        .unwrap();

    let status = concat!(
        "                60       60 alice        .\n",
        "                60       60 bob          css/site.css\n",
        "                60       33 alice        img/logo.png\n",
    );
    let summary = commands::svn_sync(store.clone(), FakeSvn::at(60, status), request(dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(marker(&store).await.unwrap().revision, 60);
}

#[tokio::test]
async fn test_dry_run_leaves_marker_alone() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());

    let mut dry = request(dir.path());
    dry.config.dry_run = true;
    let summary = commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), dry)
        .await
        .unwrap();

    assert_eq!(summary.would_upload, 2);
    assert_eq!(store.puts(), 0);
    assert!(marker(&store).await.is_none());
}

#[tokio::test]
async fn test_failed_upload_leaves_marker_alone() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());
    store.fail_put("img/logo.png");

    let summary = commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), request(dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.state(), RunState::CompletedWithFailures);
    assert!(marker(&store).await.is_none());
}

#[tokio::test]
async fn test_local_modification_aborts_before_upload() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());
    let status = concat!(
        "M               57       41 bob          css/site.css\n",
        "                57       33 alice        img/logo.png\n",
    );

    let err = commands::svn_sync(store.clone(), FakeSvn::at(57, status), request(dir.path()))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(err.to_string().contains("css/site.css"));
    assert_eq!(store.puts(), 0);
}

#[tokio::test]
async fn test_url_mismatch_aborts_unless_ignored() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());
    commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), request(dir.path()))
        .await
        .unwrap();

    let moved = FakeSvn {
        url: "https://svn.example.com/repo/branches/media",
        ..FakeSvn::at(57, CLEAN)
    };
    let err = commands::svn_sync(store.clone(), moved, request(dir.path()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("--ignore-url"));

    let moved = FakeSvn {
        url: "https://svn.example.com/repo/branches/media",
        ..FakeSvn::at(57, CLEAN)
    };
    let mut ignoring = request(dir.path());
    ignoring.ignore_url = true;
    let summary = commands::svn_sync(store.clone(), moved, ignoring).await.unwrap();
    assert_eq!(summary.state(), RunState::AllSucceeded);

    // The stored URL is kept
    assert_eq!(marker(&store).await.unwrap().url, URL);
}

/// Records the thread every `svn` call runs on.
struct ThreadRecordingSvn {
    inner: FakeSvn,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl VcsClient for ThreadRecordingSvn {
    fn info(&self, root: &Path) -> Result<WorkingCopyInfo> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        self.inner.info(root)
    }

    fn status(&self, root: &Path) -> Result<Vec<StatusEntry>> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        self.inner.status(root)
    }
}

#[tokio::test]
async fn test_svn_calls_run_off_the_async_thread() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());
    let threads = Arc::new(Mutex::new(Vec::new()));
    let client = ThreadRecordingSvn {
        inner: FakeSvn::at(57, CLEAN),
        threads: threads.clone(),
    };

    let summary = commands::svn_sync(store, client, request(dir.path())).await.unwrap();
    assert_eq!(summary.uploaded, 2);

    let async_thread = std::thread::current().id();
    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 2);
    assert!(threads.iter().all(|id| *id != async_thread));
}

#[tokio::test]
async fn test_requested_revision_mismatch_aborts() {
    let dir = working_copy();
    let store = Arc::new(MemoryStore::new());
    let mut wrong = request(dir.path());
    wrong.revision = Some(58);

    let err = commands::svn_sync(store.clone(), FakeSvn::at(57, CLEAN), wrong)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(store.puts(), 0);
}
