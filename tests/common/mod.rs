// Shared fixtures for integration tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use mediasync::fs::{ObjectHeaders, ObjectStore, RemoteState};

/// An object as held by [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub payload: Vec<u8>,
    pub headers: ObjectHeaders,
    pub modified: DateTime<Utc>,
}

/// In-memory bucket counting every call.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_puts: Mutex<HashSet<String>>,
    heads: AtomicUsize,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an object as if uploaded earlier from a `source_size` byte file.
    pub fn seed(&self, key: &str, source_size: u64, modified: DateTime<Utc>) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                payload: vec![0; source_size as usize],
                headers: ObjectHeaders {
                    source_size,
                    ..Default::default()
                },
                modified,
            },
        );
    }

    /// Make every put of `key` fail.
    pub fn fail_put(&self, key: &str) {
        self.fail_puts.lock().unwrap().insert(key.to_string());
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn heads(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.heads.store(0, Ordering::SeqCst);
        self.gets.store(0, Ordering::SeqCst);
        self.puts.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head(&self, key: &str) -> Result<Option<RemoteState>> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().unwrap().get(key).map(|o| RemoteState {
            size: o.headers.source_size,
            modified: Some(o.modified),
            etag: None,
        }))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.objects.lock().unwrap().get(key).map(|o| o.payload.clone()))
    }

    async fn put(&self, key: &str, payload: Vec<u8>, headers: &ObjectHeaders) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.lock().unwrap().contains(key) {
            bail!("injected failure for {}", key);
        }
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                payload,
                headers: headers.clone(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }
}

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}
