//! Revision marker of working copy syncs.
//!
//! A small YAML document stored next to the published media recording which
//! repository and revision the bucket contents correspond to.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fs::{ObjectHeaders, ObjectStore};

/// Default key of the marker object.
pub const DEFAULT_MARKER_KEY: &str = ".mediasync/svn_revision.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionMarker {
    /// Repository URL of the working copy that was published.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub uuid: Option<String>,
    pub revision: u64,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

impl RevisionMarker {
    /// Read the marker; `Ok(None)` when no sync was recorded yet.
    pub async fn load(store: &dyn ObjectStore, key: &str) -> Result<Option<Self>> {
        let Some(bytes) = store.get(key).await.context("Failed to fetch revision marker")? else {
            return Ok(None);
        };
        let marker: Self = serde_yaml::from_slice(&bytes)
            .with_context(|| format!("Revision marker {} is not valid YAML", key))?;
        debug!(key, revision = marker.revision, url = %marker.url, "loaded revision marker");
        Ok(Some(marker))
    }

    /// Store the marker, replacing any previous one.
    pub async fn save(&self, store: &dyn ObjectStore, key: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize revision marker")?;
        let headers = ObjectHeaders {
            content_type: Some("application/x-yaml".to_string()),
            source_size: yaml.len() as u64,
            ..Default::default()
        };
        store
            .put(key, yaml.into_bytes(), &headers)
            .await
            .context("Failed to store revision marker")?;
        debug!(key, revision = self.revision, "stored revision marker");
        Ok(())
    }
}
