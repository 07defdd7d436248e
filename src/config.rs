//! Deployment settings.
//!
//! Read from an optional TOML file, then overridden by environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::fs::{S3Provider, S3Store};
use crate::sync::marker::DEFAULT_MARKER_KEY;

pub const ENV_ACCESS_KEY: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_BUCKET: &str = "AWS_BUCKET_NAME";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ENDPOINT: &str = "AWS_ENDPOINT_URL";
pub const ENV_MEDIA_ROOT: &str = "MEDIA_ROOT";
pub const ENV_PROVIDER: &str = "MEDIASYNC_PROVIDER";

const DEFAULT_REGION: &str = "us-east-1";

/// Raw settings, every key optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    pub media_root: Option<PathBuf>,
    pub svn_marker_key: Option<String>,
}

/// Validated settings a run can use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    pub provider: S3Provider,
    pub endpoint: Option<String>,
    pub media_root: PathBuf,
    pub svn_marker_key: String,
}

impl Settings {
    /// `<config dir>/mediasync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mediasync").join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self, SyncError> {
        toml::from_str(text).map_err(|e| SyncError::configuration(format!("invalid settings file: {}", e)))
    }

    /// Load the settings file.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, SyncError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            debug!(path = %path.display(), "no settings file");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            SyncError::configuration(format!("cannot read settings file {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "loaded settings file");
        Self::from_toml(&text)
    }

    /// Override keys with values from `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ACCESS_KEY) {
            self.access_key_id = Some(v);
        }
        if let Some(v) = get(ENV_SECRET_KEY) {
            self.secret_access_key = Some(v);
        }
        if let Some(v) = get(ENV_BUCKET) {
            self.bucket = Some(v);
        }
        if let Some(v) = get(ENV_REGION) {
            self.region = Some(v);
        }
        if let Some(v) = get(ENV_ENDPOINT) {
            self.endpoint = Some(v);
        }
        if let Some(v) = get(ENV_MEDIA_ROOT) {
            self.media_root = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_PROVIDER) {
            self.provider = Some(v);
        }
        self
    }

    /// Override keys from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    pub fn validate(self) -> Result<DeploySettings, SyncError> {
        let (Some(access_key_id), Some(secret_access_key)) = (
            non_empty(self.access_key_id),
            non_empty(self.secret_access_key),
        ) else {
            return Err(SyncError::configuration(format!(
                "missing credentials, supply both {} and {}",
                ENV_ACCESS_KEY, ENV_SECRET_KEY
            )));
        };

        let bucket = non_empty(self.bucket)
            .ok_or_else(|| SyncError::configuration(format!("{} must be set", ENV_BUCKET)))?;

        let media_root = self
            .media_root
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| SyncError::configuration(format!("{} must be set", ENV_MEDIA_ROOT)))?;

        let provider = match non_empty(self.provider) {
            Some(name) => name
                .parse::<S3Provider>()
                .map_err(|e| SyncError::configuration(e.to_string()))?,
            None => S3Provider::default(),
        };

        Ok(DeploySettings {
            access_key_id,
            secret_access_key,
            bucket,
            region: non_empty(self.region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            provider,
            endpoint: non_empty(self.endpoint),
            media_root,
            svn_marker_key: non_empty(self.svn_marker_key).unwrap_or_else(|| DEFAULT_MARKER_KEY.to_string()),
        })
    }
}

impl DeploySettings {
    /// Connect to the configured bucket.
    pub fn open_store(&self) -> Result<S3Store, SyncError> {
        S3Store::new(
            &self.bucket,
            &self.region,
            &self.access_key_id,
            &self.secret_access_key,
            self.provider,
            self.endpoint.as_deref(),
        )
        .map_err(|e| SyncError::configuration(format!("{:#}", e)))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
