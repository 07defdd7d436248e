use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::str::FromStr;

#[cfg(test)]
use mockall::automock;

/// User metadata entry recording the size of the source file behind a payload.
pub const SOURCE_SIZE_METADATA: &str = "source-size";

/// Metadata of an object as currently stored remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteState {
    /// Size of the source file the object was built from. Falls back to the
    /// stored content length for objects not written by this tool.
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// Headers sent along with a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHeaders {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    /// Size of the untransformed source file.
    pub source_size: u64,
}

impl ObjectHeaders {
    /// Header name/value pairs, for logging.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = &self.content_type {
            pairs.push(("Content-Type", v.clone()));
        }
        if let Some(v) = &self.content_encoding {
            pairs.push(("Content-Encoding", v.clone()));
        }
        if let Some(v) = &self.cache_control {
            pairs.push(("Cache-Control", v.clone()));
        }
        if let Some(v) = &self.expires {
            pairs.push(("Expires", v.clone()));
        }
        pairs
    }

    /// User metadata attached to the stored object.
    pub fn user_metadata(&self) -> Vec<(String, String)> {
        let mut meta = vec![(
            SOURCE_SIZE_METADATA.to_string(),
            self.source_size.to_string(),
        )];
        // No first-class Expires option on every backend, so it travels as metadata too.
        if let Some(expires) = &self.expires {
            meta.push(("expires".to_string(), expires.clone()));
        }
        meta
    }
}

/// S3-compatible storage providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum S3Provider {
    #[default]
    Aws,
    DigitalOcean,
    Hetzner,
    MinIO,
    CloudflareR2,
    Wasabi,
}

impl S3Provider {
    /// Endpoint URL for this provider; `None` means the default AWS endpoint.
    pub fn endpoint(&self, region: &str) -> Option<String> {
        match self {
            S3Provider::Aws => None,
            S3Provider::DigitalOcean => Some(format!("https://{}.digitaloceanspaces.com", region)),
            S3Provider::Hetzner => Some(format!("https://{}.your-objectstorage.com", region)),
            S3Provider::MinIO => Some("http://localhost:9000".to_string()),
            S3Provider::CloudflareR2 => Some(format!("https://{}.r2.cloudflarestorage.com", region)),
            S3Provider::Wasabi => Some(format!("https://s3.{}.wasabisys.com", region)),
        }
    }

    /// Human-readable provider name, for logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            S3Provider::Aws => "AWS S3",
            S3Provider::DigitalOcean => "DigitalOcean Spaces",
            S3Provider::Hetzner => "Hetzner Object Storage",
            S3Provider::MinIO => "MinIO",
            S3Provider::CloudflareR2 => "Cloudflare R2",
            S3Provider::Wasabi => "Wasabi",
        }
    }
}

impl FromStr for S3Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "aws" | "s3" => Ok(Self::Aws),
            "digitalocean" | "do" => Ok(Self::DigitalOcean),
            "hetzner" => Ok(Self::Hetzner),
            "minio" => Ok(Self::MinIO),
            "r2" | "cloudflare" | "cloudflare-r2" => Ok(Self::CloudflareR2),
            "wasabi" => Ok(Self::Wasabi),
            other => anyhow::bail!("unknown storage provider '{}'", other),
        }
    }
}

/// Bucket-style object store the sync engine pushes to.
///
/// Implementations must be safe for concurrent calls on distinct keys.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch object metadata. `Ok(None)` when the key does not exist.
    async fn head(&self, key: &str) -> Result<Option<RemoteState>>;

    /// Read a whole object. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace an object.
    async fn put(&self, key: &str, payload: Vec<u8>, headers: &ObjectHeaders) -> Result<()>;

    /// Location of a key, for display.
    fn display_key(&self, key: &str) -> String {
        key.to_string()
    }
}
