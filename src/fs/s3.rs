use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opendal::{services::S3, ErrorKind, Operator};
use std::time::SystemTime;

use crate::fs::backend::{ObjectHeaders, ObjectStore, RemoteState, S3Provider, SOURCE_SIZE_METADATA};

/// S3 and S3-compatible object store using OpenDAL
pub struct S3Store {
    operator: Operator,
    bucket: String,
}

impl S3Store {
    /// Create a store with explicit credentials.
    ///
    /// `endpoint` overrides the provider's endpoint when set.
    pub fn new(
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        provider: S3Provider,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let mut builder = S3::default()
            .bucket(bucket)
            .region(region)
            .access_key_id(access_key)
            .secret_access_key(secret_key);

        if let Some(endpoint) = endpoint.map(str::to_string).or_else(|| provider.endpoint(region)) {
            builder = builder.endpoint(&endpoint);
        }

        let operator = Operator::new(builder)
            .context("Failed to configure S3 operator")?
            .finish();

        Ok(Self {
            operator,
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head(&self, key: &str) -> Result<Option<RemoteState>> {
        let key = key.trim_start_matches('/');
        let meta = match self.operator.stat(key).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to stat S3 object {}", key)),
        };

        let source_size = meta
            .user_metadata()
            .and_then(|m| m.get(SOURCE_SIZE_METADATA))
            .and_then(|v| v.parse::<u64>().ok());

        Ok(Some(RemoteState {
            size: source_size.unwrap_or_else(|| meta.content_length()),
            modified: meta.last_modified().map(|t| to_utc(SystemTime::from(t))),
            etag: meta.etag().map(|e| e.trim_matches('"').to_string()),
        }))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.trim_start_matches('/');
        match self.operator.read(key).await {
            Ok(content) => Ok(Some(content.to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read S3 object {}", key)),
        }
    }

    async fn put(&self, key: &str, payload: Vec<u8>, headers: &ObjectHeaders) -> Result<()> {
        let key = key.trim_start_matches('/');

        let mut write = self
            .operator
            .write_with(key, payload)
            .user_metadata(headers.user_metadata());
        if let Some(content_type) = &headers.content_type {
            write = write.content_type(content_type);
        }
        if let Some(encoding) = &headers.content_encoding {
            write = write.content_encoding(encoding);
        }
        if let Some(cache_control) = &headers.cache_control {
            write = write.cache_control(cache_control);
        }

        write
            .await
            .with_context(|| format!("Failed to upload to S3: {}", key))?;

        Ok(())
    }

    fn display_key(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key.trim_start_matches('/'))
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
