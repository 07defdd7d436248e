//! Payload transformation applied just before upload.
//!
//! Gzip compression for scripts and stylesheets plus far-future caching
//! headers. The current time is an input, so equal inputs always give equal
//! outputs and a retried task sends exactly the same bytes.

use chrono::{DateTime, Duration, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

use crate::fs::ObjectHeaders;

/// Content types gzip is applied to.
pub const GZIP_CONTENT_TYPES: &[&str] = &[
    "text/css",
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
];

/// Caching window used by the expires option.
pub const EXPIRES_WINDOW_DAYS: i64 = 365 * 2;

const GZIP_LEVEL: u32 = 6;

/// Options selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub gzip: bool,
    pub expires: bool,
}

/// Exact bytes and headers to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedObject {
    pub payload: Vec<u8>,
    pub headers: ObjectHeaders,
}

impl TransformedObject {
    pub fn is_compressed(&self) -> bool {
        self.headers.content_encoding.as_deref() == Some("gzip")
    }
}

/// Guess a content type from the file extension.
pub fn content_type_for(path: &str) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

/// Whether gzip may be applied to a content type.
pub fn is_gzip_candidate(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| GZIP_CONTENT_TYPES.contains(&ct))
}

/// Format a timestamp as an HTTP date (RFC 7231 IMF-fixdate).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Compress data with gzip.
///
/// The gzip header carries no timestamp or file name, so output is
/// deterministic.
pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(GZIP_LEVEL));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Applies [`TransformOptions`] to file contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentTransformer {
    options: TransformOptions,
}

impl ContentTransformer {
    pub fn new(options: TransformOptions) -> Self {
        Self { options }
    }

    /// Build the payload and headers for `data`, whose type is taken from `key`.
    pub fn transform(
        &self,
        key: &str,
        data: Vec<u8>,
        now: DateTime<Utc>,
    ) -> std::io::Result<TransformedObject> {
        let content_type = content_type_for(key);
        let mut headers = ObjectHeaders {
            content_type: content_type.map(str::to_string),
            source_size: data.len() as u64,
            ..Default::default()
        };

        if self.options.expires {
            let window = Duration::days(EXPIRES_WINDOW_DAYS);
            headers.expires = Some(http_date(now + window));
            headers.cache_control = Some(format!("public, max-age={}", window.num_seconds()));
        }

        let payload = if self.options.gzip && is_gzip_candidate(content_type) {
            headers.content_encoding = Some("gzip".to_string());
            gzip(&data)?
        } else {
            data
        };

        Ok(TransformedObject { payload, headers })
    }
}
