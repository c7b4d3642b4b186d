use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::{BlobError, BlobResult};

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Longest expiration S3 accepts for a presigned request.
pub const MAX_SIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Wrap an in-memory buffer as a single-chunk byte stream
pub fn byte_stream<B: Into<Bytes>>(content: B) -> ByteStream {
    let chunk = content.into();
    Box::pin(futures::stream::once(async move { Ok(chunk) }))
}

/// Value of the `Content-Disposition` header embedded in a signed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentDisposition {
    #[default]
    Inline,
    Attachment,
}

impl ContentDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

impl std::fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response overrides and lifetime of a signed GET URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignParams {
    pub content_type: String,
    pub disposition: ContentDisposition,
    pub ttl: Duration,
}

impl SignParams {
    pub fn new<S: Into<String>>(content_type: S, disposition: ContentDisposition, ttl: Duration) -> Self {
        Self {
            content_type: content_type.into(),
            disposition,
            ttl,
        }
    }

    /// Same overrides, different content type
    pub fn with_content_type<S: Into<String>>(&self, content_type: S) -> Self {
        Self {
            content_type: content_type.into(),
            ..self.clone()
        }
    }

    /// Reject lifetimes the presigner cannot honour
    pub fn validate(&self) -> BlobResult<()> {
        if self.ttl < Duration::from_secs(1) || self.ttl > MAX_SIGNED_URL_TTL {
            return Err(BlobError::invalid(format!(
                "Signed URL ttl must be between 1s and {}s, got {:?}",
                MAX_SIGNED_URL_TTL.as_secs(),
                self.ttl
            )));
        }
        Ok(())
    }

    /// Expiry instant for a URL signed now
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::seconds(self.ttl.as_secs() as i64)
    }
}

/// Time-boxed read capability for a single key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    pub key: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl std::fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// Whether signing checks that the key exists first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPolicy {
    /// Extra round-trip; absent keys fail with `NotFound`
    Safe,
    /// No round-trip; the URL may point at nothing
    Fast,
}

/// How a store write treats an existing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    Overwrite,
    /// Fail with `AlreadyExists` instead of replacing the object
    CreateOnly,
}
