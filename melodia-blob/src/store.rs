//! Storage primitives the gateway is written against. Implementations move
//! bytes and mint URLs; existence rules and signing policy live in
//! [`BlobGateway`](crate::BlobGateway).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{BlobResult, ByteStream, PutMode, SignParams, SignedUrl};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `content` under `key`. With `PutMode::CreateOnly` a taken key
    /// must fail with `AlreadyExists`.
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        content: ByteStream,
        mode: PutMode,
    ) -> BlobResult<StoredBlob>;

    /// Open `key` for reading; `NotFound` if absent
    async fn get(&self, key: &str) -> BlobResult<BlobReader>;

    /// Metadata of `key` without its body; `NotFound` if absent
    async fn head(&self, key: &str) -> BlobResult<ObjectHead>;

    /// Removing an absent key is not an error at this level
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Keys under `prefix` in lexicographic order, at most `limit` of them
    async fn list(&self, prefix: Option<&str>, limit: Option<usize>) -> BlobResult<Vec<BlobInfo>>;

    /// Whether the backend enforces `PutMode::CreateOnly` atomically
    fn supports_conditional_put(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait SignedUrlBlobStore: BlobStore {
    /// Presign a GET for `key`. Never contacts the store and never checks
    /// that the key exists.
    async fn sign_get(&self, key: &str, params: &SignParams) -> BlobResult<SignedUrl>;
}

/// Outcome of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Metadata reported by `head`, `get` and `list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHead {
    pub size_bytes: u64,
    /// Listings do not carry it
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// An open blob
pub struct BlobReader {
    pub head: ObjectHead,
    pub content: ByteStream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: String,
    pub head: ObjectHead,
}
