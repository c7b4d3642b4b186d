use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    byte_stream, BlobError, BlobInfo, BlobReader, BlobResult, BlobStore, ByteStream, ObjectHead, PutMode,
    SignParams, SignedUrl, SignedUrlBlobStore, StoredBlob,
};

/// Per-key latency injected into signing, used to shuffle completion order
pub type SignDelay = Arc<dyn Fn(&str) -> Duration + Send + Sync>;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    head: ObjectHead,
}

#[derive(Debug, Default)]
struct Counters {
    remote_calls: AtomicUsize,
    signing_in_flight: AtomicUsize,
    peak_signing: AtomicUsize,
    versions: AtomicU64,
}

/// Counters observed by a `MemoryBlobStore`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    /// put/get/head/delete/list calls served
    pub remote_calls: usize,
    /// Highest number of `sign_get` calls in flight at once
    pub peak_signing: usize,
}

/// In-process store for tests and local development.
///
/// Clones share the same objects. `sign_get` produces
/// `memory://<bucket>/<key>?...` URLs carrying the same response overrides
/// an S3 presigned URL would.
#[derive(Clone)]
pub struct MemoryBlobStore {
    bucket: String,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    counters: Arc<Counters>,
    sign_delay: Option<SignDelay>,
    remote_delay: Option<Duration>,
}

impl MemoryBlobStore {
    pub fn new<S: Into<String>>(bucket: S) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            sign_delay: None,
            remote_delay: None,
        }
    }

    /// Sleep for `delay(key)` inside every `sign_get`
    pub fn with_sign_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.sign_delay = Some(Arc::new(delay));
        self
    }

    /// Sleep before serving every put/get/head/delete/list call
    pub fn with_remote_delay(mut self, delay: Duration) -> Self {
        self.remote_delay = Some(delay);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            remote_calls: self.counters.remote_calls.load(Ordering::SeqCst),
            peak_signing: self.counters.peak_signing.load(Ordering::SeqCst),
        }
    }

    /// Raw stored bytes, bypassing the call counters
    pub fn contents(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).map(|object| object.data.clone())
    }

    /// Clones of this store still alive, this one included
    pub fn live_handles(&self) -> usize {
        Arc::strong_count(&self.counters)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    async fn remote_call(&self) {
        self.counters.remote_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.remote_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn next_etag(&self) -> String {
        let version = self.counters.versions.fetch_add(1, Ordering::SeqCst) + 1;
        format!("\"mem-{:08x}\"", version)
    }
}

/// Tracks in-flight signing calls for the lifetime of one `sign_get`
struct SigningGuard<'a>(&'a Counters);

impl<'a> SigningGuard<'a> {
    fn enter(counters: &'a Counters) -> Self {
        let now = counters.signing_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_signing.fetch_max(now, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for SigningGuard<'_> {
    fn drop(&mut self) {
        self.0.signing_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        mut stream: ByteStream,
        mode: PutMode,
    ) -> BlobResult<StoredBlob> {
        self.remote_call().await;

        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }

        let head = ObjectHead {
            size_bytes: data.len() as u64,
            content_type: content_type.map(str::to_string),
            etag: Some(self.next_etag()),
            modified_at: Some(chrono::Utc::now()),
        };
        let stored = StoredBlob {
            key: key.to_string(),
            etag: head.etag.clone(),
            size_bytes: head.size_bytes,
        };
        let object = StoredObject {
            data: Bytes::from(data),
            head,
        };

        let mut objects = self.objects.write();
        if mode == PutMode::CreateOnly && objects.contains_key(key) {
            return Err(BlobError::already_exists(key));
        }
        objects.insert(key.to_string(), object);

        Ok(stored)
    }

    async fn get(&self, key: &str) -> BlobResult<BlobReader> {
        self.remote_call().await;
        let object = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::not_found(key))?;

        Ok(BlobReader {
            head: object.head,
            content: byte_stream(object.data),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        self.remote_call().await;
        self.objects
            .read()
            .get(key)
            .map(|object| object.head.clone())
            .ok_or_else(|| BlobError::not_found(key))
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.remote_call().await;
        // S3 semantics: deleting a missing key is not an error
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>, limit: Option<usize>) -> BlobResult<Vec<BlobInfo>> {
        self.remote_call().await;
        let objects = self.objects.read();
        let mut blobs: Vec<BlobInfo> = objects
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .map(|(key, object)| BlobInfo {
                key: key.clone(),
                head: ObjectHead {
                    content_type: None,
                    ..object.head.clone()
                },
            })
            .collect();

        // S3 lists keys in lexicographic order
        blobs.sort_by(|a, b| a.key.cmp(&b.key));
        if let Some(limit) = limit {
            blobs.truncate(limit);
        }
        Ok(blobs)
    }

    fn supports_conditional_put(&self) -> bool {
        true
    }
}

#[async_trait]
impl SignedUrlBlobStore for MemoryBlobStore {
    async fn sign_get(&self, key: &str, params: &SignParams) -> BlobResult<SignedUrl> {
        params.validate()?;
        let _guard = SigningGuard::enter(&self.counters);

        if let Some(delay) = &self.sign_delay {
            tokio::time::sleep(delay(key)).await;
        }

        Ok(SignedUrl {
            key: key.to_string(),
            url: format!(
                "memory://{}/{}?response-content-type={}&response-content-disposition={}&X-Amz-Expires={}",
                self.bucket,
                key,
                params.content_type,
                params.disposition,
                params.ttl.as_secs()
            ),
            expires_at: params.expires_at(),
        })
    }
}
