use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::{
    byte_stream, BlobConfig, BlobError, BlobInfo, BlobResult, ByteStream, ContentDisposition, PutMode,
    S3CompatibleStore, SignParams, SignPolicy, SignedUrl, SignedUrlBlobStore, SigningPool, StoredBlob,
};

/// Gateway to one bucket of an object store.
///
/// Owns the store handle for its whole lifetime. Bulk signing shares the
/// handle read-only with the workers of a per-call [`SigningPool`]; the
/// handle is released when the gateway is dropped or [`closed`](Self::close).
pub struct BlobGateway {
    store: Arc<dyn SignedUrlBlobStore>,
    config: BlobConfig,
}

impl BlobGateway {
    /// Create a new gateway over a store
    pub fn new<S: SignedUrlBlobStore + 'static>(store: S, config: BlobConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// S3 store and gateway policy both read from the environment
    pub async fn connect_env() -> BlobResult<Self> {
        let config = BlobConfig::from_env()?;
        let store = S3CompatibleStore::from_env().await?;
        info!(bucket = store.bucket(), workers = config.signing_workers, "blob gateway connected");
        Ok(Self::new(store, config))
    }

    /// Get configuration
    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    /// Signing parameters with the configured default lifetime
    pub fn params<S: Into<String>>(&self, content_type: S, disposition: ContentDisposition) -> SignParams {
        SignParams::new(content_type, disposition, self.config.default_ttl)
    }

    /// Release the store handle
    pub fn close(self) {
        info!("blob gateway closed");
        // `self` drops here, taking the last gateway reference to the store
    }

    /// Fetch a blob. Fails with `NotFound` if the key is absent.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, key: &str) -> BlobResult<ByteStream> {
        let result = with_timeout(self.config.operation_timeout, "get", self.store.get(key)).await?;
        Ok(result.content)
    }

    /// Fetch a blob into memory
    pub async fn get_bytes(&self, key: &str) -> BlobResult<Bytes> {
        let stream = self.get(key).await?;
        collect(stream, None).await
    }

    /// Probe the store for `key`. Never cached.
    #[instrument(level = "debug", skip(self))]
    pub async fn exists(&self, key: &str) -> BlobResult<bool> {
        match with_timeout(self.config.operation_timeout, "head", self.store.head(key)).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Upload a blob. Without `force`, an existing key fails with
    /// `AlreadyExists`.
    pub async fn put(&self, key: &str, content: ByteStream, force: bool) -> BlobResult<StoredBlob> {
        self.put_as(key, None, content, force).await
    }

    /// Upload a blob with a stored content type.
    ///
    /// The non-forced path is check-then-write. Two first writers of the same
    /// key can both pass the check; the later write wins unless the store
    /// enforces create-only writes and `conditional_writes` is enabled.
    #[instrument(level = "debug", skip(self, content))]
    pub async fn put_as(
        &self,
        key: &str,
        content_type: Option<&str>,
        content: ByteStream,
        force: bool,
    ) -> BlobResult<StoredBlob> {
        let mode = if force {
            PutMode::Overwrite
        } else {
            if self.exists(key).await? {
                return Err(BlobError::already_exists(key));
            }
            if self.config.conditional_writes && self.store.supports_conditional_put() {
                PutMode::CreateOnly
            } else {
                PutMode::Overwrite
            }
        };

        self.write(key, content_type, content, mode).await
    }

    /// Overwrite an existing blob, keeping its stored content type. Fails
    /// with `NotFound` if the key is absent.
    #[instrument(level = "debug", skip(self, content))]
    pub async fn update(&self, key: &str, content: ByteStream) -> BlobResult<StoredBlob> {
        let head = with_timeout(self.config.operation_timeout, "head", self.store.head(key)).await?;
        self.write(key, head.content_type.as_deref(), content, PutMode::Overwrite).await
    }

    /// Remove a blob. Fails with `NotFound` if the key is absent.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, key: &str) -> BlobResult<()> {
        if !self.exists(key).await? {
            return Err(BlobError::not_found(key));
        }
        with_timeout(self.config.operation_timeout, "delete", self.store.delete(key)).await
    }

    /// Every blob in the bucket, optionally under a key prefix
    pub async fn list(&self, prefix: Option<&str>) -> BlobResult<Vec<BlobInfo>> {
        with_timeout(self.config.operation_timeout, "list", self.store.list(prefix, None)).await
    }

    /// Sign a GET URL for `key`. `Safe` checks existence first and fails
    /// with `NotFound`; `Fast` never contacts the store.
    #[instrument(level = "debug", skip(self, params), fields(content_type = %params.content_type))]
    pub async fn sign_url(&self, key: &str, params: &SignParams, policy: SignPolicy) -> BlobResult<SignedUrl> {
        if policy == SignPolicy::Safe && !self.exists(key).await? {
            return Err(BlobError::not_found(key));
        }
        with_timeout(self.config.operation_timeout, "sign", self.store.sign_get(key, params)).await
    }

    /// Safe signing that hands back `default` when the key is absent
    pub async fn sign_url_or<S: Into<String>>(&self, key: &str, params: &SignParams, default: S) -> BlobResult<String> {
        match self.sign_url(key, params, SignPolicy::Safe).await {
            Ok(signed) => Ok(signed.url),
            Err(err) if err.is_not_found() => Ok(default.into()),
            Err(err) => Err(err),
        }
    }

    /// Safe signing with absence as `None`
    pub async fn try_sign_url(&self, key: &str, params: &SignParams) -> BlobResult<Option<SignedUrl>> {
        match self.sign_url(key, params, SignPolicy::Safe).await {
            Ok(signed) => Ok(Some(signed)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Fast-sign every key on a bounded per-call pool. One result per key,
    /// in input order; existence is never checked.
    #[instrument(level = "debug", skip_all, fields(keys = keys.len()))]
    pub async fn sign_urls_bulk(&self, keys: Vec<String>, params: &SignParams) -> Vec<BlobResult<SignedUrl>> {
        let store = Arc::clone(&self.store);
        let params = Arc::new(params.clone());
        let timeout = self.config.operation_timeout;

        let results = SigningPool::new(self.config.signing_workers)
            .run(keys, move |key| {
                let store = Arc::clone(&store);
                let params = Arc::clone(&params);
                async move { with_timeout(timeout, "sign", store.sign_get(&key, &params)).await }
            })
            .await;

        log_failed_slots(&results);
        results
    }

    /// Fast-sign groups of keys. Key `i` of every group is signed with
    /// `content_types[i]`; one worker handles one whole group. A group whose
    /// length differs from `content_types` fails its own slot with `Invalid`.
    #[instrument(level = "debug", skip_all, fields(groups = groups.len()))]
    pub async fn sign_url_groups_bulk(
        &self,
        groups: Vec<Vec<String>>,
        content_types: &[&str],
        disposition: ContentDisposition,
        ttl: Duration,
    ) -> Vec<BlobResult<Vec<SignedUrl>>> {
        let store = Arc::clone(&self.store);
        let params: Arc<Vec<SignParams>> = Arc::new(
            content_types
                .iter()
                .map(|content_type| SignParams::new(*content_type, disposition, ttl))
                .collect(),
        );
        let timeout = self.config.operation_timeout;

        let results = SigningPool::new(self.config.signing_workers)
            .run(groups, move |group| {
                let store = Arc::clone(&store);
                let params = Arc::clone(&params);
                async move {
                    if group.len() != params.len() {
                        return Err(BlobError::invalid(format!(
                            "group of {} keys does not match {} content types",
                            group.len(),
                            params.len()
                        )));
                    }

                    let mut urls = Vec::with_capacity(group.len());
                    for (key, key_params) in group.iter().zip(params.iter()) {
                        urls.push(with_timeout(timeout, "sign", store.sign_get(key, key_params)).await?);
                    }
                    Ok(urls)
                }
            })
            .await;

        log_failed_slots(&results);
        results
    }

    async fn write(
        &self,
        key: &str,
        content_type: Option<&str>,
        content: ByteStream,
        mode: PutMode,
    ) -> BlobResult<StoredBlob> {
        let data = collect(content, Some(self.config.max_blob_bytes)).await?;
        debug!(key, size_bytes = data.len(), ?mode, "writing blob");

        with_timeout(
            self.config.operation_timeout,
            "put",
            self.store.put(key, content_type, byte_stream(data), mode),
        )
        .await
    }
}

/// Bound `future` by `limit`, when one is configured
async fn with_timeout<T, F>(limit: Option<Duration>, operation: &'static str, future: F) -> BlobResult<T>
where
    F: Future<Output = BlobResult<T>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, future)
            .await
            .map_err(|_| BlobError::Timeout { operation, after })?,
        None => future.await,
    }
}

/// Buffer a stream, refusing content above `max_bytes`
async fn collect(mut stream: ByteStream, max_bytes: Option<u64>) -> BlobResult<Bytes> {
    let mut data = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(max) = max_bytes {
            if (data.len() + chunk.len()) as u64 > max {
                return Err(BlobError::invalid(format!("Blob size exceeds maximum {}", max)));
            }
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}

fn log_failed_slots<T>(results: &[BlobResult<T>]) {
    for (index, result) in results.iter().enumerate() {
        if let Err(err) = result {
            warn!(index, error = %err, "bulk signing slot failed");
        }
    }
}
