use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream as AwsByteStream, DateTime as AwsDateTime};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::env;
use tracing::debug;

use crate::{
    BlobError, BlobInfo, BlobReader, BlobResult, BlobStore, ByteStream, ObjectHead, PutMode, SignParams,
    SignedUrl, SignedUrlBlobStore, StoredBlob,
};

const DEFAULT_ENDPOINT: &str = "https://storage.yandexcloud.net";
const DEFAULT_REGION: &str = "ru-central1";
const DEFAULT_BUCKET: &str = "melodia";

/// Connection settings for an S3-compatible endpoint
#[derive(Clone)]
pub struct S3Config {
    pub endpoint_url: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    pub force_path_style: bool,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

impl S3Config {
    pub fn new<S: Into<String>>(access_key_id: S, secret_access_key: S) -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            force_path_style: false,
        }
    }

    /// Read `MELODIA_S3_*` variables; only the credentials are required
    pub fn from_env() -> BlobResult<Self> {
        fn get_env(key: &str) -> BlobResult<String> {
            env::var(key).map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        let mut config = Self::new(
            get_env("MELODIA_S3_ACCESS_KEY_ID")?,
            get_env("MELODIA_S3_SECRET_ACCESS_KEY")?,
        );
        if let Ok(endpoint) = env::var("MELODIA_S3_ENDPOINT_URL") {
            config.endpoint_url = endpoint;
        }
        if let Ok(region) = env::var("MELODIA_S3_REGION") {
            config.region = region;
        }
        if let Ok(bucket) = env::var("MELODIA_S3_BUCKET") {
            config.bucket = bucket;
        }
        if let Some(path_style) = crate::config::parse_env::<bool>("MELODIA_S3_FORCE_PATH_STYLE")? {
            config.force_path_style = path_style;
        }

        Ok(config)
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint_url: S) -> Self {
        self.endpoint_url = endpoint_url.into();
        self
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_path_style(mut self) -> Self {
        self.force_path_style = true;
        self
    }
}

/// S3-compatible store for one fixed bucket, backed by the AWS SDK
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    /// Build a client for the configured endpoint and static credentials
    pub async fn connect(config: S3Config) -> Self {
        let bucket = config.bucket.clone();
        let client = Self::create_client(config).await;
        Self { client, bucket }
    }

    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::connect(S3Config::from_env()?).await)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "melodia",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url)
            .load()
            .await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.force_path_style)
                .build(),
        )
    }

    async fn collect_stream(stream: &mut ByteStream) -> BlobResult<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }

    /// HTTP status of a failed SDK call, when the service answered at all
    fn status_of<E>(err: &SdkError<E, HttpResponse>) -> Option<u16> {
        err.raw_response().map(|response| response.status().as_u16())
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        mut stream: ByteStream,
        mode: PutMode,
    ) -> BlobResult<StoredBlob> {
        let data = Self::collect_stream(&mut stream).await?;
        let size_bytes = data.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(AwsByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }
        if mode == PutMode::CreateOnly {
            request = request.if_none_match("*");
        }

        debug!(bucket = %self.bucket, key, size_bytes, ?mode, "put_object");
        let result = request.send().await.map_err(|err| match Self::status_of(&err) {
            Some(412) | Some(409) if mode == PutMode::CreateOnly => BlobError::already_exists(key),
            _ => Self::map_aws_error(err),
        })?;

        Ok(StoredBlob {
            key: key.to_string(),
            etag: result.e_tag,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<BlobReader> {
        debug!(bucket = %self.bucket, key, "get_object");
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err.as_service_error().is_some_and(|e| e.is_no_such_key())
                    || Self::status_of(&err) == Some(404);
                if missing {
                    BlobError::not_found(key)
                } else {
                    Self::map_aws_error(err)
                }
            })?;

        let head = ObjectHead {
            size_bytes: result.content_length.unwrap_or(0) as u64,
            content_type: result.content_type,
            etag: result.e_tag,
            modified_at: result.last_modified.as_ref().and_then(to_utc),
        };
        let body = result.body.collect().await.map_err(Self::map_aws_error)?;

        Ok(BlobReader {
            head,
            content: crate::byte_stream(body.into_bytes()),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        debug!(bucket = %self.bucket, key, "head_object");
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err.as_service_error().is_some_and(|e| e.is_not_found())
                    || Self::status_of(&err) == Some(404);
                if missing {
                    BlobError::not_found(key)
                } else {
                    Self::map_aws_error(err)
                }
            })?;

        Ok(ObjectHead {
            size_bytes: result.content_length.unwrap_or(0) as u64,
            content_type: result.content_type,
            etag: result.e_tag,
            modified_at: result.last_modified.as_ref().and_then(to_utc),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        debug!(bucket = %self.bucket, key, "delete_object");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn list(&self, prefix: Option<&str>, limit: Option<usize>) -> BlobResult<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let result = request.send().await.map_err(Self::map_aws_error)?;

            for object in result.contents.unwrap_or_default() {
                if let Some(key) = object.key {
                    blobs.push(BlobInfo {
                        key,
                        head: ObjectHead {
                            size_bytes: object.size.unwrap_or(0) as u64,
                            content_type: None,
                            etag: object.e_tag,
                            modified_at: object.last_modified.as_ref().and_then(to_utc),
                        },
                    });
                }
                if limit.is_some_and(|limit| blobs.len() >= limit) {
                    return Ok(blobs);
                }
            }

            match result.next_continuation_token {
                Some(token) if result.is_truncated.unwrap_or(false) => continuation = Some(token),
                _ => break,
            }
        }

        Ok(blobs)
    }

    fn supports_conditional_put(&self) -> bool {
        true
    }
}

fn to_utc(time: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

#[async_trait]
impl SignedUrlBlobStore for S3CompatibleStore {
    async fn sign_get(&self, key: &str, params: &SignParams) -> BlobResult<SignedUrl> {
        params.validate()?;
        let presigning = PresigningConfig::expires_in(params.ttl).map_err(Self::map_aws_error)?;
        let expires_at = params.expires_at();

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_type(&params.content_type)
            .response_content_disposition(params.disposition.as_str())
            .presigned(presigning)
            .await
            .map_err(Self::map_aws_error)?;

        Ok(SignedUrl {
            key: key.to_string(),
            url: request.uri().to_string(),
            expires_at,
        })
    }
}
