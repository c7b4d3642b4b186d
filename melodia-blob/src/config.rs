use std::env;
use std::time::Duration;

use crate::{BlobError, BlobResult};

/// Gateway policy: signing defaults, bulk width and remote-call limits
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Lifetime of signed URLs when the caller does not pick one
    pub default_ttl: Duration,

    /// Max concurrent workers in one bulk signing call
    pub signing_workers: usize,

    /// Upper bound for a single remote call; `None` waits forever
    pub operation_timeout: Option<Duration>,

    /// Ask the store for create-if-absent writes on non-forced puts.
    /// Only honoured when the store advertises conditional put support.
    pub conditional_writes: bool,

    /// Absolute max size allowed for a single blob (safety guard)
    pub max_blob_bytes: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            signing_workers: 32,
            operation_timeout: None,
            conditional_writes: false,
            max_blob_bytes: 100 * 1024 * 1024, // 100MB
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `MELODIA_*` environment variables
    pub fn from_env() -> BlobResult<Self> {
        let mut config = Self::default();

        if let Some(secs) = parse_env::<u64>("MELODIA_URL_TTL_SECS")? {
            config = config.with_default_ttl(Duration::from_secs(secs));
        }
        if let Some(workers) = parse_env::<usize>("MELODIA_SIGNING_WORKERS")? {
            config = config.with_signing_workers(workers);
        }
        if let Some(secs) = parse_env::<u64>("MELODIA_S3_TIMEOUT_SECS")? {
            config = config.with_operation_timeout(Duration::from_secs(secs));
        }
        if let Some(enabled) = parse_env::<bool>("MELODIA_S3_CONDITIONAL_WRITES")? {
            config.conditional_writes = enabled;
        }

        Ok(config)
    }

    /// Set default signed URL lifetime
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set bulk signing width (at least one worker)
    pub fn with_signing_workers(mut self, workers: usize) -> Self {
        self.signing_workers = workers.max(1);
        self
    }

    /// Bound every remote call
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Use create-if-absent writes where the store supports them
    pub fn with_conditional_writes(mut self) -> Self {
        self.conditional_writes = true;
        self
    }

    /// Set max blob size
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }
}

pub(crate) fn parse_env<T>(key: &str) -> BlobResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| BlobError::invalid(format!("{} has invalid value {:?}: {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BlobConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.signing_workers, 32);
        assert!(config.operation_timeout.is_none());
        assert!(!config.conditional_writes);
    }

    #[test]
    fn test_signing_workers_never_zero() {
        let config = BlobConfig::new().with_signing_workers(0);
        assert_eq!(config.signing_workers, 1);
    }

    #[test]
    fn test_from_env_overlays_defaults() {
        env::set_var("MELODIA_URL_TTL_SECS", "600");
        env::set_var("MELODIA_SIGNING_WORKERS", "0");
        env::set_var("MELODIA_S3_TIMEOUT_SECS", "5");
        env::set_var("MELODIA_S3_CONDITIONAL_WRITES", "true");

        let config = BlobConfig::from_env().unwrap();
        assert_eq!(config.default_ttl, Duration::from_secs(600));
        assert_eq!(config.signing_workers, 1);
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(5)));
        assert!(config.conditional_writes);
        assert_eq!(config.max_blob_bytes, BlobConfig::default().max_blob_bytes);

        env::set_var("MELODIA_SIGNING_WORKERS", "many");
        assert!(matches!(BlobConfig::from_env(), Err(BlobError::Invalid { .. })));

        for key in [
            "MELODIA_URL_TTL_SECS",
            "MELODIA_SIGNING_WORKERS",
            "MELODIA_S3_TIMEOUT_SECS",
            "MELODIA_S3_CONDITIONAL_WRITES",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        env::set_var("MELODIA_TEST_PARSE_GARBAGE", "soon");
        let parsed = parse_env::<u64>("MELODIA_TEST_PARSE_GARBAGE");
        assert!(matches!(parsed, Err(BlobError::Invalid { .. })));

        assert!(parse_env::<u64>("MELODIA_TEST_PARSE_UNSET").unwrap().is_none());
    }
}
