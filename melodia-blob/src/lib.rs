//! # melodia-blob: object storage gateway
//!
//! `melodia-blob` owns every interaction with the Melodia media bucket:
//! streaming get/put/update/delete of raw blobs by key, and time-limited
//! signed GET URLs in two flavours.
//!
//! - **Safe** signing checks that the key exists first (one extra round-trip)
//!   and fails with [`BlobError::NotFound`] otherwise.
//! - **Fast** signing never contacts the store; the URL is always
//!   syntactically valid but may point at nothing.
//!
//! Bulk signing for result pages always uses the fast policy and fans out over
//! a bounded [`SigningPool`] built for that single call. Output order always
//! matches input order.
//!
//! ## Quick Start
//!
//! ```rust
//! use melodia_blob::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let gateway = BlobGateway::new(MemoryBlobStore::new("melodia"), BlobConfig::default());
//!
//! gateway.put("music_audio_7.mp4", byte_stream(b"ID3".to_vec()), false).await?;
//!
//! let params = gateway.params("audio/mp3", ContentDisposition::Inline);
//! let url = gateway.sign_url("music_audio_7.mp4", &params, SignPolicy::Safe).await?;
//! assert!(url.as_str().contains("music_audio_7.mp4"));
//!
//! let missing = gateway.try_sign_url("music_audio_8.mp4", &params).await?;
//! assert!(missing.is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   Media resolvers    │  ← domain ids → keys
//! ├──────────────────────┤
//! │     BlobGateway      │  ← existence rules, signing policies, bulk pool
//! ├──────────────────────┤
//! │ SignedUrlBlobStore   │  ← storage primitives (S3, memory)
//! └──────────────────────┘
//! ```

mod config;
mod error;
pub mod gateway;
mod memory_store;
mod pool;
mod s3_store;
pub mod store;
mod types;

// Re-export main types for clean API
pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use gateway::BlobGateway;
pub use memory_store::{MemoryBlobStore, MemoryStats, SignDelay};
pub use pool::SigningPool;
pub use s3_store::{S3CompatibleStore, S3Config};
pub use store::{BlobInfo, BlobReader, BlobStore, ObjectHead, SignedUrlBlobStore, StoredBlob};
pub use types::{
    byte_stream, ByteStream, ContentDisposition, PutMode, SignParams, SignPolicy, SignedUrl, MAX_SIGNED_URL_TTL,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        byte_stream, BlobConfig, BlobError, BlobGateway, BlobResult, BlobStore, ByteStream, ContentDisposition,
        MemoryBlobStore, SignParams, SignPolicy, SignedUrl, SignedUrlBlobStore,
    };
}
