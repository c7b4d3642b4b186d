//! # melodia-media
//!
//! Maps Melodia catalog ids onto media blobs and hands out signed URLs for
//! them. Single lookups go through safe signing and report a missing blob as
//! `None`; page-sized batches go through fast bulk signing and return exactly
//! one entry per id, in input order.
//!
//! ```rust
//! use melodia_media::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let gateway = BlobGateway::new(MemoryBlobStore::new("melodia"), BlobConfig::default());
//! let resolver = MediaResolver::new(Arc::new(gateway));
//!
//! resolver
//!     .store_track_media(7, byte_stream("ID3"), byte_stream("JFIF"), false)
//!     .await?;
//!
//! let pair = resolver.url_pair(7).await?.expect("both blobs stored");
//! assert!(pair.audio.as_str().contains("music_audio_7.mp4"));
//! assert!(resolver.url_pair(8).await?.is_none());
//! # Ok(())
//! # }
//! ```

pub mod avatar;
pub mod keys;
mod resolver;

pub use avatar::{validate_jpeg, JpegInfo};
pub use keys::{audio_key, avatar_key, cover_key, MediaKind, TrackId, UserId, AUDIO_CONTENT_TYPE, IMAGE_CONTENT_TYPE};
pub use resolver::{MediaResolver, UrlPair};

pub use melodia_blob::{BlobError, BlobResult};

pub mod prelude {
    pub use crate::{MediaKind, MediaResolver, TrackId, UrlPair, UserId};
    pub use melodia_blob::prelude::*;
}
