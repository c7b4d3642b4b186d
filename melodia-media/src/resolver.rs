use bytes::Bytes;
use melodia_blob::{
    byte_stream, BlobError, BlobGateway, BlobResult, ByteStream, ContentDisposition, SignParams, SignedUrl,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::avatar::{validate_jpeg, JpegInfo};
use crate::keys::{MediaKind, TrackId, UserId, AUDIO_CONTENT_TYPE, IMAGE_CONTENT_TYPE};

/// Signed audio and cover URLs of one track, always in that order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPair {
    pub audio: SignedUrl,
    pub image: SignedUrl,
}

impl UrlPair {
    /// Build from a signed `[audio, image]` group
    pub fn from_group(group: Vec<SignedUrl>) -> BlobResult<Self> {
        let [audio, image]: [SignedUrl; 2] = group.try_into().map_err(|group: Vec<SignedUrl>| {
            BlobError::invalid(format!("expected an audio/image pair, got {} urls", group.len()))
        })?;
        Ok(Self { audio, image })
    }

    pub fn urls(&self) -> (&str, &str) {
        (self.audio.as_str(), self.image.as_str())
    }

    pub fn into_tuple(self) -> (SignedUrl, SignedUrl) {
        (self.audio, self.image)
    }
}

/// Turns catalog ids into signed media URLs.
///
/// Single lookups are safe: they confirm the blob exists and report absence
/// as `None`. Batch lookups are fast: they trust that every id passed in was
/// fully ingested and never touch the store.
#[derive(Clone)]
pub struct MediaResolver {
    gateway: Arc<BlobGateway>,
    disposition: ContentDisposition,
}

impl MediaResolver {
    pub fn new(gateway: Arc<BlobGateway>) -> Self {
        Self {
            gateway,
            disposition: ContentDisposition::Inline,
        }
    }

    /// Serve media as downloads instead of inline
    pub fn with_disposition(mut self, disposition: ContentDisposition) -> Self {
        self.disposition = disposition;
        self
    }

    pub fn gateway(&self) -> &BlobGateway {
        &self.gateway
    }

    fn params(&self, kind: MediaKind) -> SignParams {
        self.gateway.params(kind.content_type(), self.disposition)
    }

    async fn resolve(&self, kind: MediaKind, id: u64) -> BlobResult<Option<SignedUrl>> {
        let key = kind.key(id);
        let url = self.gateway.try_sign_url(&key, &self.params(kind)).await?;
        if url.is_none() {
            debug!(key = %key, "media blob absent");
        }
        Ok(url)
    }

    /// Signed audio URL, or `None` while the track has no audio blob
    #[instrument(skip(self))]
    pub async fn audio_url(&self, track_id: TrackId) -> BlobResult<Option<SignedUrl>> {
        self.resolve(MediaKind::Audio, track_id).await
    }

    /// Signed cover URL, or `None` while the track has no cover blob
    #[instrument(skip(self))]
    pub async fn image_url(&self, track_id: TrackId) -> BlobResult<Option<SignedUrl>> {
        self.resolve(MediaKind::Cover, track_id).await
    }

    /// Signed avatar URL, or `None` if the user never uploaded one
    #[instrument(skip(self))]
    pub async fn avatar_url(&self, user_id: UserId) -> BlobResult<Option<SignedUrl>> {
        self.resolve(MediaKind::Avatar, user_id).await
    }

    /// Both URLs of a track, or `None` if either blob is missing
    #[instrument(skip(self))]
    pub async fn url_pair(&self, track_id: TrackId) -> BlobResult<Option<UrlPair>> {
        let (audio, image) = futures::future::try_join(self.audio_url(track_id), self.image_url(track_id)).await?;

        Ok(match (audio, image) {
            (Some(audio), Some(image)) => Some(UrlPair { audio, image }),
            _ => None,
        })
    }

    /// URL pairs for a page of tracks, one entry per id in input order.
    ///
    /// Existence is not checked: callers must only pass ids whose audio and
    /// cover were both stored. A missing blob still yields a URL that fails
    /// when the client follows it.
    #[instrument(skip_all, fields(tracks = track_ids.len()))]
    pub async fn url_pairs(&self, track_ids: &[TrackId]) -> Vec<BlobResult<UrlPair>> {
        let groups: Vec<Vec<String>> = track_ids
            .iter()
            .map(|&id| vec![MediaKind::Audio.key(id), MediaKind::Cover.key(id)])
            .collect();

        self.gateway
            .sign_url_groups_bulk(
                groups,
                &[AUDIO_CONTENT_TYPE, IMAGE_CONTENT_TYPE],
                self.disposition,
                self.gateway.config().default_ttl,
            )
            .await
            .into_iter()
            .map(|group| group.and_then(UrlPair::from_group))
            .collect()
    }

    /// Store both blobs of a freshly ingested track, cover first.
    ///
    /// Without `force`, an existing blob fails with `AlreadyExists`. If the
    /// audio upload fails after the cover went through, the cover stays.
    #[instrument(skip(self, audio, cover))]
    pub async fn store_track_media(
        &self,
        track_id: TrackId,
        audio: ByteStream,
        cover: ByteStream,
        force: bool,
    ) -> BlobResult<()> {
        self.gateway
            .put_as(&MediaKind::Cover.key(track_id), Some(IMAGE_CONTENT_TYPE), cover, force)
            .await?;
        self.gateway
            .put_as(&MediaKind::Audio.key(track_id), Some(AUDIO_CONTENT_TYPE), audio, force)
            .await?;

        info!(track_id, "track media stored");
        Ok(())
    }

    /// Delete whatever media a track has; returns how many blobs went away
    #[instrument(skip(self))]
    pub async fn remove_track_media(&self, track_id: TrackId) -> BlobResult<usize> {
        let mut removed = 0;
        for kind in [MediaKind::Audio, MediaKind::Cover] {
            match self.gateway.delete(&kind.key(track_id)).await {
                Ok(()) => removed += 1,
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    }

    /// Validate and store a user's avatar, replacing any previous one
    #[instrument(skip(self, image), fields(size_bytes = image.len()))]
    pub async fn store_avatar(&self, user_id: UserId, image: Bytes) -> BlobResult<JpegInfo> {
        let info = validate_jpeg(&image)?;
        self.gateway
            .put_as(&MediaKind::Avatar.key(user_id), Some(IMAGE_CONTENT_TYPE), byte_stream(image), true)
            .await?;

        info!(user_id, width = info.width, height = info.height, "avatar stored");
        Ok(info)
    }

    /// Ids of tracks whose audio and cover are both in the bucket, ascending
    pub async fn stored_track_ids(&self) -> BlobResult<Vec<TrackId>> {
        let audio = self.ids_under(MediaKind::Audio).await?;
        let covers = self.ids_under(MediaKind::Cover).await?;
        Ok(audio.intersection(&covers).copied().collect())
    }

    async fn ids_under(&self, kind: MediaKind) -> BlobResult<BTreeSet<u64>> {
        let blobs = self.gateway.list(Some(kind.key_prefix())).await?;
        Ok(blobs.iter().filter_map(|blob| kind.parse_id(&blob.key)).collect())
    }
}
