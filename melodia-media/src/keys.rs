//! Object key naming. These names address objects that already live in the
//! bucket, so they must stay byte-for-byte stable.

/// Catalog id of a track
pub type TrackId = u64;

/// Catalog id of a user
pub type UserId = u64;

pub const AUDIO_CONTENT_TYPE: &str = "audio/mp3";
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// What a blob holds, which decides its key and served content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Track audio, `music_audio_<id>.mp4`
    Audio,
    /// Track cover, `music_image_<id>.jpg`
    Cover,
    /// User avatar, `user_avatar_<id>.jpg`
    Avatar,
}

impl MediaKind {
    /// Object key for entity `id`
    pub fn key(self, id: u64) -> String {
        match self {
            Self::Audio => format!("music_audio_{}.mp4", id),
            Self::Cover => format!("music_image_{}.jpg", id),
            Self::Avatar => format!("user_avatar_{}.jpg", id),
        }
    }

    /// Content type served through signed URLs
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Audio => AUDIO_CONTENT_TYPE,
            Self::Cover | Self::Avatar => IMAGE_CONTENT_TYPE,
        }
    }

    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::Audio => "music_audio_",
            Self::Cover => "music_image_",
            Self::Avatar => "user_avatar_",
        }
    }

    /// Recover the entity id from a key of this kind. Only canonical keys
    /// count: `music_audio_007.mp4` is not the key of track 7.
    pub fn parse_id(self, key: &str) -> Option<u64> {
        let extension = match self {
            Self::Audio => ".mp4",
            Self::Cover | Self::Avatar => ".jpg",
        };
        let id: u64 = key.strip_prefix(self.key_prefix())?.strip_suffix(extension)?.parse().ok()?;
        (self.key(id) == key).then_some(id)
    }
}

pub fn audio_key(track_id: TrackId) -> String {
    MediaKind::Audio.key(track_id)
}

pub fn cover_key(track_id: TrackId) -> String {
    MediaKind::Cover.key(track_id)
}

pub fn avatar_key(user_id: UserId) -> String {
    MediaKind::Avatar.key(user_id)
}
