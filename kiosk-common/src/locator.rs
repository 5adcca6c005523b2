//! Resource naming contract
//!
//! Asset `n` is hosted as `<base>/<id3>.jpg` and `<base>/<id3>.mp3`, where
//! `id3` is the zero-padded three-digit form of `n`. Whatever hosts the media
//! must follow this layout.

use crate::protocol::AssetId;

/// Image file extension
pub const IMAGE_EXTENSION: &str = "jpg";

/// Audio file extension
pub const AUDIO_EXTENSION: &str = "mp3";

/// Derives image and audio locations from an asset id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocator {
    base: String,
}

impl MediaLocator {
    /// Create a locator rooted at `base` (trailing slashes are ignored)
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        let base = base.trim_end_matches('/').to_string();
        Self { base }
    }

    /// Base location without trailing slash
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Location of the image for `id`
    pub fn image(&self, id: AssetId) -> String {
        format!("{}/{}.{}", self.base, id.id3(), IMAGE_EXTENSION)
    }

    /// Location of the audio for `id`
    pub fn audio(&self, id: AssetId) -> String {
        format!("{}/{}.{}", self.base, id.id3(), AUDIO_EXTENSION)
    }
}
