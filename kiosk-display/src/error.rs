//! Error types for kiosk-display
//!
//! One enum for every failure the display client can report.

use thiserror::Error;

/// Main error type for kiosk-display
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A media resource could not be fetched
    #[error("Fetch failed for {location}: {reason}")]
    Fetch {
        /// Resource location that failed
        location: String,
        /// Transport or status description
        reason: String,
    },

    /// Image bytes could not be decoded
    #[error("Image error for {location}: {reason}")]
    Image {
        /// Resource location of the image
        location: String,
        /// Decoder description
        reason: String,
    },

    /// Audio bytes could not be used
    #[error("Audio error: {0}")]
    Audio(String),

    /// Play attempted before the playback permission gate was opened
    #[error("Playback locked: unlock gesture not yet performed")]
    Locked,

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Shared config/protocol errors
    #[error(transparent)]
    Common(#[from] kiosk_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using kiosk-display Error
pub type Result<T> = std::result::Result<T, Error>;
