//! Control-channel wire protocol
//!
//! JSON text frames over a single persistent connection:
//! - Inbound: `{"type":"stop"}` and `{"type":"play","id":n}`
//! - Outbound: `{"type":"ended","id":n}`
//!
//! Inbound parsing is deliberately tolerant at the transport level: every
//! failure is reported as a [`ProtocolError`] so the caller can log and
//! discard the frame without touching the connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Largest id expressible by the three-digit resource naming scheme
pub const MAX_ASSET_ID: u16 = 999;

/// Catalog position of one image+audio pair (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u16")]
pub struct AssetId(u16);

impl AssetId {
    /// Create an id, rejecting 0 and anything beyond [`MAX_ASSET_ID`]
    pub fn new(raw: u64) -> Option<Self> {
        if raw == 0 || raw > u64::from(MAX_ASSET_ID) {
            None
        } else {
            Some(Self(raw as u16))
        }
    }

    /// Raw numeric value
    pub fn get(self) -> u16 {
        self.0
    }

    /// Zero-padded three-digit identifier (`7` → `"007"`)
    pub fn id3(self) -> String {
        format!("{:03}", self.0)
    }

    /// Iterate the full catalog `1..=size`
    ///
    /// Sizes beyond [`MAX_ASSET_ID`] are truncated to it.
    pub fn catalog(size: u16) -> impl Iterator<Item = AssetId> {
        (1..=size.min(MAX_ASSET_ID)).map(AssetId)
    }
}

impl TryFrom<u64> for AssetId {
    type Error = String;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        AssetId::new(raw).ok_or_else(|| format!("asset id {} outside 1..={}", raw, MAX_ASSET_ID))
    }
}

impl From<AssetId> for u16 {
    fn from(id: AssetId) -> u16 {
        id.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inbound command from the remote controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    /// Stop whatever is playing
    Stop,
    /// Show and play the pair for `id`, preempting any active playback
    Play { id: AssetId },
}

/// Outbound event reported to the remote controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// Playback of `id` reached its natural end
    Ended { id: AssetId },
}

impl OutboundEvent {
    /// Serialize to a text frame
    pub fn to_json(&self) -> String {
        // Derived serialization of a unit-tagged enum with an integer field cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Reasons an inbound frame was discarded
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame is not valid JSON
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// `type` missing or not one of the known commands
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// `play` without a usable id
    #[error("invalid play message: {0}")]
    InvalidPlay(String),
}

impl Command {
    /// Parse one inbound text frame
    ///
    /// # Examples
    ///
    /// ```
    /// use kiosk_common::protocol::{AssetId, Command};
    ///
    /// let cmd = Command::parse(r#"{"type":"play","id":7}"#).unwrap();
    /// assert_eq!(cmd, Command::Play { id: AssetId::new(7).unwrap() });
    /// assert!(Command::parse("{not json").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Command, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;

        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(other) => return Err(ProtocolError::UnknownType(other.to_string())),
            None => return Err(ProtocolError::UnknownType("<missing>".to_string())),
        };

        match kind {
            "stop" => Ok(Command::Stop),
            "play" => {
                let raw = value.get("id").ok_or_else(|| {
                    ProtocolError::InvalidPlay("missing id".to_string())
                })?;
                let id = raw
                    .as_u64()
                    .and_then(AssetId::new)
                    .ok_or_else(|| ProtocolError::InvalidPlay(format!("bad id {}", raw)))?;
                Ok(Command::Play { id })
            }
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}
