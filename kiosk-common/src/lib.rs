//! # Kiosk Common Library
//!
//! Shared code for the kiosk display and anything that talks to it:
//! - Wire protocol (commands in, completion events out)
//! - Resource naming contract for hosted media
//! - UI-facing event types and the EventBus
//! - Configuration file discovery
//! - Clock formatting for playback position

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod locator;
pub mod protocol;

pub use error::{Error, Result};
pub use protocol::{AssetId, Command, OutboundEvent};
