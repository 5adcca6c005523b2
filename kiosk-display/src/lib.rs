//! kiosk-display library
//!
//! Remote-controlled kiosk display client: preloads the image+audio catalog,
//! plays pairs on command from a remote controller, and reports when playback
//! finishes.

pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod media;
pub mod playback;
pub mod preload;
pub mod session;
pub mod state;

pub use error::{Error, Result};
pub use session::Session;
