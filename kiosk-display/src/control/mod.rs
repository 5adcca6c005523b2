//! Remote controller connection

pub mod channel;

pub use channel::{ChannelHandle, ControlChannel};
