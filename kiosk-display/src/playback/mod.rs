//! Playback: the controller state machine and the audio output it drives

pub mod controller;
pub mod output;

pub use controller::{ControllerEvent, ControllerHandle, EventSink, PlaybackController};
pub use output::{AudioOutput, ClockOutput, Playout, PlayoutSink};
