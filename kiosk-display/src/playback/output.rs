//! Audio output
//!
//! An [`AudioOutput`] turns a buffered [`AudioHandle`] into a running
//! [`Playout`]. The playout reports back to the controller through a
//! [`PlayoutSink`], tagged with the generation it was started for, so the
//! controller can drop anything a superseded playout still had in flight.
//!
//! [`ClockOutput`] is the headless output: it advances the handle's cursor in
//! real time and reports progress and the natural end. It renders no sound.

use crate::error::Result;
use crate::media::{AudioHandle, BufferStatus};
use crate::playback::controller::ControllerEvent;
use async_trait::async_trait;
use kiosk_common::AssetId;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Default playout tick
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Where a playout reports progress, end and failure
#[derive(Debug, Clone)]
pub struct PlayoutSink {
    id: AssetId,
    generation: u64,
    events: mpsc::Sender<ControllerEvent>,
}

impl PlayoutSink {
    pub fn new(id: AssetId, generation: u64, events: mpsc::Sender<ControllerEvent>) -> Self {
        Self {
            id,
            generation,
            events,
        }
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    /// Returns false once the controller is gone
    pub async fn progress(&self, position: Duration, duration: Option<Duration>) -> bool {
        self.events
            .send(ControllerEvent::Progress {
                generation: self.generation,
                position,
                duration,
            })
            .await
            .is_ok()
    }

    pub async fn ended(&self) -> bool {
        self.events
            .send(ControllerEvent::Ended {
                generation: self.generation,
                id: self.id,
            })
            .await
            .is_ok()
    }

    pub async fn failed(&self, reason: String) -> bool {
        self.events
            .send(ControllerEvent::PlayoutFailed {
                generation: self.generation,
                reason,
            })
            .await
            .is_ok()
    }
}

/// Sound output device
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Open the playback permission gate
    ///
    /// Called once per operator gesture. Failure leaves playback locked.
    async fn unlock(&self) -> Result<()>;

    /// Start playing `audio` from its current cursor
    ///
    /// Must be called from within a Tokio runtime.
    fn start(&self, audio: AudioHandle, sink: PlayoutSink) -> Playout;
}

/// A running playout
///
/// Dropping a `Playout` stops it.
#[derive(Debug)]
pub struct Playout {
    audio: AudioHandle,
    paused: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Playout {
    /// Wrap a spawned playout task
    ///
    /// The task should observe `paused` (from [`Playout::pause_signal`]) and
    /// stop advancing while it reads `true`.
    pub fn new(audio: AudioHandle, paused: watch::Sender<bool>, task: JoinHandle<()>) -> Self {
        Self {
            audio,
            paused,
            task,
        }
    }

    /// Pause flag channel for a playout task about to be spawned
    pub fn pause_signal() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Halt and rewind
    ///
    /// The task is aborted, which takes effect at its next await point. On a
    /// current-thread runtime that is before it can run again, so the cursor
    /// stays rewound. Events it queued before being aborted carry a stale
    /// generation and are dropped by the controller.
    pub fn stop(self) {
        // Drop does the work
    }
}

impl Drop for Playout {
    fn drop(&mut self) {
        self.task.abort();
        self.audio.reset();
    }
}

/// Headless real-time output
#[derive(Debug, Clone)]
pub struct ClockOutput {
    tick: Duration,
}

impl ClockOutput {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
        }
    }
}

impl Default for ClockOutput {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

#[async_trait]
impl AudioOutput for ClockOutput {
    async fn unlock(&self) -> Result<()> {
        debug!("Clock output unlocked");
        Ok(())
    }

    fn start(&self, audio: AudioHandle, sink: PlayoutSink) -> Playout {
        let (paused_tx, paused_rx) = Playout::pause_signal();
        let task = tokio::spawn(run_clock(audio.clone(), sink, self.tick, paused_rx));
        Playout::new(audio, paused_tx, task)
    }
}

async fn run_clock(
    audio: AudioHandle,
    sink: PlayoutSink,
    tick: Duration,
    mut paused: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    interval.tick().await;

    loop {
        if *paused.borrow_and_update() {
            if paused.changed().await.is_err() {
                return;
            }
            interval.reset();
            continue;
        }

        tokio::select! {
            _ = interval.tick() => {}
            changed = paused.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
        }

        let duration = match audio.status() {
            BufferStatus::Failed(reason) => {
                sink.failed(reason).await;
                return;
            }
            // Cursor waits for data; duration still unknown
            BufferStatus::Buffering => {
                if !sink.progress(audio.position(), None).await {
                    return;
                }
                continue;
            }
            BufferStatus::Complete => audio.duration(),
        };

        let Some(duration) = duration else {
            continue;
        };
        let position = (audio.position() + tick).min(duration);
        audio.set_position(position);

        if !sink.progress(position, Some(duration)).await {
            return;
        }
        if position >= duration {
            debug!("Playout of {} reached end", sink.id().id3());
            sink.ended().await;
            return;
        }
    }
}
