//! Playback controller
//!
//! Single consumer of the controller event queue. Every input (remote
//! commands, local gestures, fallback fetch results, playout progress and
//! end) arrives as a [`ControllerEvent`] and is handled to completion before
//! the next one is taken, so state transitions never interleave.
//!
//! **State machine:**
//! - `Idle` → `Playing` on Play with a cache hit
//! - `Idle` → `Loading` on Play with a cache miss; `Loading` → `Playing` when
//!   the direct fetch resolves, → `Idle` when it fails
//! - any → `Idle` on Stop, natural end, or playout failure
//! - `Loading`/`Playing` of X → Play of Y stops and rewinds X first
//!
//! Each playback attempt gets a fresh generation number. Fetch results and
//! playout events carry the generation they were started for; anything
//! older than the active attempt is dropped, which is what keeps a
//! superseded playback from ever reporting completion.

use crate::error::{Error, Result};
use crate::media::{AudioHandle, ImageHandle, MediaCache, MediaFetcher};
use crate::playback::output::{AudioOutput, Playout, PlayoutSink};
use crate::state::{PlaybackSnapshot, SharedState};
use kiosk_common::events::PlaybackPhase;
use kiosk_common::human_time::ProgressView;
use kiosk_common::locator::MediaLocator;
use kiosk_common::{AssetId, Command, OutboundEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Controller queue depth
pub const QUEUE_CAPACITY: usize = 64;

/// Receiver of completion events (the control channel in production)
pub trait EventSink: Send + Sync {
    fn send(&self, event: OutboundEvent);
}

/// Image and audio resolved by a direct fetch
pub type ResolvedPair = Result<(ImageHandle, AudioHandle)>;

/// Everything the controller reacts to
#[derive(Debug)]
pub enum ControllerEvent {
    /// Remote command from the control channel
    Command(Command),
    /// Operator gesture opening the playback permission gate
    Unlock { reply: oneshot::Sender<bool> },
    /// Operator pause/resume
    TogglePause,
    /// Direct fetch for a cache miss finished
    Resolved {
        generation: u64,
        id: AssetId,
        result: ResolvedPair,
    },
    /// Playout cursor moved
    Progress {
        generation: u64,
        position: Duration,
        duration: Option<Duration>,
    },
    /// Playout reached its natural end
    Ended { generation: u64, id: AssetId },
    /// Playout could not continue (audio buffering failed)
    PlayoutFailed { generation: u64, reason: String },
    /// Stop playback and exit the event loop
    Shutdown,
}

/// Cloneable sender side of the controller queue
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControllerEvent>,
}

impl ControllerHandle {
    pub async fn send(&self, event: ControllerEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| Error::Internal("playback controller stopped".to_string()))
    }

    pub async fn command(&self, command: Command) -> Result<()> {
        self.send(ControllerEvent::Command(command)).await
    }

    /// Perform the unlock gesture, returning whether the gate is now open
    pub async fn unlock(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(ControllerEvent::Unlock { reply }).await?;
        rx.await
            .map_err(|_| Error::Internal("playback controller dropped unlock reply".to_string()))
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        self.send(ControllerEvent::TogglePause).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(ControllerEvent::Shutdown).await
    }
}

/// The attempt currently owning the display
struct Active {
    id: AssetId,
    generation: u64,
    /// None while a direct fetch is in flight
    playout: Option<Playout>,
}

pub struct PlaybackController {
    state: Arc<SharedState>,
    cache: MediaCache,
    fetcher: Arc<dyn MediaFetcher>,
    locator: MediaLocator,
    output: Arc<dyn AudioOutput>,
    sink: Arc<dyn EventSink>,
    audio_timeout: Duration,
    tx: mpsc::Sender<ControllerEvent>,
    rx: mpsc::Receiver<ControllerEvent>,
    generation: u64,
    active: Option<Active>,
}

impl PlaybackController {
    pub fn new(
        state: Arc<SharedState>,
        cache: MediaCache,
        fetcher: Arc<dyn MediaFetcher>,
        locator: MediaLocator,
        output: Arc<dyn AudioOutput>,
        sink: Arc<dyn EventSink>,
        audio_timeout: Duration,
    ) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = ControllerHandle { tx: tx.clone() };
        let controller = Self {
            state,
            cache,
            fetcher,
            locator,
            output,
            sink,
            audio_timeout,
            tx,
            rx,
            generation: 0,
            active: None,
        };
        (controller, handle)
    }

    /// Consume the queue until `Shutdown`
    pub async fn run(mut self) {
        info!("Playback controller started");
        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }
        info!("Playback controller stopped");
    }

    /// Handle one event; returns false on shutdown
    pub async fn handle_event(&mut self, event: ControllerEvent) -> bool {
        match event {
            ControllerEvent::Command(Command::Play { id }) => self.handle_play(id).await,
            ControllerEvent::Command(Command::Stop) => self.handle_stop().await,
            ControllerEvent::Unlock { reply } => {
                let unlocked = self.handle_unlock().await;
                // Caller may have given up waiting
                let _ = reply.send(unlocked);
            }
            ControllerEvent::TogglePause => self.handle_toggle_pause().await,
            ControllerEvent::Resolved {
                generation,
                id,
                result,
            } => self.handle_resolved(generation, id, result).await,
            ControllerEvent::Progress {
                generation,
                position,
                duration,
            } => self.handle_progress(generation, position, duration).await,
            ControllerEvent::Ended { generation, id } => self.handle_ended(generation, id).await,
            ControllerEvent::PlayoutFailed { generation, reason } => {
                if self.is_current(generation) {
                    error!("Playback failed: {}", reason);
                    self.go_idle().await;
                }
            }
            ControllerEvent::Shutdown => {
                self.go_idle().await;
                return false;
            }
        }
        true
    }

    async fn handle_unlock(&mut self) -> bool {
        if self.state.is_unlocked() {
            debug!("Playback already unlocked");
            return true;
        }
        match self.output.unlock().await {
            Ok(()) => {
                info!("Playback unlocked");
                self.state.set_unlocked(true);
                true
            }
            Err(e) => {
                error!("Unlock failed: {}", e);
                self.state.set_unlocked(false);
                false
            }
        }
    }

    async fn handle_play(&mut self, id: AssetId) {
        if !self.state.is_unlocked() {
            warn!("Play {} rejected: {}", id.id3(), Error::Locked);
            return;
        }
        info!("Play {}", id.id3());

        // Silence the previous attempt before anything of the new one runs
        self.halt();
        self.generation += 1;
        let generation = self.generation;

        match self.cache.get(id) {
            Some(entry) => {
                if !entry.ready {
                    debug!("{} cached with audio still buffering", id.id3());
                }
                self.begin(id, generation, entry.image, entry.audio).await;
            }
            None => {
                info!("{} not cached, fetching directly", id.id3());
                self.active = Some(Active {
                    id,
                    generation,
                    playout: None,
                });
                self.state.set_current_image(None).await;
                self.state
                    .set_playback(PlaybackSnapshot {
                        phase: PlaybackPhase::Loading,
                        current_id: Some(id),
                        paused: false,
                    })
                    .await;
                self.spawn_direct_fetch(id, generation);
            }
        }
    }

    /// Fetch a pair outside the cache and report back as `Resolved`
    ///
    /// Audio still buffering after the timeout is used anyway, as in preload.
    fn spawn_direct_fetch(&self, id: AssetId, generation: u64) {
        let fetcher = Arc::clone(&self.fetcher);
        let image_location = self.locator.image(id);
        let audio_location = self.locator.audio(id);
        let audio_timeout = self.audio_timeout;
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let audio = fetcher.open_audio(&audio_location);
            let (image, buffered) = tokio::join!(
                fetcher.fetch_image(&image_location),
                tokio::time::timeout(audio_timeout, audio.ready()),
            );

            let result = match (image, buffered) {
                (Err(e), _) | (Ok(_), Ok(Err(e))) => Err(e),
                (Ok(image), Ok(Ok(()))) => Ok((image, audio)),
                (Ok(image), Err(_)) => {
                    debug!("Starting {} before audio finished buffering", id.id3());
                    Ok((image, audio))
                }
            };

            if tx
                .send(ControllerEvent::Resolved {
                    generation,
                    id,
                    result,
                })
                .await
                .is_err()
            {
                debug!("Controller gone before direct fetch of {} resolved", id.id3());
            }
        });
    }

    async fn handle_resolved(&mut self, generation: u64, id: AssetId, result: ResolvedPair) {
        if !self.is_current(generation) {
            debug!("Dropping superseded fetch result for {}", id.id3());
            return;
        }
        match result {
            Ok((image, audio)) => self.begin(id, generation, image, audio).await,
            Err(e) => {
                warn!("Direct fetch for {} failed: {}", id.id3(), e);
                self.go_idle().await;
            }
        }
    }

    async fn begin(
        &mut self,
        id: AssetId,
        generation: u64,
        image: ImageHandle,
        audio: AudioHandle,
    ) {
        audio.reset();
        self.state.set_current_image(Some(image)).await;

        let sink = PlayoutSink::new(id, generation, self.tx.clone());
        let playout = self.output.start(audio, sink);
        self.active = Some(Active {
            id,
            generation,
            playout: Some(playout),
        });

        self.state
            .set_playback(PlaybackSnapshot {
                phase: PlaybackPhase::Playing,
                current_id: Some(id),
                paused: false,
            })
            .await;
        self.state.set_progress(Some(id), ProgressView::idle()).await;
        info!("Playing {}", id.id3());
    }

    async fn handle_stop(&mut self) {
        match &self.active {
            Some(active) => info!("Stop {}", active.id.id3()),
            None => debug!("Stop while idle"),
        }
        self.go_idle().await;
    }

    async fn handle_toggle_pause(&mut self) {
        let Some(active) = &self.active else {
            debug!("Nothing to pause");
            return;
        };
        let Some(playout) = &active.playout else {
            debug!("{} still loading, pause ignored", active.id.id3());
            return;
        };

        let paused = !playout.is_paused();
        if paused {
            playout.pause();
        } else {
            playout.resume();
        }
        info!("{} {}", if paused { "Paused" } else { "Resumed" }, active.id.id3());
        self.state.set_paused(paused).await;
    }

    async fn handle_progress(
        &mut self,
        generation: u64,
        position: Duration,
        duration: Option<Duration>,
    ) {
        let Some(active) = self.active.as_ref().filter(|a| a.generation == generation) else {
            return;
        };
        // Unknown duration keeps the previous display
        if let Some(view) = ProgressView::from_position(position, duration) {
            self.state.set_progress(Some(active.id), view).await;
        }
    }

    async fn handle_ended(&mut self, generation: u64, id: AssetId) {
        let matches = self
            .active
            .as_ref()
            .is_some_and(|a| a.generation == generation && a.id == id);
        if !matches {
            debug!("Suppressing end of superseded playback {}", id.id3());
            return;
        }

        info!("Playback of {} ended", id.id3());
        self.sink.send(OutboundEvent::Ended { id });
        self.go_idle().await;
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.generation == generation)
    }

    /// Stop and rewind the active playout, synchronously
    fn halt(&mut self) {
        if let Some(playout) = self.active.take().and_then(|a| a.playout) {
            playout.stop();
        }
    }

    async fn go_idle(&mut self) {
        self.halt();
        self.state.set_current_image(None).await;
        self.state.set_playback(PlaybackSnapshot::default()).await;
        self.state.set_progress(None, ProgressView::idle()).await;
    }
}
