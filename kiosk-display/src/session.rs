//! Display session
//!
//! Owns every long-lived component of one display run: shared state, media
//! cache, scheduler, preloader, playback controller and control channel.
//! Construction wires them together and spawns the controller and channel
//! tasks; [`Session::shutdown`] tears everything down again.

use crate::config::DisplayConfig;
use crate::control::{ChannelHandle, ControlChannel};
use crate::diagnostics::DiagnosticsLog;
use crate::error::{Error, Result};
use crate::media::{MediaCache, MediaFetcher};
use crate::playback::{AudioOutput, ControllerHandle, PlaybackController};
use crate::preload::{BoundedScheduler, PreloadSummary, Preloader};
use crate::state::SharedState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

pub struct Session {
    config: DisplayConfig,
    state: Arc<SharedState>,
    cache: MediaCache,
    scheduler: BoundedScheduler,
    preloader: Preloader,
    controller: ControllerHandle,
    channel: ChannelHandle,
    workers: Mutex<JoinSet<()>>,
    preload_task: Mutex<Option<JoinHandle<PreloadSummary>>>,
    preload_started: AtomicBool,
}

impl Session {
    /// Build all components and start the controller and channel tasks
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: DisplayConfig,
        fetcher: Arc<dyn MediaFetcher>,
        output: Arc<dyn AudioOutput>,
        diagnostics: DiagnosticsLog,
    ) -> Result<Self> {
        config.validate()?;

        let state = Arc::new(SharedState::new(diagnostics));
        let cache = MediaCache::new();
        let scheduler = BoundedScheduler::new(config.max_concurrent_fetches);
        let locator = config.locator();

        let preloader = Preloader::new(
            Arc::clone(&fetcher),
            locator.clone(),
            cache.clone(),
            scheduler.clone(),
            config.audio_timeout(),
            Arc::clone(&state),
        );

        let (channel, channel_handle) = ControlChannel::new(
            &config.controller_url,
            config.reconnect_interval(),
            Arc::clone(&state),
        );

        let (controller, controller_handle) = PlaybackController::new(
            Arc::clone(&state),
            cache.clone(),
            fetcher,
            locator,
            output,
            Arc::new(channel_handle.clone()),
            config.audio_timeout(),
        );

        let mut workers = JoinSet::new();
        workers.spawn(controller.run());
        workers.spawn(channel.run(controller_handle.clone()));

        info!(
            "Session started: controller {}, media {}, catalog {}",
            config.controller_url, config.media_base_url, config.catalog_size
        );

        Ok(Self {
            config,
            state,
            cache,
            scheduler,
            preloader,
            controller: controller_handle,
            channel: channel_handle,
            workers: Mutex::new(workers),
            preload_task: Mutex::new(None),
            preload_started: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &BoundedScheduler {
        &self.scheduler
    }

    pub fn controller(&self) -> &ControllerHandle {
        &self.controller
    }

    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Perform the unlock gesture
    ///
    /// The first successful unlock starts the catalog preload. Returns whether
    /// playback is unlocked.
    pub async fn unlock(&self) -> Result<bool> {
        let unlocked = self.controller.unlock().await?;
        if unlocked && !self.preload_started.swap(true, Ordering::AcqRel) {
            let preloader = self.preloader.clone();
            let catalog_size = self.config.catalog_size;
            *self.preload_task.lock().await =
                Some(tokio::spawn(async move { preloader.preload_all(catalog_size).await }));
        }
        Ok(unlocked)
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        self.controller.toggle_pause().await
    }

    /// Wait for the preload batch started by [`Session::unlock`]
    ///
    /// Returns `None` when no preload has been started or it was already
    /// awaited.
    pub async fn wait_preload(&self) -> Result<Option<PreloadSummary>> {
        let task = self.preload_task.lock().await.take();
        match task {
            Some(task) => task
                .await
                .map(Some)
                .map_err(|e| Error::Internal(format!("preload task failed: {}", e))),
            None => Ok(None),
        }
    }

    /// Close the channel, stop playback, and join all tasks
    ///
    /// A preload still in flight is abandoned.
    pub async fn shutdown(self) -> Result<()> {
        info!("Session shutting down");
        self.channel.close();
        if let Err(e) = self.controller.shutdown().await {
            debug!("Controller already stopped: {}", e);
        }

        if let Some(task) = self.preload_task.lock().await.take() {
            task.abort();
        }

        let mut workers = self.workers.into_inner();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Session task ended abnormally: {}", e);
            }
        }
        info!("Session stopped");
        Ok(())
    }
}
