//! Catalog preloader
//!
//! Fetches every image+audio pair of the catalog into the [`MediaCache`]
//! before commands are expected, at most `K` pairs at a time.
//!
//! Per pair:
//! - image and audio are fetched concurrently
//! - the pair is cached once the image is decoded and the audio is buffered
//! - audio still buffering after the timeout is cached anyway (degraded);
//!   a late handle plays better than a missing one
//! - an image failure or hard audio error leaves the id out of the cache, so
//!   playback falls back to a direct fetch
//!
//! One failing pair never aborts the batch.

use crate::error::{Error, Result};
use crate::media::{CacheEntry, MediaCache, MediaFetcher};
use crate::preload::scheduler::BoundedScheduler;
use crate::state::{PreloadProgress, SharedState};
use kiosk_common::events::KioskEvent;
use kiosk_common::locator::MediaLocator;
use kiosk_common::AssetId;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of one full preload batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreloadSummary {
    /// Pairs inserted into the cache, degraded ones included
    pub loaded: u16,
    /// Pairs left out of the cache
    pub failed: u16,
    /// Subset of `loaded` whose audio was still buffering at insertion
    pub degraded: u16,
    /// Wall time of the whole batch
    pub elapsed_ms: u64,
}

/// How a single pair ended
#[derive(Debug)]
pub enum PairOutcome {
    /// Image decoded and audio fully buffered
    Loaded,
    /// Image decoded, audio inserted while still buffering
    Degraded,
    /// Not inserted
    Failed(Error),
}

/// Fills the media cache from the catalog
#[derive(Clone)]
pub struct Preloader {
    fetcher: Arc<dyn MediaFetcher>,
    locator: MediaLocator,
    cache: MediaCache,
    scheduler: BoundedScheduler,
    audio_timeout: Duration,
    state: Arc<SharedState>,
}

impl Preloader {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        locator: MediaLocator,
        cache: MediaCache,
        scheduler: BoundedScheduler,
        audio_timeout: Duration,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            fetcher,
            locator,
            cache,
            scheduler,
            audio_timeout,
            state,
        }
    }

    /// Preload ids `1..=catalog_size`
    ///
    /// Always returns once every id has been loaded, degraded or failed.
    /// Progress is published to shared state after each pair.
    pub async fn preload_all(&self, catalog_size: u16) -> PreloadSummary {
        let started = Instant::now();
        let mut progress = PreloadProgress {
            loaded: 0,
            failed: 0,
            total: catalog_size,
        };
        self.state.set_preload(progress).await;

        info!(
            "Preloading {} assets ({} concurrent, audio timeout {:?})",
            catalog_size,
            self.scheduler.capacity(),
            self.audio_timeout
        );

        let mut tasks = JoinSet::new();
        for id in AssetId::catalog(catalog_size) {
            let preloader = self.clone();
            tasks.spawn(async move {
                let outcome = preloader.load_pair(id).await;
                (id, outcome)
            });
        }

        let mut degraded = 0u16;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, PairOutcome::Loaded)) => {
                    debug!("Preloaded {}", id.id3());
                    progress.loaded += 1;
                }
                Ok((id, PairOutcome::Degraded)) => {
                    debug!("Preloaded {} (audio still buffering)", id.id3());
                    progress.loaded += 1;
                    degraded += 1;
                }
                Ok((id, PairOutcome::Failed(e))) => {
                    warn!("Preload failed for {}: {}", id.id3(), e);
                    progress.failed += 1;
                }
                Err(e) => {
                    error!("Preload task aborted: {}", e);
                    progress.failed += 1;
                }
            }
            self.state.set_preload(progress).await;
        }

        let summary = PreloadSummary {
            loaded: progress.loaded,
            failed: progress.failed,
            degraded,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            "Preload finished: {}/{} loaded ({} degraded), {} failed in {} ms",
            summary.loaded, catalog_size, summary.degraded, summary.failed, summary.elapsed_ms
        );
        self.state.broadcast_event(KioskEvent::PreloadFinished {
            loaded: summary.loaded,
            failed: summary.failed,
            elapsed_ms: summary.elapsed_ms,
        });

        summary
    }

    /// Fetch one pair under a scheduler slot and cache it if usable
    pub async fn load_pair(&self, id: AssetId) -> PairOutcome {
        match self.try_load_pair(id).await {
            Ok(true) => PairOutcome::Loaded,
            Ok(false) => PairOutcome::Degraded,
            Err(e) => PairOutcome::Failed(e),
        }
    }

    async fn try_load_pair(&self, id: AssetId) -> Result<bool> {
        let _slot = self.scheduler.acquire().await?;

        let image_location = self.locator.image(id);
        let audio = self.fetcher.open_audio(&self.locator.audio(id));

        let (image, audio_state) = tokio::join!(
            self.fetcher.fetch_image(&image_location),
            tokio::time::timeout(self.audio_timeout, audio.ready()),
        );

        let image = image?;
        let ready = match audio_state {
            Ok(result) => {
                result?;
                true
            }
            Err(_) => {
                warn!(
                    "Audio for {} not buffered after {:?} ({} bytes so far), caching anyway",
                    id.id3(),
                    self.audio_timeout,
                    audio.buffered_bytes()
                );
                false
            }
        };

        self.cache.put(
            id,
            CacheEntry {
                id,
                image,
                audio,
                ready,
            },
        );
        Ok(ready)
    }
}
