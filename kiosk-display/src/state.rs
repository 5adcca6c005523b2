//! Shared display state
//!
//! Everything a display surface may observe: the active asset, playback
//! phase, connection and unlock status, preload progress, playback position
//! and the recent diagnostics. Written only by the session's own components;
//! UI code reads it or subscribes to the EventBus.

use crate::diagnostics::DiagnosticsLog;
use crate::media::ImageHandle;
use kiosk_common::events::{EventBus, KioskEvent, PlaybackPhase};
use kiosk_common::human_time::ProgressView;
use kiosk_common::AssetId;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Placeholder id shown when nothing is active
pub const NO_ACTIVE_ID: &str = "---";

/// Preload counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadProgress {
    pub loaded: u16,
    pub failed: u16,
    pub total: u16,
}

/// Active playback snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub phase: PlaybackPhase,
    pub current_id: Option<AssetId>,
    pub paused: bool,
}

/// Shared state accessible by all components
pub struct SharedState {
    playback: RwLock<PlaybackSnapshot>,
    progress: RwLock<ProgressView>,
    current_image: RwLock<Option<ImageHandle>>,
    preload: RwLock<PreloadProgress>,
    unlocked: AtomicBool,
    controller_connected: AtomicBool,
    diagnostics: DiagnosticsLog,
    events: EventBus,
}

impl SharedState {
    pub fn new(diagnostics: DiagnosticsLog) -> Self {
        Self {
            playback: RwLock::new(PlaybackSnapshot::default()),
            progress: RwLock::new(ProgressView::idle()),
            current_image: RwLock::new(None),
            preload: RwLock::new(PreloadProgress::default()),
            unlocked: AtomicBool::new(false),
            controller_connected: AtomicBool::new(false),
            diagnostics,
            events: EventBus::new(100),
        }
    }

    /// Subscribe to state change events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<KioskEvent> {
        self.events.subscribe()
    }

    pub fn broadcast_event(&self, event: KioskEvent) {
        self.events.emit_lossy(event);
    }

    pub fn diagnostics(&self) -> &DiagnosticsLog {
        &self.diagnostics
    }

    // ---- playback ----

    pub async fn playback(&self) -> PlaybackSnapshot {
        *self.playback.read().await
    }

    pub async fn phase(&self) -> PlaybackPhase {
        self.playback.read().await.phase
    }

    pub async fn current_id(&self) -> Option<AssetId> {
        self.playback.read().await.current_id
    }

    /// Id as shown on screen: `"007"` or `"---"`
    pub async fn display_id(&self) -> String {
        match self.current_id().await {
            Some(id) => id.id3(),
            None => NO_ACTIVE_ID.to_string(),
        }
    }

    /// Replace the playback snapshot, emitting PhaseChanged if anything moved
    pub async fn set_playback(&self, snapshot: PlaybackSnapshot) {
        let old = {
            let mut guard = self.playback.write().await;
            std::mem::replace(&mut *guard, snapshot)
        };
        if old.phase != snapshot.phase || old.current_id != snapshot.current_id {
            self.broadcast_event(KioskEvent::PhaseChanged {
                old_phase: old.phase,
                new_phase: snapshot.phase,
                current_id: snapshot.current_id,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    pub async fn set_paused(&self, paused: bool) {
        let mut guard = self.playback.write().await;
        guard.paused = paused;
        if let Some(id) = guard.current_id {
            self.broadcast_event(KioskEvent::PauseToggled { id, paused });
        }
    }

    pub async fn progress(&self) -> ProgressView {
        self.progress.read().await.clone()
    }

    pub async fn set_progress(&self, id: Option<AssetId>, progress: ProgressView) {
        *self.progress.write().await = progress.clone();
        if let Some(id) = id {
            self.broadcast_event(KioskEvent::PlaybackProgress { id, progress });
        }
    }

    pub async fn current_image(&self) -> Option<ImageHandle> {
        self.current_image.read().await.clone()
    }

    pub async fn set_current_image(&self, image: Option<ImageHandle>) {
        *self.current_image.write().await = image;
    }

    // ---- gates and connectivity ----

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::Acquire)
    }

    pub fn set_unlocked(&self, success: bool) {
        if success {
            self.unlocked.store(true, Ordering::Release);
        }
        self.broadcast_event(KioskEvent::Unlocked {
            success,
            timestamp: chrono::Utc::now(),
        });
    }

    pub fn is_controller_connected(&self) -> bool {
        self.controller_connected.load(Ordering::Acquire)
    }

    pub fn set_controller_connected(&self, connected: bool) {
        let previous = self.controller_connected.swap(connected, Ordering::AcqRel);
        if previous != connected {
            self.broadcast_event(KioskEvent::ConnectionChanged {
                connected,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    // ---- preload ----

    pub async fn preload(&self) -> PreloadProgress {
        *self.preload.read().await
    }

    pub async fn set_preload(&self, progress: PreloadProgress) {
        *self.preload.write().await = progress;
        self.broadcast_event(KioskEvent::PreloadProgress {
            loaded: progress.loaded,
            failed: progress.failed,
            total: progress.total,
        });
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(DiagnosticsLog::default())
    }
}
