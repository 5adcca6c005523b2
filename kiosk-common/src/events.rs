//! Event types for the kiosk display
//!
//! Provides the UI-facing event enum and the EventBus that carries it. These
//! events are what any display surface (on-screen page, status LEDs, debug
//! overlay) consumes; they never feed back into playback decisions.

use crate::human_time::ProgressView;
use crate::protocol::AssetId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Playback phase of the display
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// Nothing active
    #[default]
    Idle,
    /// Play accepted, resources still being resolved
    Loading,
    /// Audio advancing (or paused by the local operator)
    Playing,
    /// Explicitly stopped; treated like Idle for the next command
    Stopped,
}

impl PlaybackPhase {
    /// Whether an asset is currently active in this phase
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackPhase::Loading | PlaybackPhase::Playing)
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Loading => write!(f, "loading"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Kiosk event types
///
/// Events are broadcast via EventBus and can be serialized for any UI
/// transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KioskEvent {
    /// Playback phase or active asset changed
    PhaseChanged {
        /// Phase before change
        old_phase: PlaybackPhase,
        /// Phase after change
        new_phase: PlaybackPhase,
        /// Active asset after change (None when idle)
        current_id: Option<AssetId>,
        /// When the phase changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Control channel connected or dropped
    ConnectionChanged {
        /// True once the channel is open
        connected: bool,
        /// When the connection state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback permission gate opened (or the attempt failed)
    Unlocked {
        /// Whether the gate is now open
        success: bool,
        /// When the gate attempt finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Local operator paused or resumed the active asset
    PauseToggled {
        /// Asset affected
        id: AssetId,
        /// True when now paused
        paused: bool,
    },

    /// One asset pair finished preloading (successfully or not)
    PreloadProgress {
        /// Pairs inserted into the cache so far
        loaded: u16,
        /// Pairs that failed so far
        failed: u16,
        /// Catalog size
        total: u16,
    },

    /// Whole catalog preload finished
    PreloadFinished {
        /// Pairs inserted into the cache
        loaded: u16,
        /// Pairs that failed
        failed: u16,
        /// Wall time for the batch
        elapsed_ms: u64,
    },

    /// Playback position update for the active asset
    PlaybackProgress {
        /// Asset playing
        id: AssetId,
        /// Derived display values
        progress: ProgressView,
    },
}

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use kiosk_common::events::{EventBus, KioskEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
/// bus.emit_lossy(KioskEvent::PreloadProgress { loaded: 1, failed: 0, total: 10 });
/// assert!(matches!(rx.try_recv(), Ok(KioskEvent::PreloadProgress { loaded: 1, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KioskEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: KioskEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_activity() {
        assert!(!PlaybackPhase::Idle.is_active());
        assert!(PlaybackPhase::Loading.is_active());
        assert!(PlaybackPhase::Playing.is_active());
        assert!(!PlaybackPhase::Stopped.is_active());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = KioskEvent::ConnectionChanged {
            connected: true,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ConnectionChanged");
        assert_eq!(json["connected"], true);
    }

    #[test]
    fn test_emit_lossy_without_subscribers() {
        let bus = EventBus::new(4);
        bus.emit_lossy(KioskEvent::PreloadProgress { loaded: 0, failed: 0, total: 1 });

        // Late subscribers only see later events
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
        bus.emit_lossy(KioskEvent::PreloadProgress { loaded: 1, failed: 0, total: 1 });
        assert!(matches!(
            rx.try_recv(),
            Ok(KioskEvent::PreloadProgress { loaded: 1, .. })
        ));
    }
}
