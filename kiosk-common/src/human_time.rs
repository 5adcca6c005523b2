//! Human-readable playback position formatting
//!
//! Positions are shown as `M:SS`, minutes unpadded and seconds zero-padded,
//! both truncated toward zero (`65.9s` → `1:05`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder shown when nothing is playing
pub const IDLE_CLOCK: &str = "0:00 / 0:00";

/// Format seconds as `M:SS`
///
/// Negative and non-finite input is clamped to `0:00`.
///
/// # Examples
///
/// ```
/// use kiosk_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0.0), "0:00");
/// assert_eq!(format_clock(65.9), "1:05");
/// assert_eq!(format_clock(600.0), "10:00");
/// ```
pub fn format_clock(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Snapshot of playback progress for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    /// Position as a percentage of duration, 0.0-100.0
    pub percent: f64,
    /// `"elapsed / total"` in `M:SS`
    pub clock: String,
}

impl ProgressView {
    /// Idle display: empty bar, zero clock
    pub fn idle() -> Self {
        Self {
            percent: 0.0,
            clock: IDLE_CLOCK.to_string(),
        }
    }

    /// Derive a view from position and duration
    ///
    /// Returns `None` when the duration is unknown, zero, or not finite, so the
    /// caller keeps the previous display instead of showing garbage.
    pub fn from_position(position: Duration, duration: Option<Duration>) -> Option<Self> {
        let total = duration?.as_secs_f64();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        let elapsed = position.as_secs_f64().min(total);
        Some(Self {
            percent: (elapsed / total * 100.0).clamp(0.0, 100.0),
            clock: format!("{} / {}", format_clock(elapsed), format_clock(total)),
        })
    }
}

impl Default for ProgressView {
    fn default() -> Self {
        Self::idle()
    }
}
