//! On-screen diagnostics log
//!
//! A tracing layer that keeps the most recent log lines (newest first) in a
//! bounded ring so a display surface can render a debug overlay without
//! reading the process log.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Lines kept for the overlay
pub const DIAGNOSTICS_CAPACITY: usize = 50;

/// One captured log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLine {
    pub level: Level,
    pub text: String,
}

/// Bounded, shared ring of recent log lines
#[derive(Debug, Clone)]
pub struct DiagnosticsLog {
    lines: Arc<Mutex<VecDeque<DiagnosticLine>>>,
    capacity: usize,
}

impl DiagnosticsLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Record a line at the front, dropping the oldest beyond capacity
    pub fn push(&self, level: Level, text: String) {
        let mut lines = self.lines.lock().unwrap_or_else(|p| p.into_inner());
        lines.push_front(DiagnosticLine { level, text });
        lines.truncate(self.capacity);
    }

    /// Snapshot, newest first
    pub fn lines(&self) -> Vec<DiagnosticLine> {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Number of captured lines at `level` or more severe
    pub fn count_at_least(&self, level: Level) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|line| line.level <= level)
            .count()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        Self::new(DIAGNOSTICS_CAPACITY)
    }
}

/// tracing layer feeding a [`DiagnosticsLog`]
///
/// Captures INFO and above from this crate and the common crate only.
pub struct DiagnosticsLayer {
    log: DiagnosticsLog,
}

impl DiagnosticsLayer {
    pub fn new(log: DiagnosticsLog) -> Self {
        Self { log }
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    extra: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.extra, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.extra, " {}={}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if *metadata.level() > Level::INFO
            || !(target.starts_with("kiosk_display") || target.starts_with("kiosk_common"))
        {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let timestamp = chrono::Local::now().format("%H:%M:%S");
        self.log.push(
            *metadata.level(),
            format!("[{}] {}{}", timestamp, visitor.message, visitor.extra),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_ring_is_bounded_newest_first() {
        let log = DiagnosticsLog::new(3);
        for i in 0..5 {
            log.push(Level::INFO, format!("line {}", i));
        }
        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "line 4");
        assert_eq!(lines[2].text, "line 2");
    }

    #[test]
    fn test_layer_captures_crate_events() {
        let log = DiagnosticsLog::default();
        let subscriber = tracing_subscriber::registry().with(DiagnosticsLayer::new(log.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("Unknown message type: pause");
            tracing::debug!("too chatty for the overlay");
            tracing::info!(target: "hyper", "foreign crate");
        });

        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].level, Level::WARN);
        assert!(lines[0].text.ends_with("Unknown message type: pause"));
        assert_eq!(log.count_at_least(Level::WARN), 1);
    }
}
