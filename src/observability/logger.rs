//! Diagnostic log sink for the telemetry engine.
//!
//! The engine reports its own operational events (capacity cleanups, export
//! outcomes, span and attribute summaries) through the [`Logger`] trait rather
//! than a global, so firmware can route them to a serial console, a ring buffer
//! or nowhere at all.

use std::sync::{Arc, Mutex};

use tracing::Level;

/// Sink for human-readable diagnostic lines.
pub trait Logger: Send {
    /// Emits one message at `level`.
    fn log(&self, level: Level, message: &str);
}

/// Forwards diagnostics to the `tracing` subscriber under the
/// `otel_edge::engine` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "otel_edge::engine", "{message}"),
            Level::WARN => tracing::warn!(target: "otel_edge::engine", "{message}"),
            Level::INFO => tracing::info!(target: "otel_edge::engine", "{message}"),
            Level::DEBUG => tracing::debug!(target: "otel_edge::engine", "{message}"),
            _ => tracing::trace!(target: "otel_edge::engine", "{message}"),
        }
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: Level, _message: &str) {}
}

/// Keeps every message in memory. Clones share the same record.
///
/// ```rust
/// use otel_edge::observability::{Logger, MemoryLogger};
/// use tracing::Level;
///
/// let logger = MemoryLogger::default();
/// logger.log(Level::WARN, "span store at 76%");
/// assert!(logger.contains("76%"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    lines: Arc<Mutex<Vec<(Level, String)>>>,
}

impl MemoryLogger {
    /// Snapshot of everything logged so far.
    #[must_use]
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Whether any logged message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}
