//! Reports returned by the telemetry facade.
//!
//! These are plain snapshots: they borrow nothing from the facade and can be
//! logged, compared or kept around after the facade has moved on.

use crate::domain::error::Result;

/// Outcome of [`crate::Telemetry::export_all`].
///
/// Metrics and traces are exported independently; a failure in one never
/// skips the other, so both outcomes are always present.
#[derive(Debug)]
pub struct FlushReport {
    /// Metric samples delivered, or why the metric export failed.
    pub metrics: Result<usize>,
    /// Spans delivered, or why the trace export failed.
    pub traces: Result<usize>,
}

impl FlushReport {
    /// Whether both exports succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.metrics.is_ok() && self.traces.is_ok()
    }

    /// Total items delivered across both signals.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.metrics.as_ref().map_or(0, |n| *n) + self.traces.as_ref().map_or(0, |n| *n)
    }
}

/// Attribute usage across all stored spans.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeSummary {
    /// Spans inspected.
    pub spans: usize,
    /// Attributes across those spans.
    pub attributes: usize,
    /// Mean attributes per span, zero without spans.
    pub average_per_span: f64,
    /// Occurrences per distinct key in first-seen order, capped at
    /// [`AttributeSummary::MAX_KEYS`] keys.
    pub key_counts: Vec<(String, usize)>,
}

impl AttributeSummary {
    /// Distinct keys tracked by [`AttributeSummary::key_counts`].
    pub const MAX_KEYS: usize = 20;
}
