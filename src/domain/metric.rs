//! Metric sample model.

use super::bounded_string;

/// A single gauge reading awaiting export.
///
/// Samples are immutable once buffered: they are created by
/// [`crate::storage::MetricBuffer::add`] and dropped when exported or cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    name: String,
    value: f64,
    timestamp_nanos: u64,
}

impl MetricSample {
    /// Creates a sample, truncating the name to `max_name_len` bytes.
    #[must_use]
    pub fn new(name: &str, value: f64, timestamp_nanos: u64, max_name_len: usize) -> Self {
        Self {
            name: bounded_string(name, max_name_len),
            value,
            timestamp_nanos,
        }
    }

    /// Metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sampled value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Capture time in nanoseconds since the Unix epoch.
    #[must_use]
    pub const fn timestamp_nanos(&self) -> u64 {
        self.timestamp_nanos
    }
}
