//! Fixed-capacity buffer of pending metric samples.
//!
//! The backing vector is allocated once with room for exactly `capacity`
//! samples and never grows past it; inserts beyond the bound are rejected and
//! the caller is expected to export to make room.

use crate::domain::error::{Result, TelemetryError};
use crate::domain::MetricSample;

/// Ordered, bounded collection of metric samples awaiting export.
///
/// # Example
///
/// ```rust
/// use otel_edge::storage::MetricBuffer;
///
/// let mut buffer = MetricBuffer::new(2, 31);
/// buffer.add("a", 1.0, 10)?;
/// buffer.add("b", 2.0, 20)?;
/// assert!(buffer.add("c", 3.0, 30).is_err());
///
/// let drained = buffer.drain_all();
/// assert_eq!(drained.len(), 2);
/// assert!(buffer.is_empty());
/// # Ok::<(), otel_edge::TelemetryError>(())
/// ```
#[derive(Debug)]
pub struct MetricBuffer {
    samples: Vec<MetricSample>,
    capacity: usize,
    max_name_len: usize,
}

impl MetricBuffer {
    /// Creates an empty buffer holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize, max_name_len: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            max_name_len,
        }
    }

    /// Appends a sample.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::CapacityExceeded`] once the buffer holds
    /// `capacity` samples.
    pub fn add(&mut self, name: &str, value: f64, timestamp_nanos: u64) -> Result<()> {
        if self.samples.len() >= self.capacity {
            tracing::debug!(
                metric = name,
                capacity = self.capacity,
                "metric buffer full, sample rejected"
            );
            return Err(TelemetryError::CapacityExceeded {
                resource: "metric buffer",
                capacity: self.capacity,
            });
        }

        self.samples
            .push(MetricSample::new(name, value, timestamp_nanos, self.max_name_len));
        Ok(())
    }

    /// Removes and returns every buffered sample in insertion order.
    pub fn drain_all(&mut self) -> Vec<MetricSample> {
        self.samples.drain(..).collect()
    }

    /// Drops the first `count` samples (those already delivered by a partial
    /// batch), keeping the remainder in order.
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.samples.len());
        self.samples.drain(..count);
    }

    /// Discards all buffered samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Buffered samples in insertion order.
    #[must_use]
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// Number of buffered samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether another sample would be rejected.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
