//! Bounded in-memory storage for telemetry awaiting export.
//!
//! Everything here has a fixed capacity chosen at construction. Inserts beyond
//! capacity are rejected, never grown into, and the span store additionally
//! carries an occupancy policy that exports, evicts or force-closes spans
//! before the store runs out of room.
//!
//! # Modules
//!
//! - `metrics`: Fixed-capacity metric sample buffer
//! - `spans`: Fixed-capacity span arena with lifecycle states
//! - `capacity`: Threshold-driven relief cascade for the span store

pub mod capacity;
pub mod metrics;
pub mod spans;

pub use capacity::{CapacityPolicy, CleanupReport};
pub use metrics::MetricBuffer;
pub use spans::{SpanLimits, SpanStats, SpanStore};
