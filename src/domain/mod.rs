//! Domain layer for the telemetry engine.
//!
//! This module contains the core value types (metric samples, spans and their
//! attributes), identifier generation and the crate error type. It has no
//! knowledge of buffering policy or wire formats.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`ids`]: Random trace and span identifiers
//! - [`metric`]: Metric sample model
//! - [`span`]: Span, attribute and lifecycle state model

pub mod error;
pub mod ids;
pub mod metric;
pub mod span;

pub use error::{Result, TelemetryError};
pub use ids::IdGenerator;
pub use metric::MetricSample;
pub use span::{AttributeValue, Span, SpanAttribute, SpanState};

/// Copies `value`, truncated to at most `max_len` bytes on a char boundary.
pub(crate) fn bounded_string(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}
