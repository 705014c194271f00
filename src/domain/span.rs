//! Span domain model.
//!
//! A [`Span`] is a timed unit of work that belongs to a trace. Spans live
//! exclusively inside the [`crate::storage::SpanStore`]; callers only ever hold
//! the opaque [`SpanId`] handed out when the span was started.

use std::fmt;

use opentelemetry::trace::{SpanId, TraceId};

use super::bounded_string;

/// Lifecycle state of a stored span.
///
/// ```text
/// Active ──end──▶ Completed ──exported──▶ PendingRemoval ──compaction──▶ (gone)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanState {
    /// Open; attributes may still be appended and the end time is unset.
    Active,
    /// Closed with an end time; eligible for export.
    Completed,
    /// Successfully exported and waiting for the next compaction sweep.
    PendingRemoval,
}

impl fmt::Display for SpanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::PendingRemoval => "pending removal",
        };
        f.write_str(label)
    }
}

/// Value half of a span attribute: exactly one of a string or a double.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Rendered as `{"stringValue": "..."}`.
    String(String),
    /// Rendered as `{"doubleValue": 1.23}`.
    Double(f64),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// Key/value pair attached to a span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanAttribute {
    key: String,
    value: AttributeValue,
}

impl SpanAttribute {
    /// Creates an attribute, truncating the key to `max_key_len` bytes and
    /// string values to `max_value_len` bytes.
    pub(crate) fn bounded(
        key: &str,
        value: AttributeValue,
        max_key_len: usize,
        max_value_len: usize,
    ) -> Self {
        let value = match value {
            AttributeValue::String(s) => AttributeValue::String(bounded_string(&s, max_value_len)),
            double @ AttributeValue::Double(_) => double,
        };
        Self {
            key: bounded_string(key, max_key_len),
            value,
        }
    }

    /// Attribute key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Attribute value.
    #[must_use]
    pub const fn value(&self) -> &AttributeValue {
        &self.value
    }
}

/// A span held by the span store.
///
/// The trace id is copied from the current trace at creation, so starting a new
/// trace never changes spans that already exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub(crate) name: String,
    pub(crate) trace_id: TraceId,
    pub(crate) span_id: SpanId,
    pub(crate) parent_span_id: SpanId,
    pub(crate) start_time_nanos: u64,
    pub(crate) end_time_nanos: u64,
    pub(crate) attributes: Vec<SpanAttribute>,
    pub(crate) state: SpanState,
}

impl Span {
    /// Opens a new active span. The attribute list is allocated once with
    /// room for exactly `max_attributes` entries.
    pub(crate) fn open(
        name: &str,
        trace_id: TraceId,
        span_id: SpanId,
        parent_span_id: SpanId,
        start_time_nanos: u64,
        max_name_len: usize,
        max_attributes: usize,
    ) -> Self {
        Self {
            name: bounded_string(name, max_name_len),
            trace_id,
            span_id,
            parent_span_id,
            start_time_nanos,
            end_time_nanos: 0,
            attributes: Vec::with_capacity(max_attributes),
            state: SpanState::Active,
        }
    }

    /// Closes the span. The end time is clamped to at least one nanosecond
    /// after the start so a completed span always has a positive duration.
    pub(crate) fn close(&mut self, now_nanos: u64) {
        self.end_time_nanos = now_nanos.max(self.start_time_nanos.saturating_add(1));
        self.state = SpanState::Completed;
    }

    /// Span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Trace this span belongs to.
    #[must_use]
    pub const fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Identifier of this span.
    #[must_use]
    pub const fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// Parent span, or `None` for a root span.
    #[must_use]
    pub fn parent_span_id(&self) -> Option<SpanId> {
        (self.parent_span_id != SpanId::INVALID).then_some(self.parent_span_id)
    }

    /// Start time in nanoseconds since the Unix epoch.
    #[must_use]
    pub const fn start_time_nanos(&self) -> u64 {
        self.start_time_nanos
    }

    /// End time in nanoseconds since the Unix epoch, `None` while active.
    #[must_use]
    pub const fn end_time_nanos(&self) -> Option<u64> {
        match self.state {
            SpanState::Active => None,
            SpanState::Completed | SpanState::PendingRemoval => Some(self.end_time_nanos),
        }
    }

    /// Duration in nanoseconds, `None` while active.
    #[must_use]
    pub fn duration_nanos(&self) -> Option<u64> {
        self.end_time_nanos()
            .map(|end| end.saturating_sub(self.start_time_nanos))
    }

    /// Attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> &[SpanAttribute] {
        &self.attributes
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SpanState {
        self.state
    }

    /// Whether the span is still open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SpanState::Active
    }

    /// Whether the span is closed and not yet exported.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == SpanState::Completed
    }
}
