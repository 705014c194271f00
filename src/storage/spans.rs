//! Fixed-capacity span store.
//!
//! The store is an arena of at most `capacity` spans kept in creation order.
//! Spans move through `Active → Completed → PendingRemoval` and are physically
//! removed by an order-preserving compaction sweep, so export order always
//! matches the order in which spans were started.
//!
//! The store never allocates beyond its declared bound: the span vector and
//! every span's attribute list are sized once, at creation.

use opentelemetry::trace::{SpanId, TraceId};

use crate::domain::error::{Result, TelemetryError};
use crate::domain::{AttributeValue, IdGenerator, Span, SpanAttribute, SpanState};

/// Size limits for a [`SpanStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanLimits {
    /// Maximum number of spans held at once, in any state.
    pub capacity: usize,
    /// Maximum attributes per span.
    pub max_attributes: usize,
    /// Maximum span name and attribute key length in bytes.
    pub max_name_len: usize,
    /// Maximum string attribute value length in bytes.
    pub max_value_len: usize,
}

impl Default for SpanLimits {
    fn default() -> Self {
        Self {
            capacity: 50,
            max_attributes: 10,
            max_name_len: 31,
            max_value_len: 63,
        }
    }
}

/// Occupancy breakdown of a [`SpanStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpanStats {
    /// All spans currently held.
    pub total: usize,
    /// Spans still open.
    pub active: usize,
    /// Closed spans awaiting export.
    pub completed: usize,
    /// Exported spans awaiting compaction.
    pub pending_removal: usize,
}

/// Bounded arena of spans in creation order.
#[derive(Debug)]
pub struct SpanStore {
    spans: Vec<Span>,
    limits: SpanLimits,
}

impl SpanStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(limits: SpanLimits) -> Self {
        Self {
            spans: Vec::with_capacity(limits.capacity),
            limits,
        }
    }

    /// Opens a new active span and returns its id.
    ///
    /// The id is drawn from `ids` and re-drawn on the rare collision with a
    /// span the store still holds. `parent` is [`SpanId::INVALID`] for a root.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::CapacityExceeded`] when the store is full.
    /// Capacity relief is the caller's job (see
    /// [`crate::storage::CapacityPolicy`]).
    pub fn start(
        &mut self,
        name: &str,
        trace_id: TraceId,
        parent: SpanId,
        start_time_nanos: u64,
        ids: &mut IdGenerator,
    ) -> Result<SpanId> {
        if self.is_full() {
            return Err(TelemetryError::CapacityExceeded {
                resource: "span store",
                capacity: self.limits.capacity,
            });
        }

        let span_id = loop {
            let candidate = ids.span_id();
            if !self.contains(candidate) {
                break candidate;
            }
            tracing::debug!(span_id = %format_args!("{candidate:016x}"), "span id collision, redrawing");
        };

        self.spans.push(Span::open(
            name,
            trace_id,
            span_id,
            parent,
            start_time_nanos,
            self.limits.max_name_len,
            self.limits.max_attributes,
        ));
        Ok(span_id)
    }

    /// Appends an attribute to an active span.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::InvalidSpanReference`] for id 0 or an unknown id
    /// - [`TelemetryError::InvalidSpanState`] if the span is no longer active
    /// - [`TelemetryError::CapacityExceeded`] once the span holds
    ///   `max_attributes` attributes
    pub fn add_attribute(&mut self, span_id: SpanId, key: &str, value: AttributeValue) -> Result<()> {
        let limits = self.limits;
        let span = self.active_mut(span_id)?;

        if span.attributes.len() >= limits.max_attributes {
            return Err(TelemetryError::CapacityExceeded {
                resource: "span attribute list",
                capacity: limits.max_attributes,
            });
        }

        span.attributes.push(SpanAttribute::bounded(
            key,
            value,
            limits.max_name_len,
            limits.max_value_len,
        ));
        Ok(())
    }

    /// Closes an active span at `end_time_nanos`.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::InvalidSpanReference`] for id 0 or an unknown id
    /// - [`TelemetryError::InvalidSpanState`] if the span was already closed;
    ///   its stored end time is left untouched
    pub fn end(&mut self, span_id: SpanId, end_time_nanos: u64) -> Result<&Span> {
        let span = self.active_mut(span_id)?;
        span.close(end_time_nanos);
        Ok(&*span)
    }

    fn active_mut(&mut self, span_id: SpanId) -> Result<&mut Span> {
        if span_id == SpanId::INVALID {
            return Err(TelemetryError::InvalidSpanReference(span_id));
        }
        let span = self
            .spans
            .iter_mut()
            .find(|span| span.span_id == span_id)
            .ok_or(TelemetryError::InvalidSpanReference(span_id))?;

        if span.state != SpanState::Active {
            return Err(TelemetryError::InvalidSpanState {
                span_id,
                state: span.state,
            });
        }
        Ok(span)
    }

    /// Looks up a span by id.
    #[must_use]
    pub fn get(&self, span_id: SpanId) -> Option<&Span> {
        self.spans.iter().find(|span| span.span_id == span_id)
    }

    /// Whether a span with this id is held.
    #[must_use]
    pub fn contains(&self, span_id: SpanId) -> bool {
        self.get(span_id).is_some()
    }

    /// All spans in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter()
    }

    /// Completed, not yet exported spans in creation order.
    pub fn completed(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|span| span.is_completed())
    }

    /// Number of completed, not yet exported spans.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed().count()
    }

    /// Occupancy breakdown by state.
    #[must_use]
    pub fn stats(&self) -> SpanStats {
        self.spans.iter().fold(
            SpanStats {
                total: self.spans.len(),
                ..SpanStats::default()
            },
            |mut stats, span| {
                match span.state {
                    SpanState::Active => stats.active += 1,
                    SpanState::Completed => stats.completed += 1,
                    SpanState::PendingRemoval => stats.pending_removal += 1,
                }
                stats
            },
        )
    }

    /// Marks the given completed spans as exported. Ids that are unknown or
    /// not completed are skipped. Returns how many spans were marked.
    pub fn mark_exported(&mut self, span_ids: &[SpanId]) -> usize {
        let mut marked = 0;
        for span in &mut self.spans {
            if span.state == SpanState::Completed && span_ids.contains(&span.span_id) {
                span.state = SpanState::PendingRemoval;
                marked += 1;
            }
        }
        marked
    }

    /// Removes every exported span, preserving the order of the rest.
    /// Returns how many spans were removed.
    pub fn compact(&mut self) -> usize {
        let before = self.spans.len();
        self.spans
            .retain(|span| span.state != SpanState::PendingRemoval);
        let removed = before - self.spans.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = self.spans.len(), "compacted exported spans");
        }
        removed
    }

    /// Removes one closed span without exporting it.
    pub fn discard(&mut self, span_id: SpanId) -> Option<Span> {
        let index = self
            .spans
            .iter()
            .position(|span| span.span_id == span_id && !span.is_active())?;
        Some(self.spans.remove(index))
    }

    /// Drops every closed span whether or not it was exported, keeping only
    /// active spans. Returns how many spans were removed.
    pub fn evict_completed(&mut self) -> usize {
        let before = self.spans.len();
        self.spans.retain(Span::is_active);
        before - self.spans.len()
    }

    /// Force-closes the oldest active spans at `now_nanos` until the store
    /// would hold at most `target_len` spans once closed spans are removed.
    /// Returns how many spans were closed.
    pub fn force_complete_oldest(&mut self, now_nanos: u64, target_len: usize) -> usize {
        let total = self.spans.len();
        let mut closed = 0;
        for span in &mut self.spans {
            if total - closed <= target_len {
                break;
            }
            if span.is_active() {
                span.close(now_nanos);
                closed += 1;
                tracing::debug!(
                    span = %span.name,
                    span_id = %format_args!("{:016x}", span.span_id),
                    "force-closed active span"
                );
            }
        }
        closed
    }

    /// Number of spans held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Whether another span would be rejected.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.spans.len() >= self.limits.capacity
    }

    /// Fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.limits.capacity
    }

    /// Configured limits.
    #[must_use]
    pub const fn limits(&self) -> SpanLimits {
        self.limits
    }
}
