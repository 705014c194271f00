//! The telemetry facade.
//!
//! [`Telemetry`] is the single entry point producer code talks to. It owns the
//! metric buffer, the span store, the identifier generator and the exporter,
//! and adds three things on top of them:
//!
//! - the current trace, copied into every span at creation
//! - capacity relief before a span is started
//! - last-error bookkeeping, so a firmware loop can inspect failures without
//!   threading every `Result` back to the top
//!
//! Every operation runs to completion on the calling thread. The only blocking
//! point is the transport call during an export.

use opentelemetry::trace::{SpanId, TraceId};
use tracing::Level;

use crate::domain::error::Result;
use crate::domain::{AttributeValue, IdGenerator};
use crate::export::{Exporter, Transport};
use crate::infrastructure::Clock;
use crate::observability::Logger;
use crate::storage::{CapacityPolicy, CleanupReport, MetricBuffer, SpanStats, SpanStore};
use crate::Config;

use super::builder::TelemetryBuilder;
use super::state::{AttributeSummary, FlushReport};

/// Spans listed per state by [`Telemetry::log_span_summary`].
const SUMMARY_SPANS: usize = 5;

/// Bounded telemetry buffer with batch export.
///
/// Construct it with [`Telemetry::builder`].
pub struct Telemetry<T> {
    pub(super) metrics: MetricBuffer,
    pub(super) spans: SpanStore,
    pub(super) ids: IdGenerator,
    pub(super) clock: Box<dyn Clock>,
    pub(super) logger: Box<dyn Logger>,
    pub(super) exporter: Exporter<T>,
    pub(super) capacity: CapacityPolicy,
    pub(super) trace_id: TraceId,
    pub(super) last_error: Option<String>,
    pub(super) last_cleanup: Option<CleanupReport>,
}

impl Telemetry<()> {
    /// Starts building a facade from `config`.
    #[must_use]
    pub fn builder(config: Config) -> TelemetryBuilder {
        TelemetryBuilder::new(config)
    }
}

impl<T: Transport> Telemetry<T> {
    /// Buffers a metric sample stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`Telemetry::add_metric_at`].
    pub fn add_metric(&mut self, name: &str, value: f64) -> Result<()> {
        let now = self.clock.now_nanos();
        self.add_metric_at(name, value, now)
    }

    /// Buffers a metric sample captured at `timestamp_nanos` (Unix epoch).
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::CapacityExceeded`](crate::TelemetryError::CapacityExceeded) when the metric buffer is
    /// full; export to make room.
    pub fn add_metric_at(&mut self, name: &str, value: f64, timestamp_nanos: u64) -> Result<()> {
        let result = self.metrics.add(name, value, timestamp_nanos);
        self.record(result)
    }

    /// Discards every buffered metric sample.
    pub fn clear_metrics(&mut self) {
        let dropped = self.metrics.len();
        self.metrics.clear();
        tracing::debug!(dropped, "metric buffer cleared");
    }

    /// Number of buffered metric samples.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Starts a new trace and makes it current. Spans that already exist keep
    /// the trace they were created in.
    pub fn start_new_trace(&mut self) -> TraceId {
        self.trace_id = self.ids.trace_id();
        tracing::debug!(trace_id = %format_args!("{:032x}", self.trace_id), "started new trace");
        self.trace_id
    }

    /// The current trace, [`TraceId::INVALID`] before the first trace starts.
    #[must_use]
    pub const fn current_trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The current trace as 32 lowercase hex characters, or
    /// `"no_active_trace"` before the first trace starts.
    #[must_use]
    pub fn current_trace_id_hex(&self) -> String {
        if self.trace_id == TraceId::INVALID {
            "no_active_trace".to_string()
        } else {
            format!("{:032x}", self.trace_id)
        }
    }

    /// Starts a root span in the current trace.
    ///
    /// # Errors
    ///
    /// See [`Telemetry::start_child_span`].
    pub fn start_span(&mut self, name: &str) -> Result<SpanId> {
        self.start_child_span(name, SpanId::INVALID)
    }

    /// Starts a span under `parent` in the current trace.
    ///
    /// A trace is started implicitly when none is current. When the store has
    /// reached its relief threshold the capacity cascade runs first (export,
    /// then eviction, then force-closing leaked spans), so this only fails if
    /// the store is still full afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::CapacityExceeded`](crate::TelemetryError::CapacityExceeded) when no room could be
    /// made.
    pub fn start_child_span(&mut self, name: &str, parent: SpanId) -> Result<SpanId> {
        if self.trace_id == TraceId::INVALID {
            self.start_new_trace();
        }
        self.relieve_capacity();

        let now = self.clock.now_nanos();
        let result = self
            .spans
            .start(name, self.trace_id, parent, now, &mut self.ids);
        if let Ok(span_id) = &result {
            tracing::debug!(
                span = name,
                span_id = %format_args!("{span_id:016x}"),
                parent_span_id = %format_args!("{parent:016x}"),
                "span started"
            );
        }
        self.record(result)
    }

    /// Attaches an attribute to an active span.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::InvalidSpanReference`](crate::TelemetryError::InvalidSpanReference) for an unknown span
    /// - [`TelemetryError::InvalidSpanState`](crate::TelemetryError::InvalidSpanState) if the span has ended
    /// - [`TelemetryError::CapacityExceeded`](crate::TelemetryError::CapacityExceeded) once the span's attribute list
    ///   is full
    pub fn add_attribute(
        &mut self,
        span_id: SpanId,
        key: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<()> {
        let result = self.spans.add_attribute(span_id, key, value.into());
        self.record(result)
    }

    /// Ends an active span at the current time.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::InvalidSpanReference`](crate::TelemetryError::InvalidSpanReference) for an unknown span
    /// - [`TelemetryError::InvalidSpanState`](crate::TelemetryError::InvalidSpanState) if the span already ended; its
    ///   recorded end time is kept
    pub fn end_span(&mut self, span_id: SpanId) -> Result<()> {
        let now = self.clock.now_nanos();
        let result = self.spans.end(span_id, now).map(|span| {
            tracing::debug!(
                span = span.name(),
                duration_nanos = span.duration_nanos().unwrap_or_default(),
                "span ended"
            );
        });
        self.record(result)
    }

    /// Occupancy of the span store by state.
    #[must_use]
    pub fn span_stats(&self) -> SpanStats {
        self.spans.stats()
    }

    /// Sends every buffered metric sample and returns how many were delivered.
    ///
    /// An empty buffer is a successful no-op. Delivered samples are removed;
    /// on failure the undelivered samples stay buffered.
    ///
    /// # Errors
    ///
    /// [`TelemetryError::EndpointUnconfigured`](crate::TelemetryError::EndpointUnconfigured),
    /// [`TelemetryError::SerializationOverflow`](crate::TelemetryError::SerializationOverflow) or
    /// [`TelemetryError::TransportFailure`](crate::TelemetryError::TransportFailure).
    pub fn export_metrics(&mut self) -> Result<usize> {
        let result = self.exporter.export_metrics(&mut self.metrics);
        if let Ok(delivered) = &result {
            if *delivered > 0 {
                self.logger
                    .log(Level::INFO, &format!("exported {delivered} metrics"));
            }
        }
        self.record(result)
    }

    /// Sends completed spans batch by batch until none remain or a batch
    /// fails, and returns how many were delivered.
    ///
    /// Delivered spans are removed from the store. Active spans are never
    /// sent. A span too large to fit the encoding buffer on its own is
    /// dropped with a warning and the rest still go out.
    ///
    /// # Errors
    ///
    /// [`TelemetryError::EndpointUnconfigured`](crate::TelemetryError::EndpointUnconfigured),
    /// [`TelemetryError::SerializationOverflow`](crate::TelemetryError::SerializationOverflow) or
    /// [`TelemetryError::TransportFailure`](crate::TelemetryError::TransportFailure).
    pub fn export_traces(&mut self) -> Result<usize> {
        let result = self.exporter.export_spans(&mut self.spans);
        self.report_discarded();
        if let Ok(delivered) = &result {
            if *delivered > 0 {
                self.logger
                    .log(Level::INFO, &format!("exported {delivered} spans"));
            }
        }
        self.record(result)
    }

    /// Exports metrics, then traces. A failure in one does not skip the other.
    pub fn export_all(&mut self) -> FlushReport {
        let _span = tracing::debug_span!("export_all").entered();
        let metrics = self.export_metrics();
        let traces = self.export_traces();
        FlushReport { metrics, traces }
    }

    /// Message of the most recent failed operation.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Status code of the most recent collector response.
    #[must_use]
    pub const fn last_http_status(&self) -> Option<u16> {
        self.exporter.last_http_status()
    }

    /// What the most recent capacity relief pass did.
    #[must_use]
    pub const fn last_cleanup(&self) -> Option<&CleanupReport> {
        self.last_cleanup.as_ref()
    }

    /// Replaces the metrics endpoint. Empty URLs are ignored.
    pub fn set_metrics_endpoint(&mut self, url: &str) {
        if url.is_empty() {
            self.logger
                .log(Level::WARN, "ignoring empty metrics endpoint");
            return;
        }
        self.exporter.set_metrics_url(url);
        self.logger
            .log(Level::INFO, &format!("metrics endpoint set to {url}"));
    }

    /// Replaces the traces endpoint. Empty URLs are ignored.
    pub fn set_traces_endpoint(&mut self, url: &str) {
        if url.is_empty() {
            self.logger.log(Level::WARN, "ignoring empty traces endpoint");
            return;
        }
        self.exporter.set_traces_url(url);
        self.logger
            .log(Level::INFO, &format!("traces endpoint set to {url}"));
    }

    /// Whether a metrics endpoint is configured.
    #[must_use]
    pub fn has_metrics_endpoint(&self) -> bool {
        self.exporter.metrics_url().is_some()
    }

    /// Whether a traces endpoint is configured.
    #[must_use]
    pub fn has_traces_endpoint(&self) -> bool {
        self.exporter.traces_url().is_some()
    }

    /// Logs span counts by state plus the oldest few active and completed
    /// spans, and returns the counts.
    pub fn log_span_summary(&self) -> SpanStats {
        let stats = self.spans.stats();
        self.logger.log(
            Level::INFO,
            &format!(
                "spans: {}/{} used, {} active, {} completed, {} pending removal",
                stats.total,
                self.spans.capacity(),
                stats.active,
                stats.completed,
                stats.pending_removal
            ),
        );

        for span in self.spans.iter().filter(|s| s.is_active()).take(SUMMARY_SPANS) {
            self.logger.log(
                Level::INFO,
                &format!(
                    "  active {:016x} {} started at {}",
                    span.span_id(),
                    span.name(),
                    span.start_time_nanos()
                ),
            );
        }
        for span in self.spans.completed().take(SUMMARY_SPANS) {
            self.logger.log(
                Level::INFO,
                &format!(
                    "  completed {:016x} {} took {} ns with {} attributes",
                    span.span_id(),
                    span.name(),
                    span.duration_nanos().unwrap_or_default(),
                    span.attributes().len()
                ),
            );
        }
        stats
    }

    /// Logs attribute usage across all stored spans and returns it.
    pub fn log_attribute_summary(&self) -> AttributeSummary {
        let mut summary = AttributeSummary {
            spans: self.spans.len(),
            ..AttributeSummary::default()
        };

        for attribute in self.spans.iter().flat_map(|span| span.attributes()) {
            summary.attributes += 1;
            if let Some((_, count)) = summary
                .key_counts
                .iter_mut()
                .find(|(key, _)| key == attribute.key())
            {
                *count += 1;
            } else if summary.key_counts.len() < AttributeSummary::MAX_KEYS {
                summary.key_counts.push((attribute.key().to_string(), 1));
            }
        }
        if summary.spans > 0 {
            #[allow(clippy::cast_precision_loss)]
            let average = summary.attributes as f64 / summary.spans as f64;
            summary.average_per_span = average;
        }

        self.logger.log(
            Level::INFO,
            &format!(
                "attributes: {} across {} spans ({:.1} per span)",
                summary.attributes, summary.spans, summary.average_per_span
            ),
        );
        for (key, count) in &summary.key_counts {
            self.logger.log(Level::INFO, &format!("  {key}: {count}"));
        }
        summary
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now_nanos(&self) -> u64 {
        self.clock.now_nanos()
    }

    /// The span store, read-only.
    #[must_use]
    pub const fn spans(&self) -> &SpanStore {
        &self.spans
    }

    /// The metric buffer, read-only.
    #[must_use]
    pub const fn metrics(&self) -> &MetricBuffer {
        &self.metrics
    }

    /// The transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        self.exporter.transport()
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        self.exporter.transport_mut()
    }

    fn relieve_capacity(&mut self) {
        if !self.capacity.should_relieve(&self.spans) {
            return;
        }

        let Self {
            spans,
            exporter,
            clock,
            logger,
            capacity,
            ..
        } = self;
        let mut failure = None;
        let report = capacity.relieve(spans, &**clock, &**logger, |store| {
            if let Err(e) = exporter.export_spans(store) {
                logger.log(Level::WARN, &format!("capacity export failed: {e}"));
                failure = Some(e);
            }
        });

        if let Some(e) = failure {
            self.last_error = Some(e.to_string());
        }
        self.last_cleanup = Some(report);
        self.report_discarded();
    }

    fn report_discarded(&mut self) {
        for name in self.exporter.take_discarded() {
            self.logger.log(
                Level::WARN,
                &format!("dropped span '{name}': too large for the encoding buffer"),
            );
        }
    }

    fn record<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            self.logger.log(Level::WARN, &e.to_string());
            self.last_error = Some(e.to_string());
        }
        result
    }
}

impl<T> std::fmt::Debug for Telemetry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("metrics", &self.metrics.len())
            .field("spans", &self.spans.stats())
            .field("trace_id", &format_args!("{:032x}", self.trace_id))
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

