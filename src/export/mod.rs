//! Batch export of buffered telemetry.
//!
//! The [`Exporter`] owns the payload serializer, the transport and the two
//! collector endpoints. It pulls a batch out of bounded storage, renders it,
//! posts it, and only removes data from storage once the collector has
//! acknowledged it with a 2xx status.
//!
//! # Architecture
//!
//! ```text
//! MetricBuffer / SpanStore → PayloadSerializer → EncodeBuffer → Transport → collector
//! ```
//!
//! Batches that overflow the encoding buffer are halved and rendered again.
//! A metric sample that does not fit on its own is reported as
//! [`TelemetryError::SerializationOverflow`] and nothing is sent. A span that
//! does not fit on its own is dropped from the store so the spans behind it
//! can still go out; its name is kept until the owner collects it with
//! [`Exporter::take_discarded`].
//!
//! # Modules
//!
//! - [`buffer`]: Fixed-size all-or-nothing encoding buffer
//! - [`serializer`]: OTLP JSON rendering and span batch planning
//! - [`transport`]: Transport trait and blocking HTTP implementation

pub mod buffer;
pub mod serializer;
pub mod transport;

use opentelemetry::trace::SpanId;

use crate::domain::error::{Result, TelemetryError};
use crate::domain::Span;
use crate::storage::{MetricBuffer, SpanStore};

pub use buffer::EncodeBuffer;
pub use serializer::{plan_span_batch, PayloadSerializer, Resource, SerializerLimits};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{Transport, TransportResponse};

/// Renders and ships batches to the metrics and traces endpoints.
#[derive(Debug)]
pub struct Exporter<T> {
    serializer: PayloadSerializer,
    transport: T,
    metrics_url: Option<String>,
    traces_url: Option<String>,
    last_http_status: Option<u16>,
    discarded: Vec<String>,
}

impl<T: Transport> Exporter<T> {
    /// Creates an exporter. Either endpoint may be left unconfigured; exports
    /// to it then fail with [`TelemetryError::EndpointUnconfigured`].
    pub fn new(
        serializer: PayloadSerializer,
        transport: T,
        metrics_url: Option<String>,
        traces_url: Option<String>,
    ) -> Self {
        Self {
            serializer,
            transport,
            metrics_url,
            traces_url,
            last_http_status: None,
            discarded: Vec::new(),
        }
    }

    /// Sends every buffered metric sample.
    ///
    /// The whole buffer goes out as one document when it fits; otherwise it is
    /// sent in successive shrunk batches. Delivered batches are removed from
    /// `buffer`, undelivered ones stay. Returns the number of samples delivered;
    /// an empty buffer is a successful no-op.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::EndpointUnconfigured`] without a metrics endpoint
    /// - [`TelemetryError::SerializationOverflow`] if a single sample does not
    ///   fit the encoding buffer
    /// - [`TelemetryError::TransportFailure`] if a batch is not acknowledged
    pub fn export_metrics(&mut self, buffer: &mut MetricBuffer) -> Result<usize> {
        if buffer.is_empty() {
            tracing::debug!("no metrics pending");
            return Ok(0);
        }
        let _span = tracing::debug_span!("export_metrics", pending = buffer.len()).entered();

        let Self {
            serializer,
            transport,
            metrics_url,
            last_http_status,
            ..
        } = self;
        let url = metrics_url
            .as_deref()
            .ok_or(TelemetryError::EndpointUnconfigured("metrics"))?;

        let mut delivered = 0;
        let mut batch = buffer.len();
        while !buffer.is_empty() {
            batch = batch.min(buffer.len());
            let payload = match serializer.render_metrics(&buffer.samples()[..batch]) {
                Ok(payload) => payload,
                Err(TelemetryError::SerializationOverflow { .. }) if batch > 1 => {
                    batch /= 2;
                    tracing::debug!(batch, "metric batch overflowed, shrinking");
                    continue;
                }
                Err(e) => return Err(e),
            };

            post(transport, last_http_status, url, payload)?;
            buffer.consume(batch);
            delivered += batch;
        }

        tracing::debug!(delivered, "metrics exported");
        Ok(delivered)
    }

    /// Sends one batch of completed spans, then marks the delivered spans
    /// exported and compacts the store.
    ///
    /// Returns the number of spans delivered; zero when nothing is completed
    /// or when the head span was too large to render and had to be dropped.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::EndpointUnconfigured`] without a traces endpoint
    /// - [`TelemetryError::TransportFailure`] if the batch is not acknowledged
    pub fn export_span_batch(&mut self, store: &mut SpanStore) -> Result<usize> {
        let (completed, attributes) = store
            .completed()
            .fold((0, 0), |(count, attributes), span| {
                (count + 1, attributes + span.attributes().len())
            });
        if completed == 0 {
            return Ok(0);
        }

        let Self {
            serializer,
            transport,
            traces_url,
            last_http_status,
            discarded,
            ..
        } = self;
        let url = traces_url
            .as_deref()
            .ok_or(TelemetryError::EndpointUnconfigured("traces"))?;

        let mut batch = plan_span_batch(completed, attributes, serializer.limits());
        let candidates: Vec<&Span> = store.completed().take(batch).collect();
        let _span =
            tracing::debug_span!("export_span_batch", completed, planned = batch).entered();

        loop {
            let payload = match serializer.render_spans(&candidates[..batch]) {
                Ok(payload) => payload,
                Err(TelemetryError::SerializationOverflow { .. }) if batch > 1 => {
                    batch /= 2;
                    tracing::debug!(batch, "span batch overflowed, shrinking");
                    continue;
                }
                Err(TelemetryError::SerializationOverflow { capacity }) => {
                    let oversized = candidates[0].span_id();
                    if let Some(span) = store.discard(oversized) {
                        tracing::warn!(
                            span = span.name(),
                            span_id = %format_args!("{oversized:016x}"),
                            capacity,
                            "span does not fit the encoding buffer, dropped"
                        );
                        discarded.push(span.name().to_string());
                    }
                    return Ok(0);
                }
                Err(e) => return Err(e),
            };
            post(transport, last_http_status, url, payload)?;
            break;
        }

        let sent: Vec<SpanId> = candidates[..batch].iter().map(|span| span.span_id()).collect();
        let marked = store.mark_exported(&sent);
        store.compact();
        tracing::debug!(sent = marked, "span batch exported");
        Ok(marked)
    }

    /// Sends completed spans batch by batch until none remain or a batch
    /// fails. Returns the number of spans delivered.
    ///
    /// # Errors
    ///
    /// The first batch failure is returned; batches delivered before it stay
    /// delivered.
    pub fn export_spans(&mut self, store: &mut SpanStore) -> Result<usize> {
        let _span = tracing::debug_span!("export_spans").entered();
        let mut exported = 0;
        loop {
            let before = store.completed_count();
            if before == 0 {
                break;
            }
            exported += self.export_span_batch(store)?;
            if store.completed_count() >= before {
                tracing::warn!(remaining = before, "span export made no progress");
                break;
            }
        }
        Ok(exported)
    }

    /// Replaces the metrics endpoint.
    pub fn set_metrics_url(&mut self, url: impl Into<String>) {
        self.metrics_url = Some(url.into());
    }

    /// Replaces the traces endpoint.
    pub fn set_traces_url(&mut self, url: impl Into<String>) {
        self.traces_url = Some(url.into());
    }

    /// Metrics endpoint, if configured.
    #[must_use]
    pub fn metrics_url(&self) -> Option<&str> {
        self.metrics_url.as_deref()
    }

    /// Traces endpoint, if configured.
    #[must_use]
    pub fn traces_url(&self) -> Option<&str> {
        self.traces_url.as_deref()
    }

    /// Names of spans dropped for not fitting the encoding buffer since the
    /// last call.
    pub fn take_discarded(&mut self) -> Vec<String> {
        std::mem::take(&mut self.discarded)
    }

    /// Status code of the most recent collector response, `None` before the
    /// first send or after a connection-level failure.
    #[must_use]
    pub const fn last_http_status(&self) -> Option<u16> {
        self.last_http_status
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

fn post<T: Transport>(
    transport: &mut T,
    last_http_status: &mut Option<u16>,
    url: &str,
    payload: &[u8],
) -> Result<()> {
    match transport.send(url, payload) {
        Ok(response) => {
            *last_http_status = Some(response.status);
            if response.is_success() {
                Ok(())
            } else {
                let message = if response.body.is_empty() {
                    "collector rejected payload".to_string()
                } else {
                    response.body
                };
                Err(TelemetryError::TransportFailure {
                    status: Some(response.status),
                    message,
                })
            }
        }
        Err(e) => {
            *last_http_status = e.http_status();
            Err(e)
        }
    }
}
