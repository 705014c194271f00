//! OTLP JSON payload rendering into a fixed-size buffer.
//!
//! This module renders metric batches and completed-span batches as OTLP/HTTP
//! JSON documents. Rendering streams straight into the [`EncodeBuffer`]; there
//! is no intermediate `serde_json::Value` tree, so the memory a render needs is
//! the buffer itself and nothing more.
//!
//! # Metrics document
//!
//! ```json
//! {
//!   "resourceMetrics": [{
//!     "resource": {"attributes": [{"key": "service.name", "value": {"stringValue": "sensor-node"}}]},
//!     "scopeMetrics": [{
//!       "metrics": [{
//!         "name": "temperature",
//!         "gauge": {"dataPoints": [{"timeUnixNano": "1700000000000000000", "asDouble": 21.50}]}
//!       }]
//!     }]
//!   }]
//! }
//! ```
//!
//! # Traces document
//!
//! ```json
//! {
//!   "resourceSpans": [{
//!     "resource": {"attributes": [...]},
//!     "scopeSpans": [{
//!       "scope": {"name": "otel-edge"},
//!       "spans": [{
//!         "traceId": "<32 hex>", "spanId": "<16 hex>", "parentSpanId": "<16 hex>",
//!         "name": "read_sensors", "kind": "SPAN_KIND_INTERNAL",
//!         "startTimeUnixNano": "...", "endTimeUnixNano": "...",
//!         "attributes": [{"key": "sensor", "value": {"stringValue": "bme280"}}]
//!       }]
//!     }]
//!   }]
//! }
//! ```

use std::io::{self, Write};

use crate::domain::error::{Result, TelemetryError};
use crate::domain::{AttributeValue, MetricSample, Span};

use super::buffer::EncodeBuffer;

/// Resource metadata stamped on every payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// `service.name` resource attribute.
    pub service_name: String,
    /// `service.version` resource attribute.
    pub service_version: String,
    /// `wifi.ssid` resource attribute, omitted when `None`.
    pub wifi_ssid: Option<String>,
    /// Instrumentation scope name for trace payloads.
    pub scope_name: String,
}

impl Default for Resource {
    fn default() -> Self {
        Self {
            service_name: "otel-edge".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            wifi_ssid: None,
            scope_name: "otel-edge".to_string(),
        }
    }
}

/// Encoding buffer size and span batch heuristics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerializerLimits {
    /// Size of the encoding buffer in bytes.
    pub buffer_size: usize,
    /// Hard cap on spans per batch.
    pub max_spans_per_batch: usize,
    /// Floor for the density-reduced batch size.
    pub min_spans_per_batch: usize,
    /// Bytes reserved for the document skeleton and resource block.
    pub fixed_overhead_bytes: usize,
    /// Estimated rendered size of one attribute.
    pub attribute_cost_bytes: usize,
    /// Average attributes per span above which the density cap applies.
    pub density_threshold: f64,
}

impl Default for SerializerLimits {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            max_spans_per_batch: 15,
            min_spans_per_batch: 3,
            fixed_overhead_bytes: 1000,
            attribute_cost_bytes: 100,
            density_threshold: 15.0,
        }
    }
}

/// Chooses how many of the `completed` spans to put in the next batch.
///
/// The batch is capped at `max_spans_per_batch`. When the average number of
/// attributes per completed span exceeds `density_threshold`, it is further
/// capped at `max(min_spans_per_batch, budget / cost / avg)`, with the budget
/// being the buffer size minus the fixed overhead. The density cap is a
/// conservative estimate only; overflow is still detected during rendering.
#[must_use]
pub fn plan_span_batch(completed: usize, total_attributes: usize, limits: &SerializerLimits) -> usize {
    if completed == 0 {
        return 0;
    }
    let mut batch = completed.min(limits.max_spans_per_batch);

    #[allow(clippy::cast_precision_loss)]
    let average = total_attributes as f64 / completed as f64;
    if average > limits.density_threshold {
        let budget = limits
            .buffer_size
            .saturating_sub(limits.fixed_overhead_bytes);
        let attributes_fit = budget / limits.attribute_cost_bytes.max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let per_span = (average as usize).max(1);
        let density_cap = (attributes_fit / per_span).max(limits.min_spans_per_batch);
        batch = batch.min(density_cap);
    }
    batch
}

/// Renders OTLP JSON payloads into a single reusable buffer.
#[derive(Debug)]
pub struct PayloadSerializer {
    buffer: EncodeBuffer,
    resource: Resource,
    limits: SerializerLimits,
}

impl PayloadSerializer {
    /// Creates a serializer with a zeroed buffer of `limits.buffer_size`
    /// bytes.
    #[must_use]
    pub fn new(resource: Resource, limits: SerializerLimits) -> Self {
        Self {
            buffer: EncodeBuffer::new(limits.buffer_size),
            resource,
            limits,
        }
    }

    /// Renders a metrics document for `samples`.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::NoEligibleData`] when `samples` is empty
    /// - [`TelemetryError::SerializationOverflow`] when the document does not
    ///   fit the buffer; nothing partial is returned
    pub fn render_metrics(&mut self, samples: &[MetricSample]) -> Result<&[u8]> {
        if samples.is_empty() {
            return Err(TelemetryError::NoEligibleData);
        }
        let _span = tracing::debug_span!("render_metrics", count = samples.len()).entered();

        self.buffer.reset();
        let written = write_metrics(&mut self.buffer, &self.resource, samples);
        self.finish(written)
    }

    /// Renders a traces document for `spans`, in the order given.
    ///
    /// # Errors
    ///
    /// - [`TelemetryError::NoEligibleData`] when `spans` is empty
    /// - [`TelemetryError::SerializationOverflow`] when the document does not
    ///   fit the buffer; nothing partial is returned
    pub fn render_spans(&mut self, spans: &[&Span]) -> Result<&[u8]> {
        if spans.is_empty() {
            return Err(TelemetryError::NoEligibleData);
        }
        let _span = tracing::debug_span!("render_spans", count = spans.len()).entered();

        self.buffer.reset();
        let written = write_traces(&mut self.buffer, &self.resource, spans);
        self.finish(written)
    }

    fn finish(&mut self, written: io::Result<()>) -> Result<&[u8]> {
        match written {
            Ok(()) => {
                tracing::debug!(
                    bytes = self.buffer.len(),
                    capacity = self.buffer.capacity(),
                    "payload rendered"
                );
                Ok(self.buffer.as_bytes())
            }
            Err(e) => {
                tracing::debug!(error = %e, capacity = self.buffer.capacity(), "payload overflow");
                self.buffer.reset();
                Err(TelemetryError::SerializationOverflow {
                    capacity: self.buffer.capacity(),
                })
            }
        }
    }

    /// Resource metadata.
    #[must_use]
    pub const fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Configured limits.
    #[must_use]
    pub const fn limits(&self) -> &SerializerLimits {
        &self.limits
    }
}

fn write_metrics(out: &mut EncodeBuffer, resource: &Resource, samples: &[MetricSample]) -> io::Result<()> {
    out.write_all(b"{\"resourceMetrics\":[{\"resource\":")?;
    write_resource(out, resource)?;
    out.write_all(b",\"scopeMetrics\":[{\"metrics\":[")?;
    for (i, sample) in samples.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        out.write_all(b"{\"name\":")?;
        write_str(out, sample.name())?;
        write!(
            out,
            ",\"gauge\":{{\"dataPoints\":[{{\"timeUnixNano\":\"{}\",\"asDouble\":",
            sample.timestamp_nanos()
        )?;
        write_double(out, sample.value())?;
        out.write_all(b"}]}}")?;
    }
    out.write_all(b"]}]}]}")
}

fn write_traces(out: &mut EncodeBuffer, resource: &Resource, spans: &[&Span]) -> io::Result<()> {
    out.write_all(b"{\"resourceSpans\":[{\"resource\":")?;
    write_resource(out, resource)?;
    out.write_all(b",\"scopeSpans\":[{\"scope\":{\"name\":")?;
    write_str(out, &resource.scope_name)?;
    out.write_all(b"},\"spans\":[")?;
    for (i, span) in spans.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        write_span(out, span)?;
    }
    out.write_all(b"]}]}]}")
}

fn write_span(out: &mut EncodeBuffer, span: &Span) -> io::Result<()> {
    write!(
        out,
        "{{\"traceId\":\"{:032x}\",\"spanId\":\"{:016x}\"",
        span.trace_id, span.span_id
    )?;
    if let Some(parent) = span.parent_span_id() {
        write!(out, ",\"parentSpanId\":\"{parent:016x}\"")?;
    }
    out.write_all(b",\"name\":")?;
    write_str(out, &span.name)?;
    write!(
        out,
        ",\"kind\":\"SPAN_KIND_INTERNAL\",\"startTimeUnixNano\":\"{}\",\"endTimeUnixNano\":\"{}\"",
        span.start_time_nanos, span.end_time_nanos
    )?;
    if !span.attributes.is_empty() {
        out.write_all(b",\"attributes\":[")?;
        for (i, attribute) in span.attributes.iter().enumerate() {
            if i > 0 {
                out.write_all(b",")?;
            }
            write_attribute(out, attribute.key(), attribute.value())?;
        }
        out.write_all(b"]")?;
    }
    out.write_all(b"}")
}

fn write_resource(out: &mut EncodeBuffer, resource: &Resource) -> io::Result<()> {
    out.write_all(b"{\"attributes\":[")?;
    let service_name = AttributeValue::String(resource.service_name.clone());
    write_attribute(out, "service.name", &service_name)?;
    out.write_all(b",")?;
    let service_version = AttributeValue::String(resource.service_version.clone());
    write_attribute(out, "service.version", &service_version)?;
    if let Some(ssid) = &resource.wifi_ssid {
        out.write_all(b",")?;
        write_attribute(out, "wifi.ssid", &AttributeValue::String(ssid.clone()))?;
    }
    out.write_all(b"]}")
}

fn write_attribute(out: &mut EncodeBuffer, key: &str, value: &AttributeValue) -> io::Result<()> {
    out.write_all(b"{\"key\":")?;
    write_str(out, key)?;
    match value {
        AttributeValue::String(s) => {
            out.write_all(b",\"value\":{\"stringValue\":")?;
            write_str(out, s)?;
        }
        AttributeValue::Double(d) => {
            out.write_all(b",\"value\":{\"doubleValue\":")?;
            write_double(out, *d)?;
        }
    }
    out.write_all(b"}}")
}

fn write_str(out: &mut EncodeBuffer, value: &str) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value).map_err(io::Error::from)
}

/// Two decimals for finite values. OTLP JSON encodes non-finite doubles as
/// strings.
fn write_double(out: &mut EncodeBuffer, value: f64) -> io::Result<()> {
    if value.is_finite() {
        return write!(out, "{value:.2}");
    }
    let label = if value.is_nan() {
        "\"NaN\""
    } else if value.is_sign_positive() {
        "\"Infinity\""
    } else {
        "\"-Infinity\""
    };
    out.write_all(label.as_bytes())
}
