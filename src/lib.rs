//! otel-edge: bounded telemetry buffering and OTLP/HTTP export for constrained devices.
//!
//! otel-edge collects metric samples and trace spans on a device with a fixed
//! memory budget and ships them to an OpenTelemetry collector:
//! - Fixed-capacity metric and span storage that never grows past its bound
//! - Span lifecycle tracking with parent/child linkage and per-span attributes
//! - OTLP JSON rendering into a single fixed-size encoding buffer
//! - Density-aware span batching with shrink-and-retry on overflow
//! - Threshold-driven capacity relief (export, evict, force-close leaked spans)

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! The crate follows a layered architecture pattern:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Device agent (main.rs)                             │  ← Entry point
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │  ← Telemetry facade
//! │  - Metric and span pass-throughs                    │
//! │  - Capacity relief and export orchestration         │
//! │  - Last-error tracking, diagnostics                 │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Storage Layer │   │ Export Layer  │   │ Observability │
//! │ (storage/)    │   │ (export/)     │   │ (observ...)   │
//! │ - Metrics     │   │ - OTLP JSON   │   │ - Logger sink │
//! │ - Span arena  │   │ - Batching    │   │ - Subscriber  │
//! │ - Relief      │   │ - Transport   │   │               │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!         │                    │
//! ┌─────────────────────────────────────────────────────┐
//! │  Infrastructure & Domain Layers                     │
//! │  - Clock and entropy seams (infrastructure/)        │
//! │  - Error types (domain/error)                       │
//! │  - Metric, span and id models (domain/)             │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: Telemetry facade and its builder
//! - [`domain`]: Core domain types (samples, spans, ids, errors)
//! - [`infrastructure`]: Clock and entropy sources
//! - [`storage`]: Fixed-capacity metric buffer and span store
//! - [`export`]: Payload rendering, batching and transport
//! - [`observability`]: Diagnostic logger and tracing subscriber setup
//!
//! # Configuration
//!
//! The engine is configured from TOML. Every key is optional:
//!
//! ```toml
//! service_name = "greenhouse-node"
//! service_version = "1.4.2"
//! wifi_ssid = "greenhouse"
//! trace_level = "info"
//!
//! [endpoint]
//! host = "collector.local"
//! port = 4318
//!
//! [limits]
//! max_metrics = 15
//! max_spans = 50
//!
//! [export]
//! http_timeout_ms = 10000
//! send_interval_ms = 30000
//! ```
//!
//! # Examples
//!
//! ```rust
//! use otel_edge::export::{Transport, TransportResponse};
//! use otel_edge::{Config, Telemetry};
//!
//! struct Accept;
//!
//! impl Transport for Accept {
//!     fn send(&mut self, _endpoint: &str, _payload: &[u8]) -> otel_edge::Result<TransportResponse> {
//!         Ok(TransportResponse { status: 200, body: String::new() })
//!     }
//! }
//!
//! let mut telemetry = Telemetry::builder(Config::default()).build(Accept)?;
//!
//! telemetry.add_metric("temperature", 21.5)?;
//! telemetry.start_new_trace();
//! let cycle = telemetry.start_span("sensor_cycle")?;
//! let read = telemetry.start_child_span("read_sensors", cycle)?;
//! telemetry.add_attribute(read, "sensor", "bme280")?;
//! telemetry.end_span(read)?;
//! telemetry.end_span(cycle)?;
//!
//! let report = telemetry.export_all();
//! assert!(report.is_success());
//! assert_eq!(telemetry.span_stats().total, 0);
//! # Ok::<(), otel_edge::TelemetryError>(())
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

pub mod app;
pub mod domain;
pub mod export;
pub mod infrastructure;
pub mod observability;
pub mod storage;

pub use app::{AttributeSummary, FlushReport, Telemetry, TelemetryBuilder};
pub use domain::{AttributeValue, Result, SpanState, TelemetryError};
pub use opentelemetry::trace::{SpanId, TraceId};
pub use storage::SpanStats;

use export::{Resource, SerializerLimits};
use storage::SpanLimits;

/// Engine configuration.
///
/// Loaded from TOML with [`Config::from_toml_str`] or [`Config::from_file`].
/// Missing keys take their defaults; unknown keys are rejected.
///
/// # Example
///
/// ```rust
/// use otel_edge::Config;
///
/// let config = Config::from_toml_str(r#"
///     service_name = "greenhouse-node"
///
///     [endpoint]
///     host = "10.0.0.5"
/// "#)?;
///
/// assert_eq!(config.metrics_url().as_deref(), Some("http://10.0.0.5:4318/v1/metrics"));
/// assert_eq!(config.traces_url().as_deref(), Some("http://10.0.0.5:4318/v1/traces"));
/// # Ok::<(), otel_edge::TelemetryError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `service.name` resource attribute.
    pub service_name: String,

    /// `service.version` resource attribute.
    pub service_version: String,

    /// Network name reported as the `wifi.ssid` resource attribute.
    ///
    /// The attribute is omitted when unset.
    pub wifi_ssid: Option<String>,

    /// Instrumentation scope name on trace payloads.
    pub scope_name: String,

    /// Tracing filter directive for the crate's own diagnostics (e.g.
    /// `"debug"` or `"otel_edge=trace"`).
    pub trace_level: Option<String>,

    /// Collector endpoints.
    pub endpoint: EndpointConfig,

    /// Storage capacities and encoding limits.
    pub limits: LimitsConfig,

    /// Export timing.
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "otel-edge".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            wifi_ssid: None,
            scope_name: "otel-edge".to_string(),
            trace_level: None,
            endpoint: EndpointConfig::default(),
            limits: LimitsConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// Collector endpoint configuration.
///
/// Endpoint URLs are assembled as `{protocol}://{host}:{port}{path}` unless an
/// explicit URL override is given. The traces endpoint falls back to the
/// metrics endpoint when neither a traces path nor a traces URL resolves.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    /// URL scheme.
    pub protocol: String,
    /// Collector host. An empty host leaves both endpoints unconfigured.
    pub host: String,
    /// Collector port.
    pub port: u16,
    /// Path of the OTLP/HTTP metrics receiver.
    pub metrics_path: String,
    /// Path of the OTLP/HTTP traces receiver. Empty means "use the metrics
    /// endpoint".
    pub traces_path: String,
    /// Full metrics URL, overriding host/port/path.
    pub metrics_url: Option<String>,
    /// Full traces URL, overriding host/port/path.
    pub traces_url: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 4318,
            metrics_path: "/v1/metrics".to_string(),
            traces_path: "/v1/traces".to_string(),
            metrics_url: None,
            traces_url: None,
        }
    }
}

/// Capacities and encoding heuristics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Metric buffer capacity.
    pub max_metrics: usize,
    /// Span store capacity.
    pub max_spans: usize,
    /// Hard cap on spans per export batch.
    pub max_spans_per_batch: usize,
    /// Attribute capacity of each span.
    pub max_span_attributes: usize,
    /// Maximum metric name, span name and attribute key length in bytes.
    pub max_name_len: usize,
    /// Maximum string attribute value length in bytes.
    pub max_value_len: usize,
    /// Encoding buffer size in bytes.
    pub encode_buffer_size: usize,
    /// Bytes reserved for the document skeleton when planning span batches.
    pub fixed_overhead_bytes: usize,
    /// Estimated encoded size of one attribute.
    pub attribute_cost_bytes: usize,
    /// Average attributes per span above which span batches shrink.
    pub density_threshold: f64,
    /// Smallest density-reduced span batch.
    pub min_spans_per_batch: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_metrics: 15,
            max_spans: 50,
            max_spans_per_batch: 15,
            max_span_attributes: 10,
            max_name_len: 31,
            max_value_len: 63,
            encode_buffer_size: 4096,
            fixed_overhead_bytes: 1000,
            attribute_cost_bytes: 100,
            density_threshold: 15.0,
            min_spans_per_batch: 3,
        }
    }
}

/// Export timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Per-request HTTP timeout.
    pub http_timeout_ms: u64,
    /// Interval between periodic exports in the device agent.
    pub send_interval_ms: u64,
    /// Interval between sensor cycles in the device agent.
    pub sample_interval_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            http_timeout_ms: 10_000,
            send_interval_ms: 30_000,
            sample_interval_ms: 5_000,
        }
    }
}

/// Smallest encoding buffer that can hold a document skeleton plus one item.
const MIN_ENCODE_BUFFER: usize = 512;

impl Config {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Config`] on malformed TOML, unknown keys or
    /// values rejected by [`Config::validate`].
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| TelemetryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_toml_str`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Self::from_toml_str(&contents)
    }

    /// Checks that every capacity is usable.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        let nonzero = [
            ("limits.max_metrics", limits.max_metrics),
            ("limits.max_spans", limits.max_spans),
            ("limits.max_spans_per_batch", limits.max_spans_per_batch),
            ("limits.max_span_attributes", limits.max_span_attributes),
            ("limits.max_name_len", limits.max_name_len),
            ("limits.max_value_len", limits.max_value_len),
            ("limits.attribute_cost_bytes", limits.attribute_cost_bytes),
            ("limits.min_spans_per_batch", limits.min_spans_per_batch),
        ];
        if let Some((key, _)) = nonzero.iter().find(|(_, value)| *value == 0) {
            return Err(TelemetryError::Config(format!("{key} must be greater than zero")));
        }
        if limits.encode_buffer_size < MIN_ENCODE_BUFFER {
            return Err(TelemetryError::Config(format!(
                "limits.encode_buffer_size must be at least {MIN_ENCODE_BUFFER} bytes"
            )));
        }
        if limits.min_spans_per_batch > limits.max_spans_per_batch {
            return Err(TelemetryError::Config(
                "limits.min_spans_per_batch exceeds limits.max_spans_per_batch".to_string(),
            ));
        }
        if !limits.density_threshold.is_finite() || limits.density_threshold < 0.0 {
            return Err(TelemetryError::Config(
                "limits.density_threshold must be a non-negative number".to_string(),
            ));
        }
        if self.export.http_timeout_ms == 0 {
            return Err(TelemetryError::Config(
                "export.http_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Metrics endpoint URL, `None` when neither an override nor a host is
    /// configured.
    #[must_use]
    pub fn metrics_url(&self) -> Option<String> {
        let endpoint = &self.endpoint;
        endpoint
            .metrics_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| endpoint.assemble(&endpoint.metrics_path))
    }

    /// Traces endpoint URL, falling back to the metrics endpoint.
    #[must_use]
    pub fn traces_url(&self) -> Option<String> {
        let endpoint = &self.endpoint;
        endpoint
            .traces_url
            .clone()
            .filter(|url| !url.is_empty())
            .or_else(|| {
                (!endpoint.traces_path.is_empty())
                    .then(|| endpoint.assemble(&endpoint.traces_path))
                    .flatten()
            })
            .or_else(|| self.metrics_url())
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.export.http_timeout_ms)
    }

    /// Span store limits.
    #[must_use]
    pub const fn span_limits(&self) -> SpanLimits {
        SpanLimits {
            capacity: self.limits.max_spans,
            max_attributes: self.limits.max_span_attributes,
            max_name_len: self.limits.max_name_len,
            max_value_len: self.limits.max_value_len,
        }
    }

    /// Encoding buffer and span batch limits.
    #[must_use]
    pub const fn serializer_limits(&self) -> SerializerLimits {
        SerializerLimits {
            buffer_size: self.limits.encode_buffer_size,
            max_spans_per_batch: self.limits.max_spans_per_batch,
            min_spans_per_batch: self.limits.min_spans_per_batch,
            fixed_overhead_bytes: self.limits.fixed_overhead_bytes,
            attribute_cost_bytes: self.limits.attribute_cost_bytes,
            density_threshold: self.limits.density_threshold,
        }
    }

    /// Resource metadata for payloads.
    #[must_use]
    pub fn resource(&self) -> Resource {
        Resource {
            service_name: self.service_name.clone(),
            service_version: self.service_version.clone(),
            wifi_ssid: self.wifi_ssid.clone().filter(|ssid| !ssid.is_empty()),
            scope_name: self.scope_name.clone(),
        }
    }
}

impl EndpointConfig {
    fn assemble(&self, path: &str) -> Option<String> {
        if self.host.is_empty() {
            return None;
        }
        Some(format!("{}://{}:{}{}", self.protocol, self.host, self.port, path))
    }
}
