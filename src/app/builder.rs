//! Construction of [`Telemetry`] from configuration and injected services.

use opentelemetry::trace::TraceId;

use crate::domain::error::Result;
use crate::domain::IdGenerator;
use crate::export::{Exporter, PayloadSerializer, Transport};
use crate::infrastructure::{Clock, EntropySource, OsEntropy, SystemClock};
use crate::observability::{Logger, TracingLogger};
use crate::storage::{CapacityPolicy, MetricBuffer, SpanStore};
use crate::Config;

use super::telemetry::Telemetry;

/// Builder for [`Telemetry`].
///
/// Defaults to the system clock, OS entropy, the `tracing` logger and the
/// standard capacity policy. Tests and replay tooling swap these out.
///
/// # Example
///
/// ```rust
/// use otel_edge::export::{Transport, TransportResponse};
/// use otel_edge::infrastructure::{FixedEntropy, ManualClock};
/// use otel_edge::observability::NoopLogger;
/// use otel_edge::{Config, Telemetry};
///
/// struct Reject;
///
/// impl Transport for Reject {
///     fn send(&mut self, _: &str, _: &[u8]) -> otel_edge::Result<TransportResponse> {
///         Ok(TransportResponse { status: 503, body: "busy".to_string() })
///     }
/// }
///
/// let mut telemetry = Telemetry::builder(Config::default())
///     .clock(ManualClock::with_step(1_000, 10))
///     .entropy(FixedEntropy::new(7))
///     .logger(NoopLogger)
///     .build(Reject)?;
///
/// telemetry.add_metric("battery", 3.7)?;
/// assert!(telemetry.export_metrics().is_err());
/// assert_eq!(telemetry.metric_count(), 1);
/// assert_eq!(telemetry.last_http_status(), Some(503));
/// # Ok::<(), otel_edge::TelemetryError>(())
/// ```
pub struct TelemetryBuilder {
    config: Config,
    clock: Option<Box<dyn Clock>>,
    entropy: Option<Box<dyn EntropySource>>,
    logger: Option<Box<dyn Logger>>,
    capacity: CapacityPolicy,
}

impl TelemetryBuilder {
    /// Starts from `config` with default services.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: None,
            entropy: None,
            logger: None,
            capacity: CapacityPolicy::default(),
        }
    }

    /// Uses `clock` for every timestamp.
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Seeds identifier generation from `entropy`.
    #[must_use]
    pub fn entropy(mut self, entropy: impl EntropySource + 'static) -> Self {
        self.entropy = Some(Box::new(entropy));
        self
    }

    /// Routes diagnostics to `logger`.
    #[must_use]
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }

    /// Replaces the capacity relief thresholds.
    #[must_use]
    pub fn capacity_policy(mut self, policy: CapacityPolicy) -> Self {
        self.capacity = policy;
        self
    }

    /// Validates the configuration and builds the facade around `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TelemetryError::Config`] if the configuration is
    /// invalid.
    pub fn build<T: Transport>(self, transport: T) -> Result<Telemetry<T>> {
        let config = self.config;
        config.validate()?;

        let metrics_url = config.metrics_url();
        let traces_url = config.traces_url();
        tracing::debug!(
            service = %config.service_name,
            metrics_url = metrics_url.as_deref().unwrap_or("-"),
            traces_url = traces_url.as_deref().unwrap_or("-"),
            max_metrics = config.limits.max_metrics,
            max_spans = config.limits.max_spans,
            "telemetry engine configured"
        );

        let serializer = PayloadSerializer::new(config.resource(), config.serializer_limits());
        Ok(Telemetry {
            metrics: MetricBuffer::new(config.limits.max_metrics, config.limits.max_name_len),
            spans: SpanStore::new(config.span_limits()),
            ids: IdGenerator::new(self.entropy.unwrap_or_else(|| Box::new(OsEntropy))),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            logger: self.logger.unwrap_or_else(|| Box::new(TracingLogger)),
            exporter: Exporter::new(serializer, transport, metrics_url, traces_url),
            capacity: self.capacity,
            trace_id: TraceId::INVALID,
            last_error: None,
            last_cleanup: None,
        })
    }

    /// Builds the facade around a blocking HTTP transport using the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TelemetryError::Config`] for an invalid configuration
    /// or [`crate::TelemetryError::TransportFailure`] if the HTTP client
    /// cannot be created.
    #[cfg(feature = "http")]
    pub fn build_http(self) -> Result<Telemetry<crate::export::HttpTransport>> {
        let transport = crate::export::HttpTransport::new(self.config.http_timeout())?;
        self.build(transport)
    }
}

impl std::fmt::Debug for TelemetryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBuilder")
            .field("config", &self.config)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
