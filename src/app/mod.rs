//! Application layer: the telemetry facade producer code talks to.
//!
//! This module sits between the device firmware (or `main.rs`) and the
//! storage/export layers. It turns the individual bounded stores into one
//! engine with a current trace, automatic capacity relief and last-error state.
//!
//! # Architecture
//!
//! ```text
//! add_metric ─────────────────────────────▶ MetricBuffer ─┐
//! start_span → CapacityPolicy → SpanStore ───────────────┼─▶ Exporter → Transport
//! add_attribute / end_span ──▶ SpanStore ─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`builder`]: Construction with injectable clock, entropy and logger
//! - [`state`]: Export and diagnostic reports
//! - [`telemetry`]: The facade itself
//!
//! # Example
//!
//! ```rust
//! use otel_edge::export::{Transport, TransportResponse};
//! use otel_edge::{Config, Telemetry};
//!
//! struct Accept;
//!
//! impl Transport for Accept {
//!     fn send(&mut self, _: &str, _: &[u8]) -> otel_edge::Result<TransportResponse> {
//!         Ok(TransportResponse { status: 200, body: String::new() })
//!     }
//! }
//!
//! let mut telemetry = Telemetry::builder(Config::default()).build(Accept)?;
//! let span = telemetry.start_span("boot")?;
//! telemetry.end_span(span)?;
//! assert_eq!(telemetry.export_traces()?, 1);
//! # Ok::<(), otel_edge::TelemetryError>(())
//! ```

pub mod builder;
pub mod state;
pub mod telemetry;

pub use builder::TelemetryBuilder;
pub use state::{AttributeSummary, FlushReport};
pub use telemetry::Telemetry;
