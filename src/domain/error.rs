//! Error types for the telemetry engine.
//!
//! This module defines the centralized error type [`TelemetryError`] and a type alias
//! [`Result`] used throughout the crate. None of these errors are fatal: every
//! public operation recovers locally and hands the error back to the caller, and
//! the facade additionally records it as the last error for later inspection.

use opentelemetry::trace::SpanId;
use thiserror::Error;

use super::span::SpanState;

/// The main error type for telemetry buffering and export.
///
/// Variants map one-to-one onto the failure classes a producer can observe:
/// bounded storage filling up, bad span handles, encoding overflow, missing
/// endpoints and transport failures. Configuration and I/O variants only occur
/// while loading a [`crate::Config`].
///
/// # Examples
///
/// ```
/// use otel_edge::TelemetryError;
///
/// let err = TelemetryError::CapacityExceeded { resource: "metric buffer", capacity: 15 };
/// assert_eq!(err.to_string(), "metric buffer is full (capacity 15)");
/// ```
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A bounded buffer or store is full.
    ///
    /// The caller must export (or wait for the periodic export) to make room.
    #[error("{resource} is full (capacity {capacity})")]
    CapacityExceeded {
        /// Which bounded structure rejected the insert.
        resource: &'static str,
        /// Its fixed capacity.
        capacity: usize,
    },

    /// The span id is zero or not held by the span store.
    #[error("unknown span {0:016x}")]
    InvalidSpanReference(SpanId),

    /// The span exists but its lifecycle state forbids the operation.
    ///
    /// Raised for attributes added to, or a second close of, a span that is no
    /// longer active.
    #[error("span {span_id:016x} is {state}, expected active")]
    InvalidSpanState {
        /// The offending span.
        span_id: SpanId,
        /// The state it was found in.
        state: SpanState,
    },

    /// The rendered payload would not fit into the fixed encoding buffer.
    ///
    /// Nothing is ever handed to the transport when this is returned.
    #[error("payload exceeds the {capacity}-byte encoding buffer")]
    SerializationOverflow {
        /// Size of the encoding buffer in bytes.
        capacity: usize,
    },

    /// An export was requested with nothing pending.
    ///
    /// Export operations treat this as success; it is only surfaced by the
    /// serializer.
    #[error("no eligible data to export")]
    NoEligibleData,

    /// No URL is configured for the given signal (`metrics` or `traces`).
    #[error("no {0} endpoint configured")]
    EndpointUnconfigured(&'static str),

    /// The collector answered with a non-2xx status or could not be reached.
    ///
    /// `status` is `None` for connection-level failures.
    #[error("export failed{}: {message}", transport_status(.status))]
    TransportFailure {
        /// HTTP status code when a response was received.
        status: Option<u16>,
        /// Response body or connection error description.
        message: String,
    },

    /// Configuration is invalid or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem or I/O operation failed while loading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelemetryError {
    /// Returns the HTTP status carried by a transport failure, if any.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::TransportFailure { status, .. } => *status,
            _ => None,
        }
    }
}

fn transport_status(status: &Option<u16>) -> String {
    status.map(|code| format!(" with HTTP {code}")).unwrap_or_default()
}

/// A specialized `Result` type for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
