//! Request/response transport to the collector.
//!
//! The engine hands a rendered payload to a [`Transport`] and waits for the
//! answer. Connection management and retries belong to the transport (or to
//! the firmware underneath it); the engine only interprets the status code.

use crate::domain::error::Result;
#[cfg(feature = "http")]
use crate::domain::error::TelemetryError;

/// Collector response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, possibly empty.
    pub body: String,
}

impl TransportResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking POST of a JSON payload.
pub trait Transport {
    /// Sends `payload` to `endpoint` and returns the collector's response.
    ///
    /// Any response, including non-2xx ones, is `Ok`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TelemetryError::TransportFailure`] with no status when
    /// the collector could not be reached.
    fn send(&mut self, endpoint: &str, payload: &[u8]) -> Result<TransportResponse>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, endpoint: &str, payload: &[u8]) -> Result<TransportResponse> {
        (**self).send(endpoint, payload)
    }
}

/// HTTP transport over a blocking `reqwest` client.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Builds a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::TransportFailure`] if the client cannot be
    /// constructed.
    pub fn new(timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::TransportFailure {
                status: None,
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn send(&mut self, endpoint: &str, payload: &[u8]) -> Result<TransportResponse> {
        let response = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .map_err(|e| TelemetryError::TransportFailure {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        tracing::debug!(endpoint, status, bytes = payload.len(), "payload posted");
        Ok(TransportResponse { status, body })
    }
}
