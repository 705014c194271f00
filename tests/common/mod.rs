#![allow(dead_code)]

use std::collections::VecDeque;

use otel_edge::export::{Transport, TransportResponse};
use otel_edge::infrastructure::{FixedEntropy, ManualClock};
use otel_edge::observability::MemoryLogger;
use otel_edge::{Config, Result, Telemetry, TelemetryError};
use serde_json::Value;

/// 2023-11-14T22:13:20Z
pub const START_NANOS: u64 = 1_700_000_000_000_000_000;

/// Each clock read advances time by this much.
pub const CLOCK_STEP: u64 = 1_000;

/// One payload handed to the transport.
#[derive(Debug, Clone)]
pub struct Sent {
    pub endpoint: String,
    pub bytes: usize,
    pub document: Value,
}

impl Sent {
    /// Spans carried by a traces document.
    pub fn spans(&self) -> Vec<Value> {
        self.document["resourceSpans"][0]["scopeSpans"][0]["spans"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    /// Metrics carried by a metrics document.
    pub fn metrics(&self) -> Vec<Value> {
        self.document["resourceMetrics"][0]["scopeMetrics"][0]["metrics"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }
}

enum Reply {
    Status(u16),
    Unreachable,
}

/// In-memory transport that answers from a script and records every payload.
/// Once the script runs out every send is acknowledged with 200.
#[derive(Default)]
pub struct ScriptedTransport {
    script: VecDeque<Reply>,
    pub sent: Vec<Sent>,
}

impl ScriptedTransport {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn then_status(mut self, status: u16) -> Self {
        self.script.push_back(Reply::Status(status));
        self
    }

    pub fn then_unreachable(mut self) -> Self {
        self.script.push_back(Reply::Unreachable);
        self
    }

    pub fn sent_to(&self, suffix: &str) -> Vec<&Sent> {
        self.sent
            .iter()
            .filter(|sent| sent.endpoint.ends_with(suffix))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, endpoint: &str, payload: &[u8]) -> Result<TransportResponse> {
        let status = match self.script.pop_front() {
            Some(Reply::Unreachable) => {
                return Err(TelemetryError::TransportFailure {
                    status: None,
                    message: "connection refused".to_string(),
                })
            }
            Some(Reply::Status(status)) => status,
            None => 200,
        };

        let document = serde_json::from_slice(payload).expect("payload is valid JSON");
        self.sent.push(Sent {
            endpoint: endpoint.to_string(),
            bytes: payload.len(),
            document,
        });

        Ok(TransportResponse {
            status,
            body: if status >= 300 {
                "collector unavailable".to_string()
            } else {
                String::new()
            },
        })
    }
}

pub fn build(config: Config, transport: ScriptedTransport) -> (Telemetry<ScriptedTransport>, MemoryLogger) {
    let logger = MemoryLogger::default();
    let telemetry = Telemetry::builder(config)
        .clock(ManualClock::with_step(START_NANOS, CLOCK_STEP))
        .entropy(FixedEntropy::new(42))
        .logger(logger.clone())
        .build(transport)
        .expect("valid configuration");
    (telemetry, logger)
}

pub fn accepting() -> (Telemetry<ScriptedTransport>, MemoryLogger) {
    build(Config::default(), ScriptedTransport::accepting())
}

pub fn config(toml: &str) -> Config {
    Config::from_toml_str(toml).expect("valid configuration")
}
