//! Device agent and entry point.
//!
//! This binary runs the loop a sensor node runs: sample, record, and
//! periodically ship everything to the collector. Sensor readings are
//! synthetic; everything else is the production engine over blocking HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  agent loop (this file)      │
//! │  every sample interval:      │
//! │    sensor_cycle ─┐           │  ← root span, new trace
//! │                  └ read_sensors  ← child span + attributes + metrics
//! │  every send interval:        │
//! │    export_all                │  ← metrics, then traces
//! └──────────────────────────────┘
//!               │ HTTP POST (OTLP JSON)
//!               ▼
//!        OpenTelemetry collector
//! ```
//!
//! # Usage
//!
//! ```text
//! otel-edge-agent [config.toml]
//! ```
//!
//! Without a path the built-in defaults are used (collector on
//! `localhost:4318`).

use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use otel_edge::export::Transport;
use otel_edge::observability::init_tracing;
use otel_edge::{Config, Result, Telemetry};
use rand::Rng;

/// One synthetic environmental reading.
struct Reading {
    temperature_c: f64,
    humidity_pct: f64,
    rssi_dbm: f64,
}

impl Reading {
    fn sample(cycle: u64, rng: &mut impl Rng) -> Self {
        // Slow sawtooth drift plus sensor noise.
        #[allow(clippy::cast_precision_loss)]
        let drift = (cycle % 20) as f64 * 0.1;
        Self {
            temperature_c: 21.0 + drift + rng.gen_range(-0.2..0.2),
            humidity_pct: 45.0 - drift + rng.gen_range(-1.0..1.0),
            rssi_dbm: -60.0 + rng.gen_range(-8.0..8.0),
        }
    }
}

fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => match Config::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("otel-edge-agent: cannot load {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    init_tracing(&config);

    let mut telemetry = match Telemetry::builder(config.clone()).build_http() {
        Ok(telemetry) => telemetry,
        Err(e) => {
            tracing::error!(error = %e, "failed to start telemetry engine");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        service = %config.service_name,
        metrics = telemetry.has_metrics_endpoint(),
        traces = telemetry.has_traces_endpoint(),
        "agent started"
    );
    run(&mut telemetry, &config)
}

fn run<T: Transport>(telemetry: &mut Telemetry<T>, config: &Config) -> ExitCode {
    let sample_interval = Duration::from_millis(config.export.sample_interval_ms);
    let send_interval = Duration::from_millis(config.export.send_interval_ms);
    let mut rng = rand::thread_rng();
    let mut last_send = Instant::now();
    let mut cycle: u64 = 0;

    loop {
        if let Err(e) = sensor_cycle(telemetry, cycle, &mut rng) {
            tracing::warn!(cycle, error = %e, "sensor cycle incomplete");
        }

        if last_send.elapsed() >= send_interval {
            let report = telemetry.export_all();
            match (&report.metrics, &report.traces) {
                (Ok(metrics), Ok(spans)) => {
                    tracing::info!(metrics, spans, "export complete");
                }
                (metrics, traces) => {
                    tracing::warn!(
                        metrics = ?metrics.as_ref().map_err(ToString::to_string),
                        traces = ?traces.as_ref().map_err(ToString::to_string),
                        http_status = ?telemetry.last_http_status(),
                        "export incomplete"
                    );
                }
            }
            telemetry.log_span_summary();
            last_send = Instant::now();
        }

        cycle = cycle.wrapping_add(1);
        thread::sleep(sample_interval);
    }
}

fn sensor_cycle<T: Transport>(
    telemetry: &mut Telemetry<T>,
    cycle: u64,
    rng: &mut impl Rng,
) -> Result<()> {
    telemetry.start_new_trace();
    let root = telemetry.start_span("sensor_cycle")?;
    #[allow(clippy::cast_precision_loss)]
    let cycle_value = cycle as f64;
    telemetry.add_attribute(root, "cycle", cycle_value)?;

    let read = telemetry.start_child_span("read_sensors", root)?;
    let reading = Reading::sample(cycle, rng);
    let captured = telemetry.now_nanos();
    telemetry.add_attribute(read, "sensor", "bme280")?;
    telemetry.add_attribute(read, "temperature_c", reading.temperature_c)?;
    telemetry.add_attribute(read, "humidity_pct", reading.humidity_pct)?;
    telemetry.add_attribute(read, "wifi.rssi_dbm", reading.rssi_dbm)?;
    telemetry.end_span(read)?;
    telemetry.end_span(root)?;

    telemetry.add_metric_at("temperature_c", reading.temperature_c, captured)?;
    telemetry.add_metric_at("humidity_pct", reading.humidity_pct, captured)?;
    tracing::debug!(cycle, trace_id = %telemetry.current_trace_id_hex(), "sensor cycle recorded");
    Ok(())
}
