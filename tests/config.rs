mod common;

use std::io::Write;

use common::ScriptedTransport;
use otel_edge::{Config, Telemetry, TelemetryError};
use tempfile::NamedTempFile;

const DEVICE_CONFIG: &str = r#"
service_name = "greenhouse-node"
service_version = "2.1.0"
wifi_ssid = "greenhouse"
scope_name = "greenhouse-firmware"
trace_level = "otel_edge=debug"

[endpoint]
host = "192.168.1.20"
port = 4319
traces_url = "http://traces.local:4318/v1/traces"

[limits]
max_metrics = 8
max_spans = 20
max_span_attributes = 6
encode_buffer_size = 2048

[export]
http_timeout_ms = 2500
send_interval_ms = 60000
"#;

#[test]
fn loads_device_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(DEVICE_CONFIG.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.service_name, "greenhouse-node");
    assert_eq!(config.wifi_ssid.as_deref(), Some("greenhouse"));
    assert_eq!(config.trace_level.as_deref(), Some("otel_edge=debug"));
    assert_eq!(
        config.metrics_url().as_deref(),
        Some("http://192.168.1.20:4319/v1/metrics")
    );
    assert_eq!(
        config.traces_url().as_deref(),
        Some("http://traces.local:4318/v1/traces")
    );
    assert_eq!(config.limits.max_spans, 20);
    // Unset keys keep their defaults.
    assert_eq!(config.limits.max_spans_per_batch, 15);
    assert_eq!(config.export.sample_interval_ms, 5_000);
    assert_eq!(config.http_timeout().as_millis(), 2_500);
}

#[test]
fn loaded_limits_shape_the_engine() {
    let config = Config::from_toml_str(DEVICE_CONFIG).unwrap();
    let mut telemetry = Telemetry::builder(config)
        .build(ScriptedTransport::accepting())
        .unwrap();

    for i in 0..8 {
        telemetry.add_metric(&format!("m{i}"), 1.0).unwrap();
    }
    assert!(matches!(
        telemetry.add_metric("m8", 1.0),
        Err(TelemetryError::CapacityExceeded { capacity: 8, .. })
    ));

    let span = telemetry.start_span("read").unwrap();
    for i in 0..6 {
        telemetry.add_attribute(span, &format!("k{i}"), 1.0).unwrap();
    }
    assert!(telemetry.add_attribute(span, "k6", 1.0).is_err());
    assert_eq!(telemetry.spans().capacity(), 20);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, TelemetryError::Io(_)));
}

#[test]
fn malformed_file_is_a_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"service_name = [unterminated").unwrap();
    let err = Config::from_file(file.path()).unwrap_err();
    assert!(matches!(err, TelemetryError::Config(_)));
}

#[test]
fn builder_rejects_invalid_configuration() {
    let mut config = Config::default();
    config.limits.min_spans_per_batch = 20;
    let err = Telemetry::builder(config)
        .build(ScriptedTransport::accepting())
        .unwrap_err();
    assert!(err.to_string().contains("min_spans_per_batch"));
}
