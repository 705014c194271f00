mod common;

use common::{accepting, build, config, ScriptedTransport, START_NANOS};
use otel_edge::{Config, SpanId, SpanState, TelemetryError, TraceId};

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[test]
fn metric_export_success_empties_buffer() {
    let (mut telemetry, _) = accepting();
    telemetry.add_metric("temperature", 21.5).unwrap();
    telemetry.add_metric("humidity", 40.25).unwrap();

    assert_eq!(telemetry.export_metrics().unwrap(), 2);
    assert_eq!(telemetry.metric_count(), 0);
    assert_eq!(telemetry.last_http_status(), Some(200));

    let sent = telemetry.transport().sent_to("/v1/metrics");
    assert_eq!(sent.len(), 1);
    let metrics = sent[0].metrics();
    assert_eq!(metrics[0]["name"], "temperature");
    assert_eq!(metrics[1]["name"], "humidity");
    let timestamp: u64 = metrics[0]["gauge"]["dataPoints"][0]["timeUnixNano"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(timestamp >= START_NANOS);
}

#[test]
fn metric_export_failure_leaves_buffer_unchanged() {
    let (mut telemetry, _) = build(
        Config::default(),
        ScriptedTransport::accepting().then_status(500).then_unreachable(),
    );
    for name in ["a", "b", "c"] {
        telemetry.add_metric(name, 1.0).unwrap();
    }

    let err = telemetry.export_metrics().unwrap_err();
    assert_eq!(err.http_status(), Some(500));
    assert_eq!(telemetry.metric_count(), 3);
    assert_eq!(telemetry.last_http_status(), Some(500));
    assert!(telemetry.last_error().unwrap().contains("500"));

    let err = telemetry.export_metrics().unwrap_err();
    assert!(matches!(err, TelemetryError::TransportFailure { status: None, .. }));
    assert_eq!(telemetry.metric_count(), 3);
    assert_eq!(telemetry.last_http_status(), None);

    assert_eq!(telemetry.export_metrics().unwrap(), 3);
    assert_eq!(telemetry.metric_count(), 0);
}

#[test]
fn two_slot_metric_buffer_rejects_then_recovers() {
    let (mut telemetry, _) = build(
        config("[limits]\nmax_metrics = 2\n"),
        ScriptedTransport::accepting(),
    );
    let (t1, t2, t3) = (1_600_000_000_000_000_001, 1_600_000_000_000_000_002, 1_600_000_000_000_000_003);
    telemetry.add_metric_at("a", 1.0, t1).unwrap();
    telemetry.add_metric_at("b", 2.0, t2).unwrap();
    let err = telemetry.add_metric_at("c", 3.0, t3).unwrap_err();
    assert!(matches!(err, TelemetryError::CapacityExceeded { capacity: 2, .. }));
    assert!(telemetry.last_error().unwrap().contains("metric buffer"));

    assert_eq!(telemetry.export_metrics().unwrap(), 2);
    assert_eq!(telemetry.metric_count(), 0);
    telemetry.add_metric_at("c", 3.0, t3).unwrap();
    assert_eq!(telemetry.metric_count(), 1);
    telemetry.export_metrics().unwrap();

    // Samples keep the capture time they were recorded with.
    let stamps: Vec<String> = telemetry
        .transport()
        .sent_to("/v1/metrics")
        .iter()
        .flat_map(|s| s.metrics())
        .map(|metric| metric["gauge"]["dataPoints"][0]["timeUnixNano"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(stamps, [t1.to_string(), t2.to_string(), t3.to_string()]);
}

#[test]
fn clear_metrics_discards_samples() {
    let (mut telemetry, _) = accepting();
    telemetry.add_metric("a", 1.0).unwrap();
    telemetry.clear_metrics();
    assert_eq!(telemetry.metric_count(), 0);
    assert_eq!(telemetry.export_metrics().unwrap(), 0);
    assert!(telemetry.transport().sent.is_empty());
}

// ---------------------------------------------------------------------------
// Span lifecycle
// ---------------------------------------------------------------------------

#[test]
fn start_then_end_yields_one_completed_span() {
    let (mut telemetry, _) = accepting();
    let id = telemetry.start_span("read").unwrap();
    telemetry.end_span(id).unwrap();

    let stats = telemetry.span_stats();
    assert_eq!((stats.total, stats.completed, stats.active), (1, 1, 0));
    let span = telemetry.spans().get(id).unwrap();
    assert_eq!(span.state(), SpanState::Completed);
    assert!(span.end_time_nanos().unwrap() > span.start_time_nanos());
}

#[test]
fn second_end_is_rejected_and_end_time_kept() {
    let (mut telemetry, _) = accepting();
    let id = telemetry.start_span("read").unwrap();
    telemetry.end_span(id).unwrap();
    let first_end = telemetry.spans().get(id).unwrap().end_time_nanos();

    let err = telemetry.end_span(id).unwrap_err();
    assert!(matches!(err, TelemetryError::InvalidSpanState { .. }));
    assert_eq!(telemetry.spans().get(id).unwrap().end_time_nanos(), first_end);
    assert!(telemetry.last_error().unwrap().contains("completed"));
}

#[test]
fn eleventh_attribute_is_rejected() {
    let (mut telemetry, _) = accepting();
    let id = telemetry.start_span("read").unwrap();
    for i in 0..10 {
        telemetry
            .add_attribute(id, &format!("key{i}"), f64::from(i))
            .unwrap();
    }
    let err = telemetry.add_attribute(id, "key10", "overflow").unwrap_err();
    assert!(matches!(err, TelemetryError::CapacityExceeded { capacity: 10, .. }));

    let keys: Vec<&str> = telemetry
        .spans()
        .get(id)
        .unwrap()
        .attributes()
        .iter()
        .map(|attribute| attribute.key())
        .collect();
    assert_eq!(keys.len(), 10);
    assert_eq!(keys.first(), Some(&"key0"));
    assert_eq!(keys.last(), Some(&"key9"));
}

#[test]
fn attributes_on_unknown_or_closed_spans_are_rejected() {
    let (mut telemetry, _) = accepting();
    let id = telemetry.start_span("read").unwrap();
    telemetry.end_span(id).unwrap();

    assert!(matches!(
        telemetry.add_attribute(id, "late", 1.0),
        Err(TelemetryError::InvalidSpanState { .. })
    ));
    assert!(matches!(
        telemetry.add_attribute(SpanId::from_bytes([1; 8]), "k", 1.0),
        Err(TelemetryError::InvalidSpanReference(_))
    ));
    assert!(matches!(
        telemetry.end_span(SpanId::INVALID),
        Err(TelemetryError::InvalidSpanReference(_))
    ));
}

#[test]
fn trace_ids_are_copied_at_span_creation() {
    let (mut telemetry, _) = accepting();
    assert_eq!(telemetry.current_trace_id(), TraceId::INVALID);
    assert_eq!(telemetry.current_trace_id_hex(), "no_active_trace");

    let first_trace = telemetry.start_new_trace();
    let a = telemetry.start_span("a").unwrap();
    let second_trace = telemetry.start_new_trace();
    let b = telemetry.start_span("b").unwrap();
    assert_ne!(first_trace, second_trace);
    assert_eq!(telemetry.current_trace_id_hex(), format!("{second_trace:032x}"));

    assert_eq!(telemetry.spans().get(a).unwrap().trace_id(), first_trace);
    assert_eq!(telemetry.spans().get(b).unwrap().trace_id(), second_trace);
}

#[test]
fn first_span_starts_a_trace_implicitly() {
    let (mut telemetry, _) = accepting();
    let id = telemetry.start_span("boot").unwrap();
    let trace = telemetry.current_trace_id();
    assert_ne!(trace, TraceId::INVALID);
    assert_eq!(telemetry.spans().get(id).unwrap().trace_id(), trace);
    assert_eq!(telemetry.current_trace_id_hex().len(), 32);
}

// ---------------------------------------------------------------------------
// Trace export
// ---------------------------------------------------------------------------

#[test]
fn exported_spans_leave_the_store_with_linkage_intact() {
    let (mut telemetry, _) = accepting();
    let trace = telemetry.start_new_trace();
    let root = telemetry.start_span("sensor_cycle").unwrap();
    let child = telemetry.start_child_span("read_sensors", root).unwrap();
    telemetry.add_attribute(child, "sensor", "bme280").unwrap();
    telemetry.add_attribute(child, "temperature_c", 21.5).unwrap();
    // Child completes before its parent.
    telemetry.end_span(child).unwrap();
    telemetry.end_span(root).unwrap();

    assert_eq!(telemetry.export_traces().unwrap(), 2);
    let stats = telemetry.span_stats();
    assert_eq!(stats, otel_edge::SpanStats::default());
    assert!(telemetry.spans().get(root).is_none());
    assert!(telemetry.spans().get(child).is_none());

    let sent = telemetry.transport().sent_to("/v1/traces");
    assert_eq!(sent.len(), 1);
    let spans = sent[0].spans();
    let scope = &sent[0].document["resourceSpans"][0]["scopeSpans"][0]["scope"];
    assert_eq!(scope["name"], "otel-edge");

    // Store order is creation order, not completion order.
    assert_eq!(spans[0]["name"], "sensor_cycle");
    assert_eq!(spans[1]["name"], "read_sensors");
    assert_eq!(spans[0]["spanId"], format!("{root:016x}"));
    assert!(spans[0].get("parentSpanId").is_none());
    assert_eq!(spans[1]["parentSpanId"], format!("{root:016x}"));
    for span in &spans {
        assert_eq!(span["traceId"], format!("{trace:032x}"));
        assert_eq!(span["kind"], "SPAN_KIND_INTERNAL");
    }
    assert_eq!(spans[1]["attributes"][0]["value"]["stringValue"], "bme280");
    assert_eq!(spans[1]["attributes"][1]["value"]["doubleValue"], 21.5);
}

#[test]
fn active_spans_are_never_exported() {
    let (mut telemetry, _) = accepting();
    let open = telemetry.start_span("open").unwrap();
    let done = telemetry.start_span("done").unwrap();
    telemetry.end_span(done).unwrap();

    assert_eq!(telemetry.export_traces().unwrap(), 1);
    assert!(telemetry.spans().get(open).unwrap().is_active());
    assert_eq!(telemetry.export_traces().unwrap(), 0);
    assert_eq!(telemetry.transport().sent.len(), 1);
}

#[test]
fn trace_export_drains_in_capped_batches() {
    let (mut telemetry, _) = build(
        config("[limits]\nmax_spans = 100\n"),
        ScriptedTransport::accepting(),
    );
    for i in 0..40 {
        let id = telemetry.start_span(&format!("s{i}")).unwrap();
        telemetry.end_span(id).unwrap();
    }

    assert_eq!(telemetry.export_traces().unwrap(), 40);
    let sent = telemetry.transport().sent_to("/v1/traces");
    let sizes: Vec<usize> = sent.iter().map(|s| s.spans().len()).collect();
    assert_eq!(sizes, [15, 15, 10]);

    let names: Vec<String> = sent
        .iter()
        .flat_map(|s| s.spans())
        .map(|span| span["name"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..40).map(|i| format!("s{i}")).collect();
    assert_eq!(names, expected);
}

#[test]
fn failed_trace_export_keeps_spans_for_retry() {
    let (mut telemetry, _) = build(Config::default(), ScriptedTransport::accepting().then_status(502));
    let id = telemetry.start_span("read").unwrap();
    telemetry.end_span(id).unwrap();

    assert!(telemetry.export_traces().is_err());
    assert_eq!(telemetry.span_stats().completed, 1);
    assert_eq!(telemetry.last_http_status(), Some(502));

    assert_eq!(telemetry.export_traces().unwrap(), 1);
    assert_eq!(telemetry.span_stats().total, 0);
}

#[test]
fn dense_spans_are_sent_in_small_batches() {
    let (mut telemetry, _) = build(
        config("[limits]\nmax_span_attributes = 20\n"),
        ScriptedTransport::accepting(),
    );
    for i in 0..6 {
        let id = telemetry.start_span(&format!("dense{i}")).unwrap();
        for j in 0..20 {
            telemetry
                .add_attribute(id, &format!("k{j}"), f64::from(j))
                .unwrap();
        }
        telemetry.end_span(id).unwrap();
    }

    assert_eq!(telemetry.export_traces().unwrap(), 6);
    let sizes: Vec<usize> = telemetry
        .transport()
        .sent_to("/v1/traces")
        .iter()
        .map(|s| s.spans().len())
        .collect();
    assert_eq!(sizes, [3, 3]);
}

#[test]
fn oversize_batches_never_exceed_the_encoding_buffer() {
    let (mut telemetry, _) = build(
        config("[limits]\nencode_buffer_size = 512\n"),
        ScriptedTransport::accepting(),
    );
    for i in 0..5 {
        let id = telemetry.start_span(&format!("s{i}")).unwrap();
        telemetry.end_span(id).unwrap();
    }

    assert_eq!(telemetry.export_traces().unwrap(), 5);
    let sent = telemetry.transport().sent_to("/v1/traces");
    assert!(sent.len() > 1);
    assert!(sent.iter().all(|s| s.bytes <= 512));
    assert_eq!(sent.iter().map(|s| s.spans().len()).sum::<usize>(), 5);
}

#[test]
fn span_too_large_for_the_buffer_is_dropped_without_blocking_others() {
    let (mut telemetry, logger) = build(
        config("[limits]\nencode_buffer_size = 512\nmax_value_len = 300\n"),
        ScriptedTransport::accepting(),
    );
    let blob = telemetry.start_span("blob").unwrap();
    telemetry.add_attribute(blob, "payload", "x".repeat(300)).unwrap();
    telemetry.end_span(blob).unwrap();
    let read = telemetry.start_span("read").unwrap();
    telemetry.end_span(read).unwrap();

    assert_eq!(telemetry.export_traces().unwrap(), 1);
    assert_eq!(telemetry.span_stats().total, 0);
    assert!(logger.contains("dropped span 'blob'"));

    let sent = telemetry.transport().sent_to("/v1/traces");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].bytes <= 512);
    assert_eq!(sent[0].spans()[0]["name"], "read");
}

#[test]
fn control_characters_cannot_stall_trace_export() {
    let (mut telemetry, logger) = accepting();
    // Every control character escapes to six bytes, so ten full-length
    // attributes outgrow the default 4096-byte buffer.
    let noisy = telemetry.start_span("noisy").unwrap();
    for i in 0..10 {
        let key = format!("{}{i}", "\u{1}".repeat(30));
        telemetry
            .add_attribute(noisy, &key, "\u{1}".repeat(63))
            .unwrap();
    }
    telemetry.end_span(noisy).unwrap();
    let read = telemetry.start_span("read").unwrap();
    telemetry.end_span(read).unwrap();

    for _ in 0..3 {
        telemetry.export_traces().unwrap();
    }
    let names: Vec<String> = telemetry
        .transport()
        .sent_to("/v1/traces")
        .iter()
        .flat_map(|s| s.spans())
        .map(|span| span["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["read"]);
    assert_eq!(telemetry.span_stats().total, 0);
    assert!(logger.contains("dropped span 'noisy'"));
}

// ---------------------------------------------------------------------------
// Capacity relief
// ---------------------------------------------------------------------------

#[test]
fn relief_exports_before_start_span_can_fail() {
    let (mut telemetry, logger) = accepting();
    for i in 0..37 {
        let id = telemetry.start_span(&format!("s{i}")).unwrap();
        telemetry.end_span(id).unwrap();
    }
    assert!(telemetry.transport().sent.is_empty());

    telemetry.start_span("next").unwrap();

    let exported: usize = telemetry
        .transport()
        .sent_to("/v1/traces")
        .iter()
        .map(|s| s.spans().len())
        .sum();
    assert_eq!(exported, 37);
    let stats = telemetry.span_stats();
    assert_eq!((stats.total, stats.active), (1, 1));
    let cleanup = telemetry.last_cleanup().unwrap();
    assert!(cleanup.triggered);
    assert_eq!(cleanup.evicted, 0);
    assert!(logger.contains("exporting completed spans"));
}

#[test]
fn relief_evicts_when_export_fails() {
    let (mut telemetry, logger) = build(
        Config::default(),
        ScriptedTransport::accepting().then_status(503),
    );
    for i in 0..37 {
        let id = telemetry.start_span(&format!("s{i}")).unwrap();
        telemetry.end_span(id).unwrap();
    }

    telemetry.start_span("next").unwrap();

    assert_eq!(telemetry.span_stats().total, 1);
    assert_eq!(telemetry.last_cleanup().unwrap().evicted, 37);
    assert!(telemetry.last_error().unwrap().contains("503"));
    assert!(logger.contains("evicted 37"));
}

#[test]
fn leaked_active_spans_are_force_closed_and_exported() {
    let (mut telemetry, logger) = accepting();
    let ids: Vec<SpanId> = (0..40)
        .map(|i| telemetry.start_span(&format!("leak{i}")).unwrap())
        .collect();
    assert_eq!(telemetry.span_stats().active, 40);

    telemetry.start_span("fresh").unwrap();

    let stats = telemetry.span_stats();
    assert_eq!((stats.total, stats.active), (26, 26));
    assert_eq!(telemetry.last_cleanup().unwrap().force_closed, 15);
    assert!(telemetry.spans().get(ids[14]).is_none());
    assert!(telemetry.spans().get(ids[15]).unwrap().is_active());

    let names: Vec<String> = telemetry
        .transport()
        .sent_to("/v1/traces")
        .iter()
        .flat_map(|s| s.spans())
        .map(|span| span["name"].as_str().unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..15).map(|i| format!("leak{i}")).collect();
    assert_eq!(names, expected);
    assert!(logger.contains("possible span leak"));
}

// ---------------------------------------------------------------------------
// export_all, endpoints, diagnostics
// ---------------------------------------------------------------------------

#[test]
fn export_all_reports_both_signals_independently() {
    let (mut telemetry, _) = build(
        Config::default(),
        ScriptedTransport::accepting().then_status(500),
    );
    telemetry.add_metric("a", 1.0).unwrap();
    let id = telemetry.start_span("read").unwrap();
    telemetry.end_span(id).unwrap();

    let report = telemetry.export_all();
    assert!(!report.is_success());
    assert!(report.metrics.is_err());
    assert_eq!(report.traces.as_ref().ok(), Some(&1));
    assert_eq!(report.delivered(), 1);
    assert_eq!(telemetry.metric_count(), 1);
    assert_eq!(telemetry.span_stats().total, 0);
}

#[test]
fn export_all_with_nothing_pending_is_a_no_op() {
    let (mut telemetry, _) = accepting();
    let report = telemetry.export_all();
    assert!(report.is_success());
    assert_eq!(report.delivered(), 0);
    assert!(telemetry.transport().sent.is_empty());
    assert_eq!(telemetry.last_error(), None);
}

#[test]
fn endpoints_can_be_set_at_runtime() {
    let (mut telemetry, logger) = build(
        config("[endpoint]\nhost = \"\"\n"),
        ScriptedTransport::accepting(),
    );
    assert!(!telemetry.has_metrics_endpoint());
    assert!(!telemetry.has_traces_endpoint());

    telemetry.add_metric("a", 1.0).unwrap();
    assert!(matches!(
        telemetry.export_metrics(),
        Err(TelemetryError::EndpointUnconfigured("metrics"))
    ));
    assert_eq!(telemetry.metric_count(), 1);

    telemetry.set_metrics_endpoint("");
    assert!(!telemetry.has_metrics_endpoint());
    assert!(logger.contains("ignoring empty metrics endpoint"));

    telemetry.set_metrics_endpoint("http://10.1.1.1:4318/v1/metrics");
    telemetry.set_traces_endpoint("http://10.1.1.1:4318/v1/traces");
    assert!(telemetry.has_metrics_endpoint());
    assert!(telemetry.has_traces_endpoint());

    assert_eq!(telemetry.export_metrics().unwrap(), 1);
    assert_eq!(
        telemetry.transport().sent[0].endpoint,
        "http://10.1.1.1:4318/v1/metrics"
    );
}

#[test]
fn traces_use_metrics_endpoint_when_only_that_is_configured() {
    let (mut telemetry, _) = build(
        config("[endpoint]\nmetrics_url = \"http://gw:9000/otlp\"\ntraces_path = \"\"\n"),
        ScriptedTransport::accepting(),
    );
    let id = telemetry.start_span("read").unwrap();
    telemetry.end_span(id).unwrap();
    telemetry.export_traces().unwrap();
    assert_eq!(telemetry.transport().sent[0].endpoint, "http://gw:9000/otlp");
}

#[test]
fn ssid_is_reported_as_resource_attribute() {
    let (mut telemetry, _) = build(
        config("service_name = \"greenhouse\"\nwifi_ssid = \"barn\"\n"),
        ScriptedTransport::accepting(),
    );
    telemetry.add_metric("a", 1.0).unwrap();
    telemetry.export_metrics().unwrap();

    let attributes = &telemetry.transport().sent[0].document["resourceMetrics"][0]["resource"]["attributes"];
    assert_eq!(attributes[0]["value"]["stringValue"], "greenhouse");
    assert_eq!(attributes[2]["key"], "wifi.ssid");
    assert_eq!(attributes[2]["value"]["stringValue"], "barn");
}

#[test]
fn summaries_report_counts_and_key_frequencies() {
    let (mut telemetry, logger) = accepting();
    let a = telemetry.start_span("a").unwrap();
    let b = telemetry.start_span("b").unwrap();
    telemetry.add_attribute(a, "sensor", "bme280").unwrap();
    telemetry.add_attribute(a, "temperature_c", 20.0).unwrap();
    telemetry.add_attribute(b, "sensor", "sht31").unwrap();
    telemetry.end_span(a).unwrap();

    let stats = telemetry.log_span_summary();
    assert_eq!((stats.total, stats.active, stats.completed), (2, 1, 1));
    assert!(logger.contains("2/50 used"));

    let summary = telemetry.log_attribute_summary();
    assert_eq!(summary.spans, 2);
    assert_eq!(summary.attributes, 3);
    assert!((summary.average_per_span - 1.5).abs() < f64::EPSILON);
    assert_eq!(
        summary.key_counts,
        vec![("sensor".to_string(), 2), ("temperature_c".to_string(), 1)]
    );
    assert!(logger.contains("attributes: 3 across 2 spans"));
}
