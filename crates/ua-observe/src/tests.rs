//! Unit tests for the diagnostic event layer.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ua_types::{ServiceResultError, StatusCode, TraceMask, TraceMaskHandle};

use crate::error::ObserveError;
use crate::event::{
    EventId, EventLevel, EventPayload, EventRecord, Keywords, PayloadShape, CATALOG,
};
use crate::gate::ListenerFilter;
use crate::sink::{EventSink, FilteredSink, MemorySink};
use crate::source::{install, EventSource};
use crate::translate::{ClassifiedError, DiagnosticError, ErrorRenderer, TraceForwarder};
use crate::{load_config, DiagnosticsConfig};

/// Display argument that counts how often it was rendered.
struct CountingArg(Arc<AtomicUsize>);

impl Display for CountingArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fetch_add(1, Ordering::SeqCst);
        f.write_str("counted")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("bar")]
struct Foo;

impl DiagnosticError for Foo {
    fn kind_name(&self) -> &'static str {
        "Foo"
    }
}

struct FixedRenderer;

impl ErrorRenderer for FixedRenderer {
    fn long_description(&self, error: &dyn DiagnosticError) -> String {
        format!("long form of {}", error.kind_name())
    }
}

/// Forwarder stub recording every call.
#[derive(Default)]
struct RecordingForwarder {
    enabled: bool,
    fail: bool,
    calls: Mutex<Vec<(Option<&'static str>, TraceMask, String)>>,
}

impl RecordingForwarder {
    fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

impl TraceForwarder for Arc<RecordingForwarder> {
    fn is_enabled(&self, _mask: TraceMask) -> bool {
        self.enabled
    }

    fn trace(
        &self,
        error: Option<&dyn DiagnosticError>,
        mask: TraceMask,
        message: &str,
        _include_timestamp: bool,
        _extra: Option<&str>,
    ) -> Result<(), ObserveError> {
        self.calls
            .lock()
            .expect("forwarder lock")
            .push((error.map(|e| e.kind_name()), mask, message.to_string()));
        if self.fail {
            return Err(ObserveError::Sink("forwarder offline".to_string()));
        }
        Ok(())
    }
}

/// Source over a memory sink with a silent forwarder and no detail bit.
fn memory_source() -> (EventSource, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let source = EventSource::builder()
        .sink(sink.clone())
        .forwarder(Arc::new(RecordingForwarder::default()))
        .trace_mask(TraceMaskHandle::new(TraceMask::NONE))
        .build();
    (source, sink)
}

fn messages(sink: &MemorySink) -> Vec<String> {
    sink.records()
        .iter()
        .map(|r| match &r.payload {
            EventPayload::Message { message } => message.clone(),
            other => panic!("unexpected payload: {other:?}"),
        })
        .collect()
}

// ── Catalog ──────────────────────────────────────────────────────────

#[test]
fn catalog_ids_are_unique_and_stable() {
    let ids: HashSet<u16> = CATALOG.iter().map(|d| d.id.as_u16()).collect();
    assert_eq!(ids.len(), CATALOG.len());

    let expected = [
        (EventId::Critical, 1),
        (EventId::Error, 2),
        (EventId::Warning, 3),
        (EventId::Trace, 4),
        (EventId::Debug, 5),
        (EventId::Exception, 6),
        (EventId::Security, 7),
        (EventId::ServiceResultException, 8),
        (EventId::ServiceCall, 9),
        (EventId::ServiceCompleted, 10),
        (EventId::ServiceCompletedBad, 11),
        (EventId::ServiceFault, 12),
        (EventId::ServerCall, 13),
    ];
    for (id, value) in expected {
        assert_eq!(id.as_u16(), value);
        assert_eq!(id.definition().id, id, "catalog slot for {id:?}");
    }
}

#[test]
fn catalog_levels_and_keywords() {
    let exception = EventId::Exception.definition();
    assert_eq!(exception.level, EventLevel::Error);
    assert_eq!(exception.keywords, Keywords::EXCEPTION);
    assert_eq!(exception.message_template, Some("Exception: {0}"));

    let security = EventId::Security.definition();
    assert_eq!(security.level, EventLevel::LogAlways);
    assert_eq!(security.keywords, Keywords::SECURITY);

    let bad = EventId::ServiceCompletedBad.definition();
    assert_eq!(bad.level, EventLevel::Error);
    assert_eq!(bad.shape, PayloadShape::ServiceRequestBad);

    let message_events = [
        EventId::Critical,
        EventId::Error,
        EventId::Warning,
        EventId::Trace,
        EventId::Debug,
    ];
    for id in message_events {
        let def = id.definition();
        assert_eq!(def.keywords, Keywords::TRACE);
        assert_eq!(def.message_template, None);
        assert_eq!(def.shape, PayloadShape::Message);
    }
}

// ── Listener filter ──────────────────────────────────────────────────

#[test]
fn listener_filter_level_and_keyword_rules() {
    let filter = ListenerFilter::new(EventLevel::Warning, Keywords::TRACE | Keywords::SERVICE);

    assert!(filter.is_enabled(EventLevel::Error, Keywords::TRACE));
    assert!(filter.is_enabled(EventLevel::Warning, Keywords::SERVICE));
    assert!(!filter.is_enabled(EventLevel::Informational, Keywords::TRACE));
    assert!(!filter.is_enabled(EventLevel::Error, Keywords::EXCEPTION));
    // LogAlways passes the level check but still needs a keyword match.
    assert!(!filter.is_enabled(EventLevel::LogAlways, Keywords::SECURITY));
    assert!(filter.is_enabled(EventLevel::LogAlways, Keywords::TRACE));

    filter.disable();
    assert!(!filter.is_enabled(EventLevel::Critical, Keywords::TRACE));
}

#[test]
fn listener_filter_empty_keywords_and_log_always_level_mean_all() {
    let filter = ListenerFilter::new(EventLevel::LogAlways, Keywords::NONE);
    assert!(filter.is_enabled(EventLevel::Verbose, Keywords::DIAGNOSTIC));
    assert!(filter.is_enabled(EventLevel::Critical, Keywords::SECURITY));
}

// ── Message events ───────────────────────────────────────────────────

#[test]
fn message_events_write_catalog_records() {
    let (source, sink) = memory_source();

    source.critical("c");
    source.error("e");
    source.warning("w");
    source.trace("t");
    source.security("s");
    source.exception("x");

    let ids: Vec<EventId> = sink.records().iter().map(EventRecord::id).collect();
    assert_eq!(
        ids,
        vec![
            EventId::Critical,
            EventId::Error,
            EventId::Warning,
            EventId::Trace,
            EventId::Security,
            EventId::Exception,
        ]
    );
    assert_eq!(messages(&sink), vec!["c", "e", "w", "t", "s", "x"]);
}

#[test]
fn formatted_events_substitute_arguments() {
    let (source, sink) = memory_source();

    source.warning_fmt("Session {0} expired after {1}s", &[&"s-1", &30]);
    source.security_fmt("Certificate {0} rejected", &[&"CN=test"]);

    assert_eq!(
        messages(&sink),
        vec!["Session s-1 expired after 30s", "Certificate CN=test rejected"]
    );
}

#[test]
fn broken_template_falls_back_to_raw_text() {
    let (source, sink) = memory_source();

    source.error_fmt("Failed on {0} and {1}", &[&"only-one"]);
    source.trace_fmt("unbalanced {0", &[&1]);

    assert_eq!(messages(&sink), vec!["Failed on {0} and {1}", "unbalanced {0"]);
}

#[test]
fn disabled_channel_skips_formatting_and_emission() {
    let sink = Arc::new(MemorySink::with_filter(ListenerFilter::disabled()));
    let source = EventSource::builder()
        .sink(sink.clone())
        .forwarder(Arc::new(RecordingForwarder::default()))
        .build();
    let renders = Arc::new(AtomicUsize::new(0));
    let arg = CountingArg(renders.clone());

    source.critical_fmt("{0}", &[&arg]);
    source.error_fmt("{0}", &[&arg]);
    source.warning_fmt("{0}", &[&arg]);
    source.trace_fmt("{0}", &[&arg]);
    source.security_fmt("{0}", &[&arg]);
    source.exception_from(None, "{0}", &[&arg]);
    source.exception_from(Some(&Foo), "{0}", &[&arg]);
    source.service_call("Read", 1, 0);
    source.service_fault(StatusCode::BAD_TIMEOUT);

    assert_eq!(renders.load(Ordering::SeqCst), 0, "no argument was formatted");
    assert_eq!(sink.write_calls(), 0, "no event reached the sink");
    assert!(sink.enabled_checks() >= 9, "every operation consulted the gate");
    assert!(sink.records().is_empty());
}

#[test]
fn gate_is_re_evaluated_on_every_call() {
    let filter = Arc::new(ListenerFilter::disabled());
    let sink = Arc::new(FilteredSink::new(MemorySink::new(), filter.clone()));
    let source = EventSource::builder()
        .sink(sink.clone())
        .forwarder(Arc::new(RecordingForwarder::default()))
        .build();

    source.warning("before attach");
    filter.enable(EventLevel::Warning, Keywords::TRACE);
    source.warning("attached");
    source.trace("too verbose");
    source.service_call("Read", 1, 0);
    source.security("wrong keyword");
    filter.disable();
    source.warning("after detach");

    assert_eq!(messages(sink.inner()), vec!["attached"]);
}

#[test]
fn debug_event_follows_build_configuration() {
    let (source, sink) = memory_source();

    source.debug("x");
    source.debug_fmt("value {0}", &[&7]);

    if cfg!(debug_assertions) {
        assert_eq!(messages(&sink), vec!["x", "value 7"]);
        assert!(sink.records().iter().all(|r| r.id() == EventId::Debug));
    } else {
        assert_eq!(sink.enabled_checks(), 0);
        assert_eq!(sink.write_calls(), 0);
    }
}

// ── Templated events ─────────────────────────────────────────────────

#[test]
fn service_events_carry_typed_payloads() {
    let (source, sink) = memory_source();

    source.service_call("Read", 7, 2);
    source.service_completed("Read", 7, 1);
    source.service_completed_bad("Write", 9, StatusCode::BAD_NODE_ID_UNKNOWN, 0);
    source.service_fault(StatusCode::BAD_TIMEOUT);
    source.server_call("ActivateSession", 12);
    source.service_result_exception(StatusCode::BAD_SESSION_CLOSED, "closed");

    let records = sink.records();
    assert_eq!(records.len(), 6);
    assert_eq!(
        records[0].payload,
        EventPayload::ServiceRequest {
            service_name: "Read".to_string(),
            request_handle: 7,
            pending_request_count: 2,
        }
    );
    assert_eq!(
        records[2].payload,
        EventPayload::ServiceRequestBad {
            service_name: "Write".to_string(),
            request_handle: 9,
            status_code: 0x8034_0000,
            pending_request_count: 0,
        }
    );
    assert_eq!(records[3].payload, EventPayload::Status { status_code: 0x800A_0000 });
    assert_eq!(
        records[5].payload,
        EventPayload::StatusMessage {
            status_code: 0x8026_0000u32 as i32,
            message: "closed".to_string(),
        }
    );
}

#[test]
fn records_render_their_templates() {
    let (source, sink) = memory_source();

    source.service_call("Read", 7, 2);
    source.service_completed_bad("Write", 9, StatusCode(5), 3);
    source.service_fault(StatusCode(42));
    source.server_call("ActivateSession", 12);
    source.exception("boom");
    source.warning("plain");

    let rendered: Vec<String> = sink.records().iter().map(EventRecord::message).collect();
    assert_eq!(
        rendered,
        vec![
            "Read Called. RequestHandle=7, PendingRequestCount=2",
            "Write Completed. RequestHandle=9, PendingRequestCount=3, StatusCode=5",
            "Service Fault Occured. Reason=42",
            "ActivateSession Validated. ID=12",
            "Exception: boom",
            "plain",
        ]
    );
}

#[test]
fn mismatched_payload_is_dropped() {
    let (source, sink) = memory_source();

    source.write_event(EventId::ServiceFault, EventPayload::Message { message: "x".into() });

    assert_eq!(sink.write_calls(), 0);
}

#[test]
fn payload_serializes_with_shape_tag() {
    let payload = EventPayload::ServerRequest {
        request_type: "Browse".to_string(),
        request_id: 3,
    };
    let json = serde_json::to_value(&payload).expect("payload should serialise");
    assert_eq!(json["shape"], "server_request");
    assert_eq!(json["request_type"], "Browse");
    assert_eq!(json["request_id"], 3);
}

// ── Exception translation ────────────────────────────────────────────

#[test]
fn classify_distinguishes_status_coded_errors() {
    let sre = ServiceResultError::with_message(StatusCode::BAD_TIMEOUT, "no response");
    assert_eq!(
        ClassifiedError::classify(&sre),
        ClassifiedError::StatusCoded {
            code: StatusCode::BAD_TIMEOUT,
            message: "no response".to_string(),
        }
    );
    assert_eq!(
        ClassifiedError::classify(&Foo),
        ClassifiedError::Generic {
            type_name: "Foo",
            message: "bar".to_string(),
        }
    );
}

#[test]
fn status_coded_error_without_detail() {
    let (source, sink) = memory_source();
    let err = ServiceResultError::with_message(StatusCode::BAD_TIMEOUT, "no response");

    source.exception_from(Some(&err), "Request {0} failed", &[&42]);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), EventId::ServiceResultException);
    assert_eq!(
        records[0].payload,
        EventPayload::StatusMessage {
            status_code: 0x800A_0000u32 as i32,
            message: "Request 42 failed\nBadTimeout 'no response'\n".to_string(),
        }
    );
}

#[test]
fn status_coded_error_with_detail_adds_separated_description() {
    let mask = TraceMaskHandle::new(TraceMask::ERROR | TraceMask::STACK_TRACE);
    let sink = Arc::new(MemorySink::new());
    let source = EventSource::builder()
        .sink(sink.clone())
        .renderer(FixedRenderer)
        .trace_mask(mask)
        .forwarder(Arc::new(RecordingForwarder::default()))
        .build();
    let err = ServiceResultError::with_message(StatusCode::BAD_TIMEOUT, "no response");

    source.exception_from(Some(&err), "Request {0} failed", &[&42]);

    let separator = "=".repeat(40);
    let expected = format!(
        "Request 42 failed\nBadTimeout 'no response'\n\n\
         {separator}\nlong form of ServiceResultError\n{separator}\n"
    );
    match &sink.records()[0].payload {
        EventPayload::StatusMessage { message, .. } => assert_eq!(message, &expected),
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn detail_bit_is_read_on_every_call() {
    let (source, sink) = memory_source();

    source.exception_from(Some(&Foo), "first", &[]);
    source.trace_mask().set(TraceMask::STACK_TRACE);
    source.exception_from(Some(&Foo), "second", &[]);

    let msgs = messages(&sink);
    assert_eq!(msgs[0], "first\nFoo 'bar'\n");
    let detail_prefix = format!("second\nFoo 'bar'\n\n{}\n", "=".repeat(40));
    assert!(msgs[1].starts_with(&detail_prefix));
    assert!(msgs[1].contains("Kind: Foo\nMessage: bar"));
    assert!(msgs[1].ends_with("\n========================================\n"));
}

#[test]
fn generic_error_uses_kind_name() {
    let (source, sink) = memory_source();

    source.exception_from(Some(&Foo), "Oops", &[]);

    let records = sink.records();
    assert_eq!(records[0].id(), EventId::Exception);
    assert_eq!(messages(&sink), vec!["Oops\nFoo 'bar'\n"]);
}

#[test]
fn no_error_emits_base_message_only() {
    let (source, sink) = memory_source();
    source.trace_mask().set(TraceMask::ALL);

    source.exception_from(None, "Request {0} failed", &[&42]);

    assert_eq!(sink.records()[0].id(), EventId::Exception);
    assert_eq!(messages(&sink), vec!["Request 42 failed\n"]);
}

#[test]
fn exception_template_failure_keeps_raw_template() {
    let (source, sink) = memory_source();

    source.exception_from(Some(&Foo), "Request {0} failed on {1}", &[&42]);
    source.exception_from(None, "", &[&1]);
    source.exception_from(None, "Pad {0,9223372036854775807}", &[&1]);

    assert_eq!(
        messages(&sink),
        vec![
            "Request {0} failed on {1}\nFoo 'bar'\n",
            "\n",
            "Pad {0,9223372036854775807}\n",
        ]
    );
}

#[test]
fn forwarder_receives_final_message() {
    let forwarder = Arc::new(RecordingForwarder::enabled());
    let sink = Arc::new(MemorySink::new());
    let source = EventSource::builder()
        .sink(sink.clone())
        .forwarder(forwarder.clone())
        .trace_mask(TraceMaskHandle::new(TraceMask::ERROR))
        .build();

    source.exception_from(Some(&Foo), "Oops", &[]);

    let calls = forwarder.calls.lock().expect("forwarder lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], (Some("Foo"), TraceMask::ERROR, "Oops\nFoo 'bar'\n".to_string()));
}

#[test]
fn forwarder_failure_does_not_affect_emission() {
    let forwarder = Arc::new(RecordingForwarder {
        enabled: true,
        fail: true,
        ..RecordingForwarder::default()
    });
    let sink = Arc::new(MemorySink::new());
    let source = EventSource::builder()
        .sink(sink.clone())
        .forwarder(forwarder.clone())
        .build();

    source.exception_from(Some(&Foo), "Oops", &[]);

    assert_eq!(messages(&sink), vec!["Oops\nFoo 'bar'\n"]);
    assert_eq!(forwarder.calls.lock().expect("forwarder lock").len(), 1);
}

#[test]
fn forwarding_continues_while_exception_event_is_disabled() {
    let forwarder = Arc::new(RecordingForwarder::enabled());
    let sink = Arc::new(MemorySink::with_filter(ListenerFilter::new(
        EventLevel::Verbose,
        Keywords::SERVICE,
    )));
    let source = EventSource::builder()
        .sink(sink.clone())
        .forwarder(forwarder.clone())
        .build();

    source.exception_from(Some(&Foo), "Oops", &[]);

    assert_eq!(sink.write_calls(), 0);
    assert_eq!(forwarder.calls.lock().expect("forwarder lock").len(), 1);
}

#[test]
fn observe_error_kinds_are_named() {
    assert_eq!(ObserveError::AlreadyInstalled.kind_name(), "AlreadyInstalled");
    assert_eq!(ObserveError::Sink("x".into()).kind_name(), "SinkError");
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    assert_eq!(DiagnosticError::kind_name(&io), "IoError");
}

// ── Concurrency ──────────────────────────────────────────────────────

#[test]
fn concurrent_callers_share_one_source() {
    let (source, sink) = memory_source();

    std::thread::scope(|scope| {
        for t in 0..8u32 {
            let source = &source;
            scope.spawn(move || {
                for i in 0..100u32 {
                    source.service_call("Read", t * 1000 + i, 0);
                }
            });
        }
    });

    assert_eq!(sink.records().len(), 800);
}

// ── Configuration ────────────────────────────────────────────────────

#[test]
fn config_defaults_when_file_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.toml");

    let config = load_config(path.to_str()).expect("missing file uses defaults");

    assert_eq!(config.listener.level, EventLevel::Verbose);
    assert!(config.listener.enabled);
    assert!(!config.logging.json);
}

#[test]
fn config_file_is_parsed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("diagnostics.toml");
    std::fs::write(
        &path,
        r#"
[logging]
level = "debug"
json = true

[trace]
mask = ["error", "stack_trace"]

[listener]
level = "warning"
keywords = ["trace", "service"]
"#,
    )
    .expect("write config");

    let config = load_config(path.to_str()).expect("config should load");

    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
    assert_eq!(
        config.trace.trace_mask().expect("mask"),
        TraceMask::ERROR | TraceMask::STACK_TRACE
    );
    assert_eq!(config.listener.level, EventLevel::Warning);
    assert_eq!(
        config.listener.keyword_set().expect("keywords"),
        Keywords::TRACE | Keywords::SERVICE
    );

    let source = config.build_source().expect("source");
    assert!(source.trace_mask().contains(TraceMask::STACK_TRACE));
}

#[test]
fn config_rejects_unknown_names() {
    let config: DiagnosticsConfig = toml::from_str(
        r#"
[trace]
mask = ["errors"]

[listener]
keywords = ["telemetry"]
"#,
    )
    .expect("syntactically valid");

    assert!(matches!(
        config.trace.trace_mask(),
        Err(ObserveError::ConfigValue { key: "trace.mask", .. })
    ));
    assert!(matches!(
        config.listener.keyword_set(),
        Err(ObserveError::ConfigValue { key: "listener.keywords", .. })
    ));
}

#[test]
fn config_parse_error_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[logging\nlevel = ").expect("write config");

    assert!(matches!(
        load_config(path.to_str()),
        Err(ObserveError::ConfigParse(_))
    ));
}

#[test]
fn disabled_listener_config_filters_everything() {
    let config: DiagnosticsConfig =
        toml::from_str("[listener]\nenabled = false\n").expect("config should parse");
    let filter = config.listener.filter().expect("filter");
    assert!(!filter.is_enabled(EventLevel::Critical, Keywords::TRACE));
}

// ── Process-wide instance ────────────────────────────────────────────

#[test]
fn install_only_once() {
    let sink = Arc::new(MemorySink::new());
    // Nothing else in this test binary touches the global source.
    let installed = install(EventSource::new(sink.clone())).expect("first install succeeds");
    installed.warning("via global");
    assert_eq!(messages(&sink), vec!["via global"]);

    assert!(matches!(
        install(EventSource::new(MemorySink::new())),
        Err(ObserveError::AlreadyInstalled)
    ));
    assert!(sink.is_enabled(EventLevel::Warning, Keywords::TRACE));
}
