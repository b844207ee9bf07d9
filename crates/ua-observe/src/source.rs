//! The event source: public logging operations over one sink.
//!
//! Every operation checks the sink's enablement for its catalog entry
//! before it allocates or formats anything, and none of them return an
//! error. A failing sink or forwarder is reported through `tracing` at
//! debug level and otherwise ignored.

use std::fmt::Display;
use std::sync::OnceLock;

use ua_types::{StatusCode, TraceMask, TraceMaskHandle};

use crate::error::ObserveError;
use crate::event::{EventId, EventLevel, EventPayload, EventRecord, Keywords};
use crate::format::format_or_raw;
use crate::sink::{EventSink, TracingSink};
use crate::translate::{
    BuiltinStatusNames, ChainRenderer, ClassifiedError, DiagnosticError, ErrorRenderer,
    ExceptionTranslator, StatusCodeNames, TraceForwarder, TracingForwarder,
};

/// The diagnostic channel of the stack.
///
/// Cheap to share behind a reference; all methods take `&self` and are
/// safe to call from any number of threads.
pub struct EventSource {
    sink: Box<dyn EventSink>,
    translator: ExceptionTranslator,
    forwarder: Box<dyn TraceForwarder>,
}

impl EventSource {
    /// Creates a source writing to `sink` with default collaborators.
    pub fn new(sink: impl EventSink + 'static) -> Self {
        Self::builder().sink(sink).build()
    }

    /// Starts a builder with every collaborator unset.
    pub fn builder() -> EventSourceBuilder {
        EventSourceBuilder::default()
    }

    /// Returns `true` if an event with this level and keyword set is
    /// currently consumed. Re-evaluated on every call.
    pub fn is_enabled(&self, level: EventLevel, keywords: Keywords) -> bool {
        self.sink.is_enabled(level, keywords)
    }

    /// Returns `true` if the catalog entry for `id` is currently consumed.
    pub fn is_event_enabled(&self, id: EventId) -> bool {
        let definition = id.definition();
        self.is_enabled(definition.level, definition.keywords)
    }

    /// The trace mask consulted for the long error description.
    pub fn trace_mask(&self) -> &TraceMaskHandle {
        self.translator.trace_mask()
    }

    /// Writes one event to the sink.
    ///
    /// The payload must have the shape recorded in the catalog for `id`;
    /// a mismatched payload is dropped. This does not consult the
    /// enablement check, the sink applies its own filtering.
    pub fn write_event(&self, id: EventId, payload: EventPayload) {
        let definition = id.definition();
        if definition.shape != payload.shape() {
            tracing::warn!(
                event_id = id.as_u16(),
                expected = ?definition.shape,
                actual = ?payload.shape(),
                "dropping event with mismatched payload"
            );
            return;
        }

        let record = EventRecord {
            definition,
            payload,
        };
        if let Err(e) = self.sink.write(&record) {
            tracing::debug!(error = %e, event_id = id.as_u16(), "event sink write failed");
        }
    }

    fn message_event(&self, id: EventId, message: &str) {
        if self.is_event_enabled(id) {
            self.write_event(
                id,
                EventPayload::Message {
                    message: message.to_string(),
                },
            );
        }
    }

    fn formatted_event(&self, id: EventId, template: &str, args: &[&dyn Display]) {
        if self.is_event_enabled(id) {
            self.write_event(
                id,
                EventPayload::Message {
                    message: format_or_raw(template, args),
                },
            );
        }
    }

    /// Emits `Critical` (id 1) with a pre-built message.
    pub fn critical(&self, message: &str) {
        self.message_event(EventId::Critical, message);
    }

    /// Emits `Critical` with `template` applied to `args`.
    ///
    /// Nothing is formatted unless the event is enabled. A template that
    /// cannot be applied is emitted verbatim.
    pub fn critical_fmt(&self, template: &str, args: &[&dyn Display]) {
        self.formatted_event(EventId::Critical, template, args);
    }

    /// Emits `Error` (id 2).
    pub fn error(&self, message: &str) {
        self.message_event(EventId::Error, message);
    }

    /// Formatted `Error`; see [`critical_fmt`](Self::critical_fmt).
    pub fn error_fmt(&self, template: &str, args: &[&dyn Display]) {
        self.formatted_event(EventId::Error, template, args);
    }

    /// Emits `Warning` (id 3).
    pub fn warning(&self, message: &str) {
        self.message_event(EventId::Warning, message);
    }

    /// Formatted `Warning`.
    pub fn warning_fmt(&self, template: &str, args: &[&dyn Display]) {
        self.formatted_event(EventId::Warning, template, args);
    }

    /// Emits `Trace` (id 4), generic informational output.
    pub fn trace(&self, message: &str) {
        self.message_event(EventId::Trace, message);
    }

    /// Formatted `Trace`.
    pub fn trace_fmt(&self, template: &str, args: &[&dyn Display]) {
        self.formatted_event(EventId::Trace, template, args);
    }

    /// Debug output. Compiled to nothing without `debug_assertions`.
    #[inline]
    pub fn debug(&self, message: &str) {
        if cfg!(debug_assertions) {
            self.message_event(EventId::Debug, message);
        }
    }

    /// Formatted debug output. Compiled to nothing without `debug_assertions`.
    #[inline]
    pub fn debug_fmt(&self, template: &str, args: &[&dyn Display]) {
        if cfg!(debug_assertions) {
            self.formatted_event(EventId::Debug, template, args);
        }
    }

    /// Emits `Security` (id 7) at `LogAlways`.
    pub fn security(&self, message: &str) {
        self.message_event(EventId::Security, message);
    }

    /// Formatted `Security`.
    pub fn security_fmt(&self, template: &str, args: &[&dyn Display]) {
        self.formatted_event(EventId::Security, template, args);
    }

    /// Emits a pre-built exception message.
    pub fn exception(&self, message: &str) {
        self.message_event(EventId::Exception, message);
    }

    /// Reports an error.
    ///
    /// Builds the message from `template` and `args`, appends the error's
    /// classification line (and the long description when the trace mask
    /// asks for stack traces), then emits `ServiceResultException` for
    /// status-coded errors or `Exception` otherwise. The final message is
    /// also handed to the trace forwarder.
    pub fn exception_from(
        &self,
        error: Option<&dyn DiagnosticError>,
        template: &str,
        args: &[&dyn Display],
    ) {
        let event = match error.and_then(|e| e.status_code()) {
            Some(_) => EventId::ServiceResultException,
            None => EventId::Exception,
        };
        let emit = self.is_event_enabled(event);
        let forward = self.forwarder.is_enabled(TraceMask::ERROR);
        if !emit && !forward {
            return;
        }

        let translated = self.translator.translate(error, template, args);

        if emit {
            let payload = match translated
                .classification
                .as_ref()
                .and_then(ClassifiedError::status_code)
            {
                Some(code) => EventPayload::StatusMessage {
                    status_code: code.bits() as i32,
                    message: translated.message.clone(),
                },
                None => EventPayload::Message {
                    message: translated.message.clone(),
                },
            };
            self.write_event(event, payload);
        }

        if forward {
            if let Err(e) =
                self.forwarder
                    .trace(error, TraceMask::ERROR, &translated.message, false, None)
            {
                tracing::debug!(error = %e, "trace forwarder failed");
            }
        }
    }

    /// Emits `ServiceResultException` (id 8) for a status-coded failure the
    /// caller has already described.
    pub fn service_result_exception(&self, status_code: StatusCode, message: &str) {
        if self.is_event_enabled(EventId::ServiceResultException) {
            self.write_event(
                EventId::ServiceResultException,
                EventPayload::StatusMessage {
                    status_code: status_code.bits() as i32,
                    message: message.to_string(),
                },
            );
        }
    }

    /// A service request arrived. `pending_request_count` counts requests
    /// still in flight, this one included.
    pub fn service_call(
        &self,
        service_name: &str,
        request_handle: u32,
        pending_request_count: i32,
    ) {
        if self.is_event_enabled(EventId::ServiceCall) {
            self.write_event(
                EventId::ServiceCall,
                EventPayload::ServiceRequest {
                    service_name: service_name.to_string(),
                    request_handle,
                    pending_request_count,
                },
            );
        }
    }

    /// A service request finished successfully.
    pub fn service_completed(
        &self,
        service_name: &str,
        request_handle: u32,
        pending_request_count: i32,
    ) {
        if self.is_event_enabled(EventId::ServiceCompleted) {
            self.write_event(
                EventId::ServiceCompleted,
                EventPayload::ServiceRequest {
                    service_name: service_name.to_string(),
                    request_handle,
                    pending_request_count,
                },
            );
        }
    }

    /// A service request finished with a bad `status_code`.
    pub fn service_completed_bad(
        &self,
        service_name: &str,
        request_handle: u32,
        status_code: StatusCode,
        pending_request_count: i32,
    ) {
        if self.is_event_enabled(EventId::ServiceCompletedBad) {
            self.write_event(
                EventId::ServiceCompletedBad,
                EventPayload::ServiceRequestBad {
                    service_name: service_name.to_string(),
                    request_handle,
                    status_code: status_code.bits(),
                    pending_request_count,
                },
            );
        }
    }

    /// A service fault was returned to the client.
    pub fn service_fault(&self, status_code: StatusCode) {
        if self.is_event_enabled(EventId::ServiceFault) {
            self.write_event(
                EventId::ServiceFault,
                EventPayload::Status {
                    status_code: status_code.bits(),
                },
            );
        }
    }

    /// A server-side request of `request_type` was dispatched.
    pub fn server_call(&self, request_type: &str, request_id: u32) {
        if self.is_event_enabled(EventId::ServerCall) {
            self.write_event(
                EventId::ServerCall,
                EventPayload::ServerRequest {
                    request_type: request_type.to_string(),
                    request_id,
                },
            );
        }
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("translator", &self.translator)
            .finish_non_exhaustive()
    }
}

/// Assembles an [`EventSource`].
///
/// Unset parts default to a [`TracingSink`], the built-in status names,
/// the [`ChainRenderer`], a trace mask of [`TraceMask::ERROR`] and a
/// [`TracingForwarder`] sharing that mask.
#[derive(Default)]
pub struct EventSourceBuilder {
    sink: Option<Box<dyn EventSink>>,
    names: Option<Box<dyn StatusCodeNames>>,
    renderer: Option<Box<dyn ErrorRenderer>>,
    mask: Option<TraceMaskHandle>,
    forwarder: Option<Box<dyn TraceForwarder>>,
}

impl EventSourceBuilder {
    /// Sets the sink events are written to.
    pub fn sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Replaces the registry used for symbolic status names.
    pub fn status_names(mut self, names: impl StatusCodeNames + 'static) -> Self {
        self.names = Some(Box::new(names));
        self
    }

    /// Replaces the renderer of the long error description.
    pub fn renderer(mut self, renderer: impl ErrorRenderer + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Shares an existing trace mask handle with the source.
    pub fn trace_mask(mut self, mask: TraceMaskHandle) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Replaces the trace channel that receives every exception message.
    pub fn forwarder(mut self, forwarder: impl TraceForwarder + 'static) -> Self {
        self.forwarder = Some(Box::new(forwarder));
        self
    }

    /// Finishes the source, filling unset parts with defaults.
    pub fn build(self) -> EventSource {
        let mask = self
            .mask
            .unwrap_or_else(|| TraceMaskHandle::new(TraceMask::ERROR));
        let forwarder = self.forwarder.unwrap_or_else(|| {
            Box::new(TracingForwarder::new(mask.clone())) as Box<dyn TraceForwarder>
        });
        let translator = ExceptionTranslator::new(
            self.names
                .unwrap_or_else(|| Box::new(BuiltinStatusNames) as Box<dyn StatusCodeNames>),
            self.renderer
                .unwrap_or_else(|| Box::new(ChainRenderer) as Box<dyn ErrorRenderer>),
            mask,
        );

        EventSource {
            sink: self
                .sink
                .unwrap_or_else(|| Box::new(TracingSink) as Box<dyn EventSink>),
            translator,
            forwarder,
        }
    }
}

static INSTALLED: OnceLock<EventSource> = OnceLock::new();

/// Installs the process-wide event source.
///
/// # Errors
///
/// Returns `ObserveError::AlreadyInstalled` if a source was installed
/// before, or if [`log`] already created the default one.
pub fn install(source: EventSource) -> Result<&'static EventSource, ObserveError> {
    INSTALLED
        .set(source)
        .map_err(|_| ObserveError::AlreadyInstalled)?;
    Ok(log())
}

/// Returns the process-wide event source.
///
/// If none was installed, a default tracing-backed source is created on
/// first use and kept for the rest of the process.
pub fn log() -> &'static EventSource {
    INSTALLED.get_or_init(|| EventSource::builder().build())
}
