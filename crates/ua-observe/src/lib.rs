//! Diagnostic event layer for the UA stack.
//!
//! Every subsystem of the stack reports through one [`EventSource`]: a
//! fixed catalog of named events, each with a stable id, a severity level
//! and a keyword set. Listeners filter on level and keywords at runtime,
//! and every operation checks that filter before it formats anything, so
//! a disabled event costs one predicate call.
//!
//! # Events
//!
//! | Id | Event | Level | Keywords |
//! |----|-------|-------|----------|
//! | 1–5 | `Critical`, `Error`, `Warning`, `Trace`, `Debug` | by name | `TRACE` |
//! | 6 | `Exception` | `Error` | `EXCEPTION` |
//! | 7 | `Security` | `LogAlways` | `SECURITY` |
//! | 8 | `ServiceResultException` | `Error` | `TRACE` |
//! | 9–10 | `ServiceCall`, `ServiceCompleted` | `Informational` | `SERVICE` |
//! | 11–12 | `ServiceCompletedBad`, `ServiceFault` | `Error` | `SERVICE` |
//! | 13 | `ServerCall` | `Informational` | `SERVICE` |
//!
//! `Debug` is compiled out entirely in builds without `debug_assertions`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ua_observe::{log, EventSource};
//! use ua_types::{ServiceResultError, StatusCode};
//!
//! let source = log();
//! source.service_call("Read", 42, 1);
//!
//! let err = ServiceResultError::with_message(StatusCode::BAD_TIMEOUT, "no response");
//! source.exception_from(Some(&err), "Request {0} failed", &[&42]);
//! ```

mod config;
mod error;
mod event;
mod format;
mod gate;
mod sink;
mod source;
mod translate;

pub use config::{
    init_tracing, load_config, DiagnosticsConfig, ListenerConfig, LoggingConfig, TraceConfig,
};
pub use error::ObserveError;
pub use event::{
    EventDefinition, EventId, EventLevel, EventPayload, EventRecord, Keywords,
    ParseEventLevelError, PayloadShape, CATALOG,
};
pub use format::{format, format_or_raw, FormatError};
pub use gate::ListenerFilter;
pub use sink::{EventSink, FilteredSink, MemorySink, TracingSink, EVENTS_TARGET};
pub use source::{install, log, EventSource, EventSourceBuilder};
pub use translate::{
    BuiltinStatusNames, ChainRenderer, ClassifiedError, DiagnosticError, ErrorRenderer,
    ExceptionTranslator, StatusCodeNames, TraceForwarder, TracingForwarder, TranslatedException,
    TRACE_TARGET,
};

#[cfg(test)]
mod tests;
