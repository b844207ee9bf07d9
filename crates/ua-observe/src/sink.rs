//! Event sinks: where emitted records go.
//!
//! [`TracingSink`] forwards records to the `tracing` facade and is the
//! default transport. [`FilteredSink`] puts a runtime [`ListenerFilter`]
//! in front of any sink. [`MemorySink`] keeps records in memory for capture
//! and assertions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ObserveError;
use crate::event::{EventLevel, EventRecord, Keywords};
use crate::gate::ListenerFilter;

/// `tracing` target used for emitted events.
pub const EVENTS_TARGET: &str = "ua_observe::events";

/// The transport that receives emitted events.
///
/// Implementations must be thread-safe. `write` should apply the same
/// filtering as `is_enabled`, so that a record written without a prior
/// check is still filtered.
pub trait EventSink: Send + Sync {
    /// Returns `true` if an event with this level and keyword set would be
    /// consumed. Must be cheap: it runs before any message formatting.
    fn is_enabled(&self, level: EventLevel, keywords: Keywords) -> bool;

    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::Sink` if the transport failed. Callers in
    /// this crate never propagate it.
    fn write(&self, record: &EventRecord) -> Result<(), ObserveError>;
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn is_enabled(&self, level: EventLevel, keywords: Keywords) -> bool {
        (**self).is_enabled(level, keywords)
    }

    fn write(&self, record: &EventRecord) -> Result<(), ObserveError> {
        (**self).write(record)
    }
}

/// Forwards events to the installed `tracing` subscriber.
///
/// Levels map as `Critical`/`Error` → ERROR, `Warning` → WARN,
/// `Informational`/`LogAlways` → INFO and `Verbose` → DEBUG.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn is_enabled(&self, level: EventLevel, _keywords: Keywords) -> bool {
        match level {
            EventLevel::Critical | EventLevel::Error => {
                tracing::enabled!(target: EVENTS_TARGET, tracing::Level::ERROR)
            }
            EventLevel::Warning => tracing::enabled!(target: EVENTS_TARGET, tracing::Level::WARN),
            EventLevel::LogAlways | EventLevel::Informational => {
                tracing::enabled!(target: EVENTS_TARGET, tracing::Level::INFO)
            }
            EventLevel::Verbose => tracing::enabled!(target: EVENTS_TARGET, tracing::Level::DEBUG),
        }
    }

    fn write(&self, record: &EventRecord) -> Result<(), ObserveError> {
        let event_id = record.id().as_u16();
        let event_name = record.name();
        let keywords = record.keywords();
        let message = record.message();
        match record.level() {
            EventLevel::Critical | EventLevel::Error => tracing::error!(
                target: EVENTS_TARGET,
                event_id,
                event_name,
                %keywords,
                "{message}"
            ),
            EventLevel::Warning => tracing::warn!(
                target: EVENTS_TARGET,
                event_id,
                event_name,
                %keywords,
                "{message}"
            ),
            EventLevel::LogAlways | EventLevel::Informational => tracing::info!(
                target: EVENTS_TARGET,
                event_id,
                event_name,
                %keywords,
                "{message}"
            ),
            EventLevel::Verbose => tracing::debug!(
                target: EVENTS_TARGET,
                event_id,
                event_name,
                %keywords,
                "{message}"
            ),
        }
        Ok(())
    }
}

/// A sink guarded by a runtime listener filter.
#[derive(Debug)]
pub struct FilteredSink<S> {
    inner: S,
    filter: Arc<ListenerFilter>,
}

impl<S: EventSink> FilteredSink<S> {
    /// Wraps `inner` so it only sees events `filter` accepts.
    pub fn new(inner: S, filter: Arc<ListenerFilter>) -> Self {
        Self { inner, filter }
    }

    /// Returns the shared filter; attach/detach through it at runtime.
    pub fn filter(&self) -> &Arc<ListenerFilter> {
        &self.filter
    }

    /// Returns the wrapped sink.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: EventSink> EventSink for FilteredSink<S> {
    fn is_enabled(&self, level: EventLevel, keywords: Keywords) -> bool {
        self.filter.is_enabled(level, keywords) && self.inner.is_enabled(level, keywords)
    }

    fn write(&self, record: &EventRecord) -> Result<(), ObserveError> {
        if !self.filter.is_enabled(record.level(), record.keywords()) {
            return Ok(());
        }
        self.inner.write(record)
    }
}

/// Keeps every accepted record in memory.
///
/// Also counts how often the enablement check ran, which lets callers
/// verify that disabled paths never reached the sink at all.
#[derive(Debug, Default)]
pub struct MemorySink {
    filter: ListenerFilter,
    records: Mutex<Vec<EventRecord>>,
    enabled_checks: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MemorySink {
    /// Creates a sink that accepts every level and keyword.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink with its own listener filter.
    pub fn with_filter(filter: ListenerFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Returns this sink's listener filter.
    pub fn filter(&self) -> &ListenerFilter {
        &self.filter
    }

    /// Returns a copy of the accepted records, oldest first.
    pub fn records(&self) -> Vec<EventRecord> {
        self.lock().clone()
    }

    /// Removes and returns the accepted records.
    pub fn take(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of `is_enabled` calls so far.
    pub fn enabled_checks(&self) -> usize {
        self.enabled_checks.load(Ordering::Relaxed)
    }

    /// Number of `write` calls so far, accepted or filtered.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EventRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for MemorySink {
    fn is_enabled(&self, level: EventLevel, keywords: Keywords) -> bool {
        self.enabled_checks.fetch_add(1, Ordering::Relaxed);
        self.filter.is_enabled(level, keywords)
    }

    fn write(&self, record: &EventRecord) -> Result<(), ObserveError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        if self.filter.is_enabled(record.level(), record.keywords()) {
            self.lock().push(record.clone());
        }
        Ok(())
    }
}
