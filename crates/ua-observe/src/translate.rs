//! Turning errors into exception events.
//!
//! An error handed to [`EventSource::exception_from`](crate::EventSource::exception_from)
//! is classified as either status-coded (it carries a [`StatusCode`]) or
//! generic (it only has a kind name). The classification picks the event
//! that is emitted and the detail line appended to the message:
//!
//! ```text
//! <base message>
//! <symbolic name or kind name> '<error message>'
//!
//! ========================================
//! <long description>
//! ========================================
//! ```
//!
//! The block between the separators is only present when the trace mask
//! has [`TraceMask::STACK_TRACE`] set.

use std::borrow::Cow;
use std::error::Error;
use std::fmt::{Display, Write as _};

use ua_types::{ServiceResultError, StatusCode, TraceMask, TraceMaskHandle};

use crate::error::ObserveError;
use crate::format::format;

const SEPARATOR: &str = "========================================";

/// An error that can be classified for diagnostics.
///
/// Each concrete error type (or each variant of an error enum) names
/// itself through [`kind_name`](Self::kind_name); status-coded errors also
/// expose their code.
pub trait DiagnosticError: Error {
    /// Human-readable name of the error kind, e.g. `"IoError"`.
    fn kind_name(&self) -> &'static str;

    /// The protocol status code, for status-coded errors.
    fn status_code(&self) -> Option<StatusCode> {
        None
    }
}

impl DiagnosticError for ServiceResultError {
    fn kind_name(&self) -> &'static str {
        "ServiceResultError"
    }

    fn status_code(&self) -> Option<StatusCode> {
        Some(ServiceResultError::status_code(self))
    }
}

impl DiagnosticError for std::io::Error {
    fn kind_name(&self) -> &'static str {
        "IoError"
    }
}

impl DiagnosticError for std::fmt::Error {
    fn kind_name(&self) -> &'static str {
        "FmtError"
    }
}

impl DiagnosticError for ObserveError {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Sink(_) => "SinkError",
            Self::AlreadyInstalled => "AlreadyInstalled",
            Self::ConfigRead(_) => "ConfigReadError",
            Self::ConfigParse(_) => "ConfigParseError",
            Self::ConfigValue { .. } => "ConfigValueError",
        }
    }
}

/// The two ways an error can be reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedError {
    StatusCoded { code: StatusCode, message: String },
    Generic { type_name: &'static str, message: String },
}

impl ClassifiedError {
    /// Classifies `error` by whether it carries a status code.
    pub fn classify(error: &dyn DiagnosticError) -> Self {
        match error.status_code() {
            Some(code) => Self::StatusCoded {
                code,
                message: error.to_string(),
            },
            None => Self::Generic {
                type_name: error.kind_name(),
                message: error.to_string(),
            },
        }
    }

    /// Returns the status code for status-coded errors.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::StatusCoded { code, .. } => Some(*code),
            Self::Generic { .. } => None,
        }
    }
}

/// Resolves status codes to their symbolic names.
pub trait StatusCodeNames: Send + Sync {
    fn symbolic_name(&self, code: StatusCode) -> Cow<'static, str>;
}

/// Names from the built-in status-code table; unknown codes render as hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinStatusNames;

impl StatusCodeNames for BuiltinStatusNames {
    fn symbolic_name(&self, code: StatusCode) -> Cow<'static, str> {
        match code.browse_name() {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(code.to_string()),
        }
    }
}

/// Produces the multi-line description placed between the separators.
pub trait ErrorRenderer: Send + Sync {
    fn long_description(&self, error: &dyn DiagnosticError) -> String;
}

/// Describes the error and walks its `source()` chain.
///
/// ```text
/// Kind: ServiceResultError
/// StatusCode: BadTimeout (0x800A0000)
/// Message: request timed out
/// Caused by: connection reset
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainRenderer;

impl ErrorRenderer for ChainRenderer {
    fn long_description(&self, error: &dyn DiagnosticError) -> String {
        let mut out = String::new();
        let _ = write!(out, "Kind: {}", error.kind_name());
        if let Some(code) = error.status_code() {
            let _ = write!(out, "\nStatusCode: {code} (0x{:08X})", code.bits());
        }
        let _ = write!(out, "\nMessage: {error}");
        let mut source = error.source();
        while let Some(cause) = source {
            let _ = write!(out, "\nCaused by: {cause}");
            source = cause.source();
        }
        out
    }
}

/// The general trace channel that receives every exception message last.
pub trait TraceForwarder: Send + Sync {
    /// Returns `true` if messages for `mask` would be written.
    fn is_enabled(&self, mask: TraceMask) -> bool;

    /// Writes one trace message.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel failed; the caller ignores it.
    fn trace(
        &self,
        error: Option<&dyn DiagnosticError>,
        mask: TraceMask,
        message: &str,
        include_timestamp: bool,
        extra: Option<&str>,
    ) -> Result<(), ObserveError>;
}

/// `tracing` target used by [`TracingForwarder`].
pub const TRACE_TARGET: &str = "ua_observe::trace";

/// Writes trace messages through `tracing` when the shared mask allows it.
///
/// Messages for masks containing [`TraceMask::ERROR`] go out at `ERROR`,
/// everything else at `INFO`. The forwarder only reports itself enabled
/// when a subscriber is interested in that level on [`TRACE_TARGET`].
#[derive(Debug, Clone, Default)]
pub struct TracingForwarder {
    mask: TraceMaskHandle,
}

impl TracingForwarder {
    /// Creates a forwarder that consults `mask` on every call.
    pub fn new(mask: TraceMaskHandle) -> Self {
        Self { mask }
    }
}

impl TraceForwarder for TracingForwarder {
    fn is_enabled(&self, mask: TraceMask) -> bool {
        if !self.mask.get().intersects(mask) {
            return false;
        }
        if mask.intersects(TraceMask::ERROR) {
            tracing::enabled!(target: TRACE_TARGET, tracing::Level::ERROR)
        } else {
            tracing::enabled!(target: TRACE_TARGET, tracing::Level::INFO)
        }
    }

    fn trace(
        &self,
        error: Option<&dyn DiagnosticError>,
        mask: TraceMask,
        message: &str,
        include_timestamp: bool,
        extra: Option<&str>,
    ) -> Result<(), ObserveError> {
        if !self.is_enabled(mask) {
            return Ok(());
        }
        let kind = error.map(|e| e.kind_name());
        if mask.intersects(TraceMask::ERROR) {
            tracing::error!(
                target: TRACE_TARGET,
                mask = mask.0,
                error_kind = kind,
                include_timestamp,
                extra,
                "{}",
                message.trim_end()
            );
        } else {
            tracing::info!(
                target: TRACE_TARGET,
                mask = mask.0,
                error_kind = kind,
                include_timestamp,
                extra,
                "{}",
                message.trim_end()
            );
        }
        Ok(())
    }
}

/// The message built for one exception event and how it was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedException {
    pub classification: Option<ClassifiedError>,
    pub message: String,
}

/// Builds exception messages from an error, a template and its arguments.
pub struct ExceptionTranslator {
    names: Box<dyn StatusCodeNames>,
    renderer: Box<dyn ErrorRenderer>,
    mask: TraceMaskHandle,
}

impl ExceptionTranslator {
    /// Creates a translator. `mask` is read on every call, so later
    /// changes through a shared handle take effect immediately.
    pub fn new(
        names: Box<dyn StatusCodeNames>,
        renderer: Box<dyn ErrorRenderer>,
        mask: TraceMaskHandle,
    ) -> Self {
        Self {
            names,
            renderer,
            mask,
        }
    }

    /// The trace mask deciding whether the long description is appended.
    pub fn trace_mask(&self) -> &TraceMaskHandle {
        &self.mask
    }

    /// Builds the complete message. Never fails: a template that cannot
    /// be formatted is used verbatim.
    pub fn translate(
        &self,
        error: Option<&dyn DiagnosticError>,
        template: &str,
        args: &[&dyn Display],
    ) -> TranslatedException {
        let mut message = if args.is_empty() {
            template.to_string()
        } else {
            format(template, args).unwrap_or_else(|e| {
                tracing::trace!(error = %e, template, "exception template failed to format");
                template.to_string()
            })
        };
        message.push('\n');

        let Some(error) = error else {
            return TranslatedException {
                classification: None,
                message,
            };
        };

        let classification = ClassifiedError::classify(error);
        match &classification {
            ClassifiedError::StatusCoded { code, message: text } => {
                let _ = write!(message, "{} '{}'", self.names.symbolic_name(*code), text);
            }
            ClassifiedError::Generic {
                type_name,
                message: text,
            } => {
                let _ = write!(message, "{type_name} '{text}'");
            }
        }
        message.push('\n');

        if self.mask.contains(TraceMask::STACK_TRACE) {
            message.push('\n');
            message.push_str(SEPARATOR);
            message.push('\n');
            message.push_str(&self.renderer.long_description(error));
            message.push('\n');
            message.push_str(SEPARATOR);
            message.push('\n');
        }

        TranslatedException {
            classification: Some(classification),
            message,
        }
    }
}

impl Default for ExceptionTranslator {
    fn default() -> Self {
        Self::new(
            Box::new(BuiltinStatusNames),
            Box::new(ChainRenderer),
            TraceMaskHandle::default(),
        )
    }
}

impl std::fmt::Debug for ExceptionTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionTranslator")
            .field("mask", &self.mask.get())
            .finish_non_exhaustive()
    }
}
