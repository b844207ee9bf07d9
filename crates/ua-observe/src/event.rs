//! Event levels, keywords, the event catalog, and event records.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::format::format_or_raw;

/// Event severity. Lower values are more severe.
///
/// A listener enabled at a given level receives every event at that level
/// or more severe. [`EventLevel::LogAlways`] events pass any level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventLevel {
    LogAlways = 0,
    Critical = 1,
    Error = 2,
    Warning = 3,
    Informational = 4,
    Verbose = 5,
}

impl EventLevel {
    /// Returns the canonical string label for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LogAlways => "log_always",
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Informational => "informational",
            Self::Verbose => "verbose",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::LogAlways,
            1 => Self::Critical,
            2 => Self::Error,
            3 => Self::Warning,
            4 => Self::Informational,
            _ => Self::Verbose,
        }
    }
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventLevel {
    type Err = ParseEventLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log_always" | "always" => Ok(Self::LogAlways),
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "informational" | "info" => Ok(Self::Informational),
            "verbose" | "debug" => Ok(Self::Verbose),
            _ => Err(ParseEventLevelError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown event level string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown event level: {0}")]
pub struct ParseEventLevelError(pub String);

/// Keyword bit set used for filtering independently of level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keywords(pub u64);

impl Keywords {
    /// The empty set. As a listener filter it means "every keyword".
    pub const NONE: Self = Self(0);
    pub const TRACE: Self = Self(1);
    pub const DIAGNOSTIC: Self = Self(2);
    pub const EXCEPTION: Self = Self(4);
    pub const SERVICE: Self = Self(8);
    pub const SECURITY: Self = Self(16);

    /// Returns the raw bit set.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if no keyword is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every keyword of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any keyword of `other` is set.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Looks up a single keyword by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::TRACE),
            "diagnostic" => Some(Self::DIAGNOSTIC),
            "exception" => Some(Self::EXCEPTION),
            "service" => Some(Self::SERVICE),
            "security" => Some(Self::SECURITY),
            _ => None,
        }
    }
}

impl std::ops::BitOr for Keywords {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Display for Keywords {
    /// Writes the set names joined with `|`, or `none`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(Keywords, &str); 5] = [
            (Keywords::TRACE, "trace"),
            (Keywords::DIAGNOSTIC, "diagnostic"),
            (Keywords::EXCEPTION, "exception"),
            (Keywords::SERVICE, "service"),
            (Keywords::SECURITY, "security"),
        ];
        if self.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (kw, name) in NAMES {
            if self.contains(kw) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Stable event identifiers. Values are never reused or renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventId {
    Critical = 1,
    Error = 2,
    Warning = 3,
    Trace = 4,
    Debug = 5,
    Exception = 6,
    Security = 7,
    ServiceResultException = 8,
    ServiceCall = 9,
    ServiceCompleted = 10,
    ServiceCompletedBad = 11,
    ServiceFault = 12,
    ServerCall = 13,
}

impl EventId {
    /// Returns the numeric id.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the catalog entry for this id.
    pub fn definition(self) -> &'static EventDefinition {
        &CATALOG[self as usize - 1]
    }
}

/// Argument layout of an event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// `(message)`
    Message,
    /// `(status_code: i32, message)`
    StatusMessage,
    /// `(service_name, request_handle: u32, pending_request_count: i32)`
    ServiceRequest,
    /// `(service_name, request_handle: u32, status_code: u32, pending_request_count: i32)`
    ServiceRequestBad,
    /// `(status_code: u32)`
    Status,
    /// `(request_type, request_id: u32)`
    ServerRequest,
}

/// One immutable entry of the event catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventDefinition {
    pub id: EventId,
    pub name: &'static str,
    pub level: EventLevel,
    pub keywords: Keywords,
    /// Composite template applied to the payload, or `None` when the
    /// payload message is the whole text.
    pub message_template: Option<&'static str>,
    pub shape: PayloadShape,
}

const fn def(
    id: EventId,
    name: &'static str,
    level: EventLevel,
    keywords: Keywords,
    message_template: Option<&'static str>,
    shape: PayloadShape,
) -> EventDefinition {
    EventDefinition {
        id,
        name,
        level,
        keywords,
        message_template,
        shape,
    }
}

/// An untemplated event carrying one message string.
const fn message_def(
    id: EventId,
    name: &'static str,
    level: EventLevel,
    keywords: Keywords,
) -> EventDefinition {
    def(id, name, level, keywords, None, PayloadShape::Message)
}

/// The complete event catalog, indexed by `id - 1`.
pub static CATALOG: [EventDefinition; 13] = [
    message_def(EventId::Critical, "Critical", EventLevel::Critical, Keywords::TRACE),
    message_def(EventId::Error, "Error", EventLevel::Error, Keywords::TRACE),
    message_def(EventId::Warning, "Warning", EventLevel::Warning, Keywords::TRACE),
    message_def(EventId::Trace, "Trace", EventLevel::Informational, Keywords::TRACE),
    message_def(EventId::Debug, "Debug", EventLevel::Informational, Keywords::TRACE),
    def(
        EventId::Exception,
        "Exception",
        EventLevel::Error,
        Keywords::EXCEPTION,
        Some("Exception: {0}"),
        PayloadShape::Message,
    ),
    message_def(EventId::Security, "Security", EventLevel::LogAlways, Keywords::SECURITY),
    def(
        EventId::ServiceResultException,
        "ServiceResultException",
        EventLevel::Error,
        Keywords::TRACE,
        Some("ServiceResultException: {0} {1}"),
        PayloadShape::StatusMessage,
    ),
    def(
        EventId::ServiceCall,
        "ServiceCall",
        EventLevel::Informational,
        Keywords::SERVICE,
        Some("{0} Called. RequestHandle={1}, PendingRequestCount={2}"),
        PayloadShape::ServiceRequest,
    ),
    def(
        EventId::ServiceCompleted,
        "ServiceCompleted",
        EventLevel::Informational,
        Keywords::SERVICE,
        Some("{0} Completed. RequestHandle={1}, PendingRequestCount={2}"),
        PayloadShape::ServiceRequest,
    ),
    def(
        EventId::ServiceCompletedBad,
        "ServiceCompletedBad",
        EventLevel::Error,
        Keywords::SERVICE,
        Some("{0} Completed. RequestHandle={1}, PendingRequestCount={3}, StatusCode={2}"),
        PayloadShape::ServiceRequestBad,
    ),
    def(
        EventId::ServiceFault,
        "ServiceFault",
        EventLevel::Error,
        Keywords::SERVICE,
        Some("Service Fault Occured. Reason={0}"),
        PayloadShape::Status,
    ),
    def(
        EventId::ServerCall,
        "ServerCall",
        EventLevel::Informational,
        Keywords::SERVICE,
        Some("{0} Validated. ID={1}"),
        PayloadShape::ServerRequest,
    ),
];

/// Fixed-arity event arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum EventPayload {
    Message {
        message: String,
    },
    StatusMessage {
        status_code: i32,
        message: String,
    },
    ServiceRequest {
        service_name: String,
        request_handle: u32,
        pending_request_count: i32,
    },
    ServiceRequestBad {
        service_name: String,
        request_handle: u32,
        status_code: u32,
        pending_request_count: i32,
    },
    Status {
        status_code: u32,
    },
    ServerRequest {
        request_type: String,
        request_id: u32,
    },
}

impl EventPayload {
    /// Returns the argument layout of this payload.
    pub fn shape(&self) -> PayloadShape {
        match self {
            Self::Message { .. } => PayloadShape::Message,
            Self::StatusMessage { .. } => PayloadShape::StatusMessage,
            Self::ServiceRequest { .. } => PayloadShape::ServiceRequest,
            Self::ServiceRequestBad { .. } => PayloadShape::ServiceRequestBad,
            Self::Status { .. } => PayloadShape::Status,
            Self::ServerRequest { .. } => PayloadShape::ServerRequest,
        }
    }

    /// Returns the positional arguments in catalog order.
    pub fn args(&self) -> Vec<&dyn Display> {
        match self {
            Self::Message { message } => vec![message as &dyn Display],
            Self::StatusMessage {
                status_code,
                message,
            } => vec![status_code as &dyn Display, message],
            Self::ServiceRequest {
                service_name,
                request_handle,
                pending_request_count,
            } => vec![
                service_name as &dyn Display,
                request_handle,
                pending_request_count,
            ],
            Self::ServiceRequestBad {
                service_name,
                request_handle,
                status_code,
                pending_request_count,
            } => vec![
                service_name as &dyn Display,
                request_handle,
                status_code,
                pending_request_count,
            ],
            Self::Status { status_code } => vec![status_code as &dyn Display],
            Self::ServerRequest {
                request_type,
                request_id,
            } => vec![request_type as &dyn Display, request_id],
        }
    }
}

/// A single emitted event as handed to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub definition: &'static EventDefinition,
    pub payload: EventPayload,
}

impl EventRecord {
    /// The catalog id of this record.
    pub fn id(&self) -> EventId {
        self.definition.id
    }

    /// The catalog name, e.g. `"ServiceCall"`.
    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    /// The catalog level.
    pub fn level(&self) -> EventLevel {
        self.definition.level
    }

    /// The catalog keyword set.
    pub fn keywords(&self) -> Keywords {
        self.definition.keywords
    }

    /// Renders the human-readable message for this record.
    ///
    /// Applies the definition's template to the payload arguments. Events
    /// without a template render their message argument as-is.
    pub fn message(&self) -> String {
        match (self.definition.message_template, &self.payload) {
            (Some(template), payload) => format_or_raw(template, &payload.args()),
            (None, EventPayload::Message { message }) => message.clone(),
            (None, payload) => payload
                .args()
                .iter()
                .map(|arg| arg.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}
