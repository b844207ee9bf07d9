//! The status-coded error raised by service implementations.

use crate::StatusCode;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error that carries a protocol status code alongside its message.
///
/// When no explicit message is supplied the symbolic name of the code is
/// used, so `ServiceResultError::new(StatusCode::BAD_TIMEOUT)` displays as
/// `BadTimeout`.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ServiceResultError {
    status_code: StatusCode,
    message: String,
    #[source]
    inner: Option<BoxError>,
}

impl ServiceResultError {
    /// Creates an error whose message is the code's symbolic name.
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            message: status_code.to_string(),
            inner: None,
        }
    }

    /// Creates an error with an explicit message.
    pub fn with_message(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            inner: None,
        }
    }

    /// Attaches the error that caused this one.
    pub fn caused_by(mut self, inner: impl Into<BoxError>) -> Self {
        self.inner = Some(inner.into());
        self
    }

    /// Returns the status code.
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Returns the message without the status code.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<StatusCode> for ServiceResultError {
    fn from(status_code: StatusCode) -> Self {
        Self::new(status_code)
    }
}
