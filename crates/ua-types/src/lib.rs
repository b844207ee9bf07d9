//! Shared types for the UA stack diagnostics crates.
//!
//! This crate holds the protocol-level vocabulary that the diagnostic layer
//! reads but does not own: status codes and their symbolic names, the
//! status-coded [`ServiceResultError`], and the process-wide [`TraceMask`].

mod error;
mod status;
mod trace_mask;

pub use error::ServiceResultError;
pub use status::StatusCode;
pub use trace_mask::{ParseTraceMaskError, TraceMask, TraceMaskHandle};
