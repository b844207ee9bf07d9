//! Error types for the diagnostic event layer.
//!
//! None of these ever escape a logging call; they surface only from
//! configuration loading, installation and the sink seam. Template
//! failures are handled where they occur and never become an
//! `ObserveError`.

/// Errors that can occur inside the diagnostic event layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    /// The event sink rejected or failed to record an event.
    #[error("event sink error: {0}")]
    Sink(String),

    /// A process-wide event source was already installed.
    #[error("an event source is already installed")]
    AlreadyInstalled,

    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration value was syntactically valid TOML but meaningless.
    #[error("invalid config value for {key}: {value}")]
    ConfigValue {
        /// The dotted key of the offending value.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}
