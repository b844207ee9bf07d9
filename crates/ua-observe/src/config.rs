//! Diagnostics configuration loading from file and environment variables.

use std::sync::Arc;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use ua_types::{TraceMask, TraceMaskHandle};

use crate::error::ObserveError;
use crate::event::{EventLevel, Keywords};
use crate::gate::ListenerFilter;
use crate::sink::{FilteredSink, TracingSink};
use crate::source::EventSource;

/// Top-level diagnostics configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagnosticsConfig {
    /// Subscriber settings for the `tracing` output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Process trace mask settings.
    #[serde(default)]
    pub trace: TraceConfig,

    /// Event listener settings.
    #[serde(default)]
    pub listener: ListenerConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "ua_observe=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Trace mask configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceConfig {
    /// Mask category names, e.g. `["error", "stack_trace"]`.
    #[serde(default = "default_trace_mask")]
    pub mask: Vec<String>,
}

/// Listener configuration for the event sink.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// Whether the listener starts attached.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Most verbose level delivered.
    #[serde(default = "default_listener_level")]
    pub level: EventLevel,

    /// Keyword names to deliver; empty means all.
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_trace_mask() -> Vec<String> {
    vec!["error".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_listener_level() -> EventLevel {
    EventLevel::Verbose
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            mask: default_trace_mask(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_listener_level(),
            keywords: Vec::new(),
        }
    }
}

impl TraceConfig {
    /// Combines the configured names into one mask.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::ConfigValue` for an unknown name.
    pub fn trace_mask(&self) -> Result<TraceMask, ObserveError> {
        let mut mask = TraceMask::NONE;
        for name in &self.mask {
            mask |= name
                .parse::<TraceMask>()
                .map_err(|_| ObserveError::ConfigValue {
                    key: "trace.mask",
                    value: name.clone(),
                })?;
        }
        Ok(mask)
    }
}

impl ListenerConfig {
    /// Combines the configured keyword names into one set.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::ConfigValue` for an unknown keyword.
    pub fn keyword_set(&self) -> Result<Keywords, ObserveError> {
        let mut keywords = Keywords::NONE;
        for name in &self.keywords {
            keywords = keywords
                | Keywords::from_name(name).ok_or_else(|| ObserveError::ConfigValue {
                    key: "listener.keywords",
                    value: name.clone(),
                })?;
        }
        Ok(keywords)
    }

    /// Builds the runtime filter described by this section.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::ConfigValue` for an unknown keyword.
    pub fn filter(&self) -> Result<ListenerFilter, ObserveError> {
        let keywords = self.keyword_set()?;
        let filter = ListenerFilter::disabled();
        if self.enabled {
            filter.enable(self.level, keywords);
        }
        Ok(filter)
    }
}

impl DiagnosticsConfig {
    /// Builds an event source writing to `tracing` behind the configured
    /// listener filter, with a trace mask initialised from `trace.mask`.
    ///
    /// # Errors
    ///
    /// Returns `ObserveError::ConfigValue` for unknown mask or keyword names.
    pub fn build_source(&self) -> Result<EventSource, ObserveError> {
        let mask = TraceMaskHandle::new(self.trace.trace_mask()?);
        let filter = Arc::new(self.listener.filter()?);
        Ok(EventSource::builder()
            .sink(FilteredSink::new(TracingSink, filter))
            .trace_mask(mask)
            .build())
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `UA_LOG_LEVEL` overrides `logging.level`
/// - `UA_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `UA_TRACE_MASK` overrides `trace.mask` (comma list of names or a number)
/// - `UA_LISTENER_LEVEL` overrides `listener.level`
///
/// # Errors
///
/// Returns `ObserveError` if the file exists but cannot be read or parsed,
/// or if an override names an unknown level.
pub fn load_config(path: Option<&str>) -> Result<DiagnosticsConfig, ObserveError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                DiagnosticsConfig::default()
            }
            Err(e) => return Err(ObserveError::ConfigRead(e)),
        },
        None => DiagnosticsConfig::default(),
    };

    if let Ok(level) = std::env::var("UA_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("UA_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(mask) = std::env::var("UA_TRACE_MASK") {
        config.trace.mask = vec![mask];
    }
    if let Ok(level) = std::env::var("UA_LISTENER_LEVEL") {
        config.listener.level = level.parse().map_err(|_| ObserveError::ConfigValue {
            key: "listener.level",
            value: level,
        })?;
    }

    Ok(config)
}

/// Installs the global `tracing` subscriber described by `logging`.
///
/// An unparsable level falls back to `info`. Does nothing if a global
/// subscriber is already set.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}
