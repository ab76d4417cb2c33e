//! Tracing Infrastructure
//!
//! The library itself only emits `tracing` events and spans: every controller round trip is
//! logged at `trace` (raw lines) and `debug` (decoded results), rejected commands at `warn`.
//! Applications that want to see them install a subscriber, either their own or the one
//! provided here:
//! - Pretty, compact or JSON output
//! - Environment-based filtering (`RUST_LOG` wins over the configured level)
//! - Level taken from a [`SessionConfig`]
//!
//! # Example
//! ```no_run
//! use optosigma::{config::SessionConfig, tracing_setup};
//! use optosigma::hardware::types::ControllerModel;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new(ControllerModel::DualAxis, "/dev/ttyUSB0");
//! tracing_setup::init_from_config(&config)?;
//! tracing::info!("stage control started");
//! # Ok(())
//! # }
//! ```

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::SessionConfig;

/// Output format for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Compact format without colors
    Compact,
    /// JSON format for log aggregation
    Json,
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    pub format: OutputFormat,
    /// Whether to include span open/close events
    pub with_span_events: bool,
    pub with_file_and_line: bool,
    pub with_thread_names: bool,
    /// Only honoured by the pretty format
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_span_events: false,
            with_file_and_line: false,
            with_thread_names: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn from_session_config(config: &SessionConfig) -> Result<Self, String> {
        config
            .log_level
            .parse::<Level>()
            .map(Self::new)
            .map_err(|e| format!("Invalid log level '{}': {e}", config.log_level))
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize tracing with the level from a session configuration.
pub fn init_from_config(config: &SessionConfig) -> Result<(), String> {
    init(TracingConfig::from_session_config(config)?)
}

/// Install a global `fmt` subscriber.
///
/// Idempotent: if a global subscriber is already set this returns `Ok(())`, which keeps it
/// safe to call from tests and from more than one component.
pub fn init(config: TracingConfig) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.with_file_and_line)
        .with_line_number(config.with_file_and_line)
        .with_thread_names(config.with_thread_names);

    let layer = match config.format {
        OutputFormat::Pretty => base.pretty().with_ansi(config.with_ansi).with_filter(env_filter).boxed(),
        OutputFormat::Compact => base.compact().with_ansi(false).with_filter(env_filter).boxed(),
        OutputFormat::Json => base.json().with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .or_else(|e| {
            // Another subscriber already owns the global slot (tests, host application)
            if e.to_string().contains("a global default trace dispatcher has already been set") {
                Ok(())
            } else {
                Err(format!("Failed to initialize tracing: {}", e))
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::types::ControllerModel;

    #[test]
    fn test_tracing_config_from_session() {
        let mut config = SessionConfig::new(ControllerModel::SingleAxis, "COM1");
        config.log_level = "Debug".to_string();
        let tracing_config = TracingConfig::from_session_config(&config).unwrap();
        assert_eq!(tracing_config.level, Level::DEBUG);

        config.log_level = "loud".to_string();
        let err = TracingConfig::from_session_config(&config).unwrap_err();
        assert!(err.contains("loud"));
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = TracingConfig::new(Level::WARN)
            .with_format(OutputFormat::Json)
            .with_span_events(false);
        assert!(init(config.clone()).is_ok());
        assert!(init(config).is_ok());
    }
}
