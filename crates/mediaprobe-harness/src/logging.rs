//! Logging setup for the harness and the suites built on it

use crate::error::{HarnessError, HarnessResult};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Whether to log spans
    pub log_spans: bool,
    /// Whether to write through the per-test capture writer
    pub test_writer: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            file_info: false,
            log_spans: false,
            test_writer: false,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Enable span logging
    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    /// Route output through the writer `cargo test` captures per test
    pub fn with_test_writer(mut self) -> Self {
        self.test_writer = true;
        self
    }
}

/// Set up the logging system with the provided configuration.
///
/// The subscriber is installed globally, so this fails once a subscriber is
/// already in place.
pub fn setup_logging(config: LoggingConfig) -> HarnessResult<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let mut subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events);

    if config.file_info {
        subscriber = subscriber.with_file(true).with_line_number(true);
    }

    let installed = if config.test_writer {
        subscriber.with_test_writer().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| HarnessError::config(format!("logging already initialized: {e}")))
}

/// Install a default subscriber for tests, tolerating repeated calls.
///
/// Suites call this from every test body; only the first call wins.
pub fn init_test_logging() {
    let _ = setup_logging(LoggingConfig::default().with_test_writer());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_their_flags() {
        let config = LoggingConfig::new(Level::DEBUG)
            .with_file_info()
            .with_spans()
            .with_test_writer();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.file_info);
        assert!(config.log_spans);
        assert!(config.test_writer);
    }

    #[test]
    fn test_logging_is_reentrant() {
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn repeated_setup_is_an_error_not_a_panic() {
        init_test_logging();
        let err = setup_logging(LoggingConfig::new(Level::DEBUG).with_test_writer()).unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }
}
