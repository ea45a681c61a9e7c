//! Error types for the harness library

use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur in the test harness
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A property override could not be parsed as the requested type
    #[error("Invalid value for property '{key}': {message}")]
    InvalidProperty { key: String, message: String },

    /// The JSON config file exists but is malformed
    #[error("Malformed config file '{path}': {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// I/O error reading a config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown scenario or browser identifier
    #[error("Unknown scenario value: {value}")]
    UnknownScenario { value: String },
}

impl HarnessError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid-property error naming the offending key
    pub fn invalid_property(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidProperty {
            key: key.into(),
            message: message.into(),
        }
    }
}
