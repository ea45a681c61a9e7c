//! Error types for browser automation.

use std::time::Duration;

use mediaprobe_client::ClientError;
use mediaprobe_harness::HarnessError;
use thiserror::Error;

pub type BrowserResult<T> = Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    /// The WebDriver hub or browser rejected a command.
    #[error("WebDriver error: {message}")]
    WebDriver { message: String },

    /// Something on the page itself went wrong, such as a script failing.
    #[error("Page error: {message}")]
    Page { message: String },

    /// A bounded wait ran out.
    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Errors from the media-server side of a WebRTC exchange.
    #[error("Media client error: {0}")]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] HarnessError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrowserError {
    pub fn webdriver(message: impl Into<String>) -> Self {
        Self::WebDriver { message: message.into() }
    }

    pub fn page(message: impl Into<String>) -> Self {
        Self::Page { message: message.into() }
    }

    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout { what: what.into(), timeout }
    }
}
