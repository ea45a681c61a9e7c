//! Minimal W3C WebDriver wire client.
//!
//! Only the handful of commands the test pages need: session creation with
//! fake-media capabilities, navigation, synchronous script execution and
//! session teardown. Everything goes through the hub configured in the test
//! properties, which may be a real grid or the in-process fake used by the
//! tests of this crate.

use std::time::Duration;

use mediaprobe_harness::{BrowserKind, Properties};
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::{BrowserError, BrowserResult};

/// Where the WebDriver hub lives and how patient we are with it.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    pub hub_url: String,
    pub session_timeout: Duration,
}

impl WebDriverConfig {
    /// Reads hub address, port and timeouts from the test properties.
    pub fn from_properties(props: &Properties) -> BrowserResult<Self> {
        Ok(Self {
            hub_url: props.hub_url()?,
            session_timeout: Duration::from_secs(props.remote_driver_timeout_secs()?),
        })
    }
}

/// Capabilities requested for a browser, with media capture faked so WebRTC
/// tests run headless without devices or permission prompts.
pub fn capabilities_for(kind: BrowserKind) -> Value {
    match kind {
        BrowserKind::Chrome => json!({
            "browserName": "chrome",
            "goog:chromeOptions": {
                "args": [
                    "--use-fake-ui-for-media-stream",
                    "--use-fake-device-for-media-stream",
                ],
            },
        }),
        BrowserKind::Firefox => json!({
            "browserName": "firefox",
            "moz:firefoxOptions": {
                "prefs": {
                    "media.navigator.permission.disabled": true,
                    "media.navigator.streams.fake": true,
                },
            },
        }),
    }
}

/// One WebDriver session against the hub.
pub struct WebDriverSession {
    http: reqwest::Client,
    base: String,
    session_id: String,
}

impl WebDriverSession {
    /// Opens a new session for `kind`.
    pub async fn new_session(config: &WebDriverConfig, kind: BrowserKind) -> BrowserResult<Self> {
        let http = reqwest::Client::builder().timeout(config.session_timeout).build()?;
        let body = json!({"capabilities": {"alwaysMatch": capabilities_for(kind)}});
        let response: Value = http
            .post(format!("{}/session", config.hub_url))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let Some(session_id) = response["value"]["sessionId"].as_str() else {
            return Err(BrowserError::webdriver(format!(
                "session request not honored: {response}"
            )));
        };
        debug!(%kind, session = session_id, "webdriver session opened");
        Ok(Self {
            http,
            base: config.hub_url.clone(),
            session_id: session_id.to_string(),
        })
    }

    /// Asks the hub whether it is ready to take sessions.
    pub async fn hub_ready(config: &WebDriverConfig) -> BrowserResult<bool> {
        let http = reqwest::Client::builder().timeout(config.session_timeout).build()?;
        let response: Value = http
            .get(format!("{}/status", config.hub_url))
            .send()
            .await?
            .json()
            .await?;
        Ok(response["value"]["ready"].as_bool().unwrap_or(false))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Loads `url` in the browser.
    pub async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.post("url", json!({"url": url})).await.map(drop)
    }

    /// Runs a script synchronously in the page and returns its value.
    pub async fn execute_script(&self, script: &str, args: Vec<Value>) -> BrowserResult<Value> {
        self.post("execute/sync", json!({"script": script, "args": args})).await
    }

    /// Ends the session, closing the browser.
    pub async fn delete_session(self) -> BrowserResult<()> {
        let url = format!("{}/session/{}", self.base, self.session_id);
        let response = self.http.delete(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BrowserError::webdriver(format!("session delete failed with {status}")));
        }
        debug!(session = %self.session_id, "webdriver session closed");
        Ok(())
    }

    async fn post(&self, path: &str, body: Value) -> BrowserResult<Value> {
        let url = format!("{}/session/{}/{}", self.base, self.session_id, path);
        trace!(%url, "webdriver command");
        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() {
            let message = payload["value"]["message"].as_str().unwrap_or("unknown failure");
            return Err(BrowserError::webdriver(format!("{path} failed: {message}")));
        }
        Ok(payload["value"].clone())
    }
}
