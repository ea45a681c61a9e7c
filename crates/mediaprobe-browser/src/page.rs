//! Page objects for WebRTC test pages.
//!
//! [`WebRtcTestPage`] is what the functional tests talk to: it waits for
//! media events, negotiates WebRTC sessions against an endpoint, and checks
//! what the video element is actually showing. The page is reached through a
//! [`PageDriver`], so suites can swap the real WebDriver-backed driver for a
//! scripted one without touching test logic.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mediaprobe_client::{ClientError, IceCandidate, WebRtcEndpoint};
use mediaprobe_harness::Properties;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{BrowserError, BrowserResult};
use crate::webdriver::WebDriverSession;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// RGB color sampled from the video element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);

    /// Colors within this Euclidean RGB distance count as the same. Video
    /// decoding shifts pixel values, so exact comparison would flake.
    pub const SIMILARITY_THRESHOLD: f64 = 60.0;

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance in RGB space.
    pub fn distance(&self, other: Color) -> f64 {
        let dr = f64::from(self.r) - f64::from(other.r);
        let dg = f64::from(self.g) - f64::from(other.g);
        let db = f64::from(self.b) - f64::from(other.b);
        (dr * dr + dg * dg + db * db).sqrt()
    }

    pub fn is_similar(&self, other: Color) -> bool {
        self.distance(other) < Self::SIMILARITY_THRESHOLD
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Which media tracks a WebRTC session carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebRtcChannel {
    AudioOnly,
    VideoOnly,
    AudioAndVideo,
}

impl WebRtcChannel {
    pub fn has_audio(&self) -> bool {
        matches!(self, WebRtcChannel::AudioOnly | WebRtcChannel::AudioAndVideo)
    }

    pub fn has_video(&self) -> bool {
        matches!(self, WebRtcChannel::VideoOnly | WebRtcChannel::AudioAndVideo)
    }
}

/// Direction of a WebRTC session from the browser's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebRtcMode {
    SendOnly,
    RcvOnly,
    SendRcv,
}

impl WebRtcMode {
    pub fn as_js(&self) -> &'static str {
        match self {
            WebRtcMode::SendOnly => "sendonly",
            WebRtcMode::RcvOnly => "recvonly",
            WebRtcMode::SendRcv => "sendrecv",
        }
    }
}

/// The operations a test page must support, whoever drives it.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Registers a listener for a media event on the page's video element.
    async fn subscribe_event(&self, event: &str) -> BrowserResult<()>;

    /// True once a subscribed event has fired.
    async fn poll_event(&self, event: &str) -> BrowserResult<bool>;

    /// Creates an SDP offer for the given tracks and direction.
    async fn create_offer(&self, channel: WebRtcChannel, mode: WebRtcMode) -> BrowserResult<String>;

    /// Applies the remote SDP answer.
    async fn apply_answer(&self, answer: &str) -> BrowserResult<()>;

    /// ICE candidates the browser gathered since the last call.
    async fn local_candidates(&self) -> BrowserResult<Vec<IceCandidate>>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> BrowserResult<()>;

    /// Color at the center of the video element.
    async fn current_color(&self) -> BrowserResult<Color>;

    /// Playback clock of the video element, in seconds.
    async fn current_time(&self) -> BrowserResult<f64>;

    /// Reloads the page, dropping all page state.
    async fn reload(&self) -> BrowserResult<()>;
}

// The test page ships its own helpers (webrtc.js / video-utils.js); these
// snippets only call into them.
const SUBSCRIBE_EVENT_JS: &str = "\
var event = arguments[0];\n\
window._events = window._events || {};\n\
document.getElementById('video').addEventListener(event, function () {\n\
  window._events[event] = true;\n\
}, false);";

const POLL_EVENT_JS: &str = "return !!(window._events && window._events[arguments[0]]);";

const CREATE_OFFER_JS: &str = "return window.webrtc.createOffer(arguments[0], arguments[1]);";

const APPLY_ANSWER_JS: &str = "window.webrtc.processAnswer(arguments[0]);";

const DRAIN_CANDIDATES_JS: &str = "return window.webrtc.drainCandidates();";

const ADD_CANDIDATE_JS: &str = "window.webrtc.addIceCandidate(arguments[0]);";

const CURRENT_COLOR_JS: &str = "return window.videoUtils.currentColor('video');";

const CURRENT_TIME_JS: &str = "return document.getElementById('video').currentTime;";

/// Drives a real browser page through a WebDriver session.
pub struct WebDriverPageDriver {
    session: WebDriverSession,
    page_url: String,
}

impl WebDriverPageDriver {
    /// Navigates the session to the test page.
    pub async fn open(session: WebDriverSession, page_url: impl Into<String>) -> BrowserResult<Self> {
        let page_url = page_url.into();
        session.navigate(&page_url).await?;
        Ok(Self { session, page_url })
    }

    pub fn session(&self) -> &WebDriverSession {
        &self.session
    }

    /// Closes the underlying browser session.
    pub async fn close(self) -> BrowserResult<()> {
        self.session.delete_session().await
    }
}

#[async_trait]
impl PageDriver for WebDriverPageDriver {
    async fn subscribe_event(&self, event: &str) -> BrowserResult<()> {
        self.session
            .execute_script(SUBSCRIBE_EVENT_JS, vec![json!(event)])
            .await
            .map(drop)
    }

    async fn poll_event(&self, event: &str) -> BrowserResult<bool> {
        let value = self.session.execute_script(POLL_EVENT_JS, vec![json!(event)]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn create_offer(&self, channel: WebRtcChannel, mode: WebRtcMode) -> BrowserResult<String> {
        let constraints = json!({"audio": channel.has_audio(), "video": channel.has_video()});
        let value = self
            .session
            .execute_script(CREATE_OFFER_JS, vec![constraints, json!(mode.as_js())])
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::page("page returned no SDP offer"))
    }

    async fn apply_answer(&self, answer: &str) -> BrowserResult<()> {
        self.session
            .execute_script(APPLY_ANSWER_JS, vec![json!(answer)])
            .await
            .map(drop)
    }

    async fn local_candidates(&self) -> BrowserResult<Vec<IceCandidate>> {
        let value = self.session.execute_script(DRAIN_CANDIDATES_JS, vec![]).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> BrowserResult<()> {
        let value = serde_json::to_value(&candidate)?;
        self.session.execute_script(ADD_CANDIDATE_JS, vec![value]).await.map(drop)
    }

    async fn current_color(&self) -> BrowserResult<Color> {
        let value = self.session.execute_script(CURRENT_COLOR_JS, vec![]).await?;
        let parts: Vec<f64> = serde_json::from_value(value)?;
        if parts.len() < 3 {
            return Err(BrowserError::page("page returned no color sample"));
        }
        let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        Ok(Color::new(channel(parts[0]), channel(parts[1]), channel(parts[2])))
    }

    async fn current_time(&self) -> BrowserResult<f64> {
        let value = self.session.execute_script(CURRENT_TIME_JS, vec![]).await?;
        value
            .as_f64()
            .ok_or_else(|| BrowserError::page("video element has no playback clock"))
    }

    async fn reload(&self) -> BrowserResult<()> {
        self.session.navigate(&self.page_url).await
    }
}

/// A loaded WebRTC test page plus the waits and checks the suites assert
/// with. Timeouts come from `test.url.timeout`.
pub struct WebRtcTestPage<D> {
    driver: D,
    timeout: Duration,
    time_tolerance: f64,
}

impl<D: PageDriver> WebRtcTestPage<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            timeout: Duration::from_secs(30),
            time_tolerance: 0.25,
        }
    }

    /// Page with the wait timeout taken from the test properties.
    pub fn from_properties(driver: D, props: &Properties) -> BrowserResult<Self> {
        let mut page = Self::new(driver);
        page.timeout = Duration::from_secs(props.url_timeout_secs()?);
        Ok(page)
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Relative tolerance used by [`WebRtcTestPage::compare_time`].
    pub fn time_tolerance(&self) -> f64 {
        self.time_tolerance
    }

    pub fn set_time_tolerance(&mut self, tolerance: f64) {
        self.time_tolerance = tolerance;
    }

    /// Registers interest in a media event; pair with
    /// [`WebRtcTestPage::wait_for_event`].
    pub async fn subscribe_events(&self, event: &str) -> BrowserResult<()> {
        debug!(event, "subscribing to page event");
        self.driver.subscribe_event(event).await
    }

    /// Waits for a subscribed event, returning whether it fired within the
    /// page timeout.
    pub async fn wait_for_event(&self, event: &str) -> BrowserResult<bool> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if self.driver.poll_event(event).await? {
                trace!(event, "page event fired");
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(EVENT_POLL_INTERVAL).await;
        }
    }

    /// Negotiates a WebRTC session between the page and `endpoint`.
    ///
    /// Server candidate events are subscribed before gathering starts, so
    /// none can be lost; candidates are forwarded both ways until the server
    /// reports gathering done.
    pub async fn init_webrtc(
        &self,
        endpoint: &WebRtcEndpoint,
        channel: WebRtcChannel,
        mode: WebRtcMode,
    ) -> BrowserResult<()> {
        let mut found = endpoint.subscribe_ice_candidate_found().await?;
        let mut done = endpoint.subscribe_ice_gathering_done().await?;

        let offer = self.driver.create_offer(channel, mode).await?;
        let answer = endpoint.process_offer(&offer).await?;
        self.driver.apply_answer(&answer).await?;

        for candidate in self.driver.local_candidates().await? {
            endpoint.add_ice_candidate(&candidate).await?;
        }
        endpoint.gather_candidates().await?;

        let deadline = Instant::now() + self.timeout;
        let mut gathering_done = false;
        while !gathering_done {
            tokio::select! {
                event = found.next() => match event {
                    Some(event) => self.forward_candidate(&event.data).await?,
                    // The streams only end when the control connection died;
                    // that is a failed negotiation, not finished gathering.
                    None => return Err(ClientError::ConnectionClosed.into()),
                },
                event = done.next() => match event {
                    Some(_) => gathering_done = true,
                    None => return Err(ClientError::ConnectionClosed.into()),
                },
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(BrowserError::timeout("ICE gathering", self.timeout));
                }
            }
        }
        // Candidates that arrived just before the done event are still owed
        // to the page.
        while let Some(event) = found.wait(Duration::from_millis(50)).await {
            self.forward_candidate(&event.data).await?;
        }

        debug!(?channel, ?mode, "webrtc session negotiated");
        Ok(())
    }

    async fn forward_candidate(&self, data: &Value) -> BrowserResult<()> {
        let candidate: IceCandidate = serde_json::from_value(data["candidate"].clone())?;
        self.driver.add_remote_candidate(candidate).await
    }

    /// Waits until the video shows `expected`, returning whether it did
    /// within the page timeout.
    pub async fn similar_color(&self, expected: Color) -> BrowserResult<bool> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let current = self.driver.current_color().await?;
            if expected.is_similar(current) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!(%expected, %current, distance = expected.distance(current), "color never matched");
                return Ok(false);
            }
            tokio::time::sleep(EVENT_POLL_INTERVAL).await;
        }
    }

    pub async fn current_time(&self) -> BrowserResult<f64> {
        self.driver.current_time().await
    }

    /// True when `actual` is within the relative tolerance of `expected`.
    /// Playback clocks lag the wall clock, so exact comparison would flake.
    pub fn compare_time(&self, expected_secs: f64, actual_secs: f64) -> bool {
        (expected_secs - actual_secs).abs() <= expected_secs * self.time_tolerance
    }

    pub async fn reload(&self) -> BrowserResult<()> {
        self.driver.reload().await
    }
}
