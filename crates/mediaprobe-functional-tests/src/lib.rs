//! Shared fixture for the functional suites in `tests/`.
//!
//! The suites run the scenario scripts end to end against the in-process
//! fake media server, with the browser replaced by [`SimulatedPage`]: a
//! [`PageDriver`] whose video element state is synthesized from the
//! server's monitor feed. Simulated media lasts milliseconds while the
//! page reports its clock against the nominal clip length, so the suites
//! keep asserting in seconds the way they would against real media.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mediaprobe_browser::{
    BrowserResult, Color, PageDriver, WebRtcChannel, WebRtcMode, WebRtcTestPage,
};
use mediaprobe_client::{
    EventSubscription, FakeMediaServer, FakeServerConfig, IceCandidate, MonitorEvent,
    MonitorEventKind, PipelineClient,
};
use mediaprobe_harness::{
    BrowserKind, BrowserScope, BrowserSpec, DEFAULT_BROWSER_ID, EventLatch, Properties,
    TestScenario, init_test_logging, keys,
};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

/// Play time the "10sec" test clips advertise, in seconds.
pub const NOMINAL_PLAYTIME_SECS: f64 = 10.0;

/// Everything a functional test needs: properties pointing at a scratch
/// workspace, a running fake media server and a connected client.
pub struct FunctionalTest {
    props: Properties,
    server: Arc<FakeMediaServer>,
    client: PipelineClient,
    _workspace: TempDir,
}

impl FunctionalTest {
    pub async fn start(config: FakeServerConfig) -> anyhow::Result<Self> {
        init_test_logging();
        let workspace = TempDir::new()?;
        let props = Properties::empty().with(
            keys::TEST_WORKSPACE_PROP,
            workspace.path().display().to_string(),
        );
        let server = Arc::new(FakeMediaServer::start_with(config).await?);
        let client = PipelineClient::connect(&server.ws_uri()).await?;
        debug!(uri = %server.ws_uri(), "functional fixture up");
        Ok(Self {
            props,
            server,
            client,
            _workspace: workspace,
        })
    }

    pub fn props(&self) -> &Properties {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut Properties {
        &mut self.props
    }

    pub fn client(&self) -> &PipelineClient {
        &self.client
    }

    pub fn server(&self) -> &FakeMediaServer {
        &self.server
    }

    /// Scenarios this run executes: the config file's executions section
    /// when present, otherwise the compiled-in `default`.
    pub fn scenarios(&self, default: TestScenario) -> anyhow::Result<Vec<TestScenario>> {
        Ok(TestScenario::from_executions(&self.props)?.unwrap_or_else(|| vec![default]))
    }

    /// A test page whose video shows `color` once media is flowing.
    pub fn page(&self, color: Color) -> WebRtcTestPage<SimulatedPage> {
        self.page_for(&default_browser(), color)
    }

    /// The page a scenario browser opens. The simulated driver behaves the
    /// same for every engine; the slot picks the id the page reports.
    pub fn page_for(&self, browser: &BrowserSpec, color: Color) -> WebRtcTestPage<SimulatedPage> {
        debug!(browser = %browser.id, kind = %browser.kind, scope = %browser.scope, "opening page");
        WebRtcTestPage::new(SimulatedPage::new(
            self.server.clone(),
            browser.id.clone(),
            color,
            NOMINAL_PLAYTIME_SECS,
        ))
    }

    /// Closes the control connection; the server dies with the fixture.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

/// Browser slot used when a test does not run scenario-driven.
fn default_browser() -> BrowserSpec {
    BrowserSpec::new(DEFAULT_BROWSER_ID, BrowserKind::Chrome, BrowserScope::Local)
}

/// Releases `latch` when the subscription delivers its first event. This is
/// how the suites arm their end-of-stream latches before starting playback.
pub fn release_on_event(mut subscription: EventSubscription, latch: EventLatch) {
    tokio::spawn(async move {
        if subscription.next().await.is_some() {
            latch.release();
        }
    });
}

#[derive(Default)]
struct PageState {
    subscribed: HashSet<String>,
    fired: HashSet<String>,
    player: Option<String>,
    answer: Option<String>,
    remote_candidates: Vec<IceCandidate>,
    candidates_drained: bool,
}

/// A page driver with no browser behind it.
///
/// Media events come from the fake server's monitor feed ("playing" when a
/// player starts, "ended" at end of stream), the video color is the
/// configured one once media has flowed, and the playback clock reports the
/// played fraction scaled to the nominal clip length.
pub struct SimulatedPage {
    server: Arc<FakeMediaServer>,
    browser: String,
    color: Color,
    playtime: f64,
    state: Arc<Mutex<PageState>>,
    watcher: JoinHandle<()>,
}

impl SimulatedPage {
    fn new(server: Arc<FakeMediaServer>, browser: String, color: Color, playtime: f64) -> Self {
        let state = Arc::new(Mutex::new(PageState::default()));
        let watcher = spawn_monitor_watcher(server.monitor(), state.clone());
        Self {
            server,
            browser,
            color,
            playtime,
            state,
            watcher,
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Id of the scenario browser slot this page stands in for.
    pub fn browser(&self) -> &str {
        &self.browser
    }

    /// The SDP answer the page last applied, if any.
    pub fn answer(&self) -> Option<String> {
        self.state().answer.clone()
    }

    /// Server candidates forwarded to the page so far.
    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.state().remote_candidates.clone()
    }
}

impl Drop for SimulatedPage {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

fn spawn_monitor_watcher(
    mut monitor: broadcast::Receiver<MonitorEvent>,
    state: Arc<Mutex<PageState>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match monitor.recv().await {
                Ok(event) => {
                    let mut state = match state.lock() {
                        Ok(state) => state,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    match event.kind {
                        MonitorEventKind::Playing => {
                            state.fired.insert("playing".to_string());
                            state.player = Some(event.object);
                        }
                        MonitorEventKind::EndOfStream => {
                            state.fired.insert("ended".to_string());
                        }
                        _ => {}
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn synthetic_offer(channel: WebRtcChannel) -> String {
    let mut offer = String::from("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n");
    if channel.has_audio() {
        offer.push_str("m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n");
    }
    if channel.has_video() {
        offer.push_str("m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=rtpmap:96 VP8/90000\r\n");
    }
    offer
}

#[async_trait]
impl PageDriver for SimulatedPage {
    async fn subscribe_event(&self, event: &str) -> BrowserResult<()> {
        self.state().subscribed.insert(event.to_string());
        Ok(())
    }

    async fn poll_event(&self, event: &str) -> BrowserResult<bool> {
        let state = self.state();
        Ok(state.subscribed.contains(event) && state.fired.contains(event))
    }

    async fn create_offer(&self, channel: WebRtcChannel, _mode: WebRtcMode) -> BrowserResult<String> {
        Ok(synthetic_offer(channel))
    }

    async fn apply_answer(&self, answer: &str) -> BrowserResult<()> {
        self.state().answer = Some(answer.to_string());
        Ok(())
    }

    async fn local_candidates(&self) -> BrowserResult<Vec<IceCandidate>> {
        let mut state = self.state();
        if state.candidates_drained {
            return Ok(Vec::new());
        }
        state.candidates_drained = true;
        Ok(vec![IceCandidate {
            candidate: "candidate:1 1 UDP 2122252543 192.168.1.50 51472 typ host".to_string(),
            sdp_mid: "0".to_string(),
            sdp_m_line_index: 0,
        }])
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> BrowserResult<()> {
        self.state().remote_candidates.push(candidate);
        Ok(())
    }

    async fn current_color(&self) -> BrowserResult<Color> {
        let playing = self.state().fired.contains("playing");
        Ok(if playing { self.color } else { Color::BLACK })
    }

    async fn current_time(&self) -> BrowserResult<f64> {
        let player = self.state().player.clone();
        let Some(player) = player else {
            return Ok(0.0);
        };
        Ok(self.server.media_fraction(&player).unwrap_or(0.0) * self.playtime)
    }

    async fn reload(&self) -> BrowserResult<()> {
        *self.state() = PageState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_offer_carries_the_requested_tracks() {
        let audio = synthetic_offer(WebRtcChannel::AudioOnly);
        assert!(audio.starts_with("v=0"));
        assert!(audio.contains("m=audio"));
        assert!(!audio.contains("m=video"));

        let both = synthetic_offer(WebRtcChannel::AudioAndVideo);
        assert!(both.contains("m=audio"));
        assert!(both.contains("m=video"));
    }

    #[tokio::test]
    async fn page_shows_nothing_before_media_flows() {
        let fx = FunctionalTest::start(FakeServerConfig::default()).await.unwrap();
        let page = fx.page(Color::GREEN);
        assert_eq!(page.driver().current_color().await.unwrap(), Color::BLACK);
        assert_eq!(page.driver().current_time().await.unwrap(), 0.0);
        assert!(!page.driver().poll_event("playing").await.unwrap());
        fx.shutdown().await.unwrap();
    }
}
