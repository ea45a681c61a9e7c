//! End-to-end negotiation tests: a scripted page against the in-process
//! media server, with no browser in the loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mediaprobe_browser::{
    BrowserError, BrowserResult, Color, PageDriver, WebRtcChannel, WebRtcMode, WebRtcTestPage,
};
use mediaprobe_client::transport::{Transport, TransportEvent};
use mediaprobe_client::{
    ClientConfig, ClientError, ClientResult, FakeMediaServer, IceCandidate, MediaPipeline,
    PipelineClient,
};
use mediaprobe_harness::init_test_logging;
use serde_json::{Value, json};
use tokio::sync::mpsc;

const PAGE_OFFER: &str = "v=0\r\n\
o=- 4611731400430051336 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
a=rtpmap:96 VP8/90000\r\n";

#[derive(Default)]
struct PageState {
    events: HashMap<String, bool>,
    offers: usize,
    answer: Option<String>,
    candidates_drained: bool,
    remote_candidates: Vec<IceCandidate>,
    color: Option<Color>,
    time: f64,
}

/// A page that behaves like the real one without a browser behind it.
#[derive(Default)]
struct ScriptedPage {
    state: Mutex<PageState>,
}

impl ScriptedPage {
    fn state(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn subscribe_event(&self, event: &str) -> BrowserResult<()> {
        self.state().events.insert(event.to_string(), false);
        Ok(())
    }

    async fn poll_event(&self, event: &str) -> BrowserResult<bool> {
        Ok(self.state().events.get(event).copied().unwrap_or(false))
    }

    async fn create_offer(&self, _channel: WebRtcChannel, _mode: WebRtcMode) -> BrowserResult<String> {
        self.state().offers += 1;
        Ok(PAGE_OFFER.to_string())
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
        Ok(self.state().color.unwrap_or(Color::BLACK))
    }

    async fn current_time(&self) -> BrowserResult<f64> {
        Ok(self.state().time)
    }

    async fn reload(&self) -> BrowserResult<()> {
        *self.state() = PageState::default();
        Ok(())
    }
}

#[tokio::test]
async fn init_webrtc_negotiates_with_the_server() {
    init_test_logging();
    let server = FakeMediaServer::start().await.unwrap();
    let client = PipelineClient::connect(&server.ws_uri()).await.unwrap();
    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let webrtc = pipeline.create_webrtc().recvonly().build().await.unwrap();

    let page = WebRtcTestPage::new(ScriptedPage::default());
    page.init_webrtc(&webrtc, WebRtcChannel::AudioAndVideo, WebRtcMode::RcvOnly)
        .await
        .unwrap();

    let state = page.driver().state();
    assert_eq!(state.offers, 1);
    let answer = state.answer.as_deref().unwrap();
    assert!(answer.starts_with("v=0"));
    assert!(answer.contains("VP8"));
    // The server gathers two candidates; both must reach the page.
    assert_eq!(state.remote_candidates.len(), 2);
    assert_eq!(state.remote_candidates[0].sdp_m_line_index, 0);
    assert_eq!(state.remote_candidates[1].sdp_m_line_index, 1);
    assert!(state.remote_candidates[0].candidate.contains("typ host"));
    drop(state);

    pipeline.release().await.unwrap();
    client.close().await.unwrap();
}

/// Answers every request in-process, then drops the connection right after
/// acknowledging the gather call.
struct DyingServerTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    closed: AtomicBool,
}

#[async_trait]
impl Transport for DyingServerTransport {
    async fn send(&self, text: String) -> ClientResult<()> {
        let request: Value = serde_json::from_str(&text).unwrap();
        let id = request["id"].as_u64().unwrap();
        let method = request["method"].as_str().unwrap();
        let operation = request["params"]["operation"].as_str().unwrap_or_default();

        let result = match (method, operation) {
            ("create", _) => json!({"value": format!("obj_{id}"), "sessionId": "sess_1"}),
            ("subscribe", _) => json!({"value": format!("sub_{id}")}),
            ("invoke", "processOffer") => json!({"value": "v=0\r\ns=answer\r\n"}),
            _ => json!({}),
        };
        let frame = json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string();
        let _ = self.events.send(TransportEvent::Message(frame));

        if operation == "gatherCandidates" {
            let _ = self.events.send(TransportEvent::Closed);
        }
        Ok(())
    }

    async fn close(&self) -> ClientResult<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

#[tokio::test]
async fn init_webrtc_fails_when_the_connection_dies_mid_gathering() {
    init_test_logging();
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = Arc::new(DyingServerTransport {
        events: tx,
        closed: AtomicBool::new(false),
    });
    let client = PipelineClient::with_transport(transport, rx, ClientConfig::default());

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let webrtc = pipeline.create_webrtc().recvonly().build().await.unwrap();

    let page = WebRtcTestPage::new(ScriptedPage::default());
    let err = page
        .init_webrtc(&webrtc, WebRtcChannel::AudioAndVideo, WebRtcMode::RcvOnly)
        .await
        .unwrap_err();
    assert!(
        matches!(err, BrowserError::Client(ClientError::ConnectionClosed)),
        "expected a closed-connection error, got {err}"
    );
}

#[tokio::test]
async fn page_waits_see_late_events_and_colors() {
    init_test_logging();
    let mut page = WebRtcTestPage::new(ScriptedPage::default());
    page.set_timeout(Duration::from_secs(2));

    page.subscribe_events("playing").await.unwrap();
    assert!(!page.driver().poll_event("playing").await.unwrap());

    // Flip the page state from the side while the waits are polling.
    let flip = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        let mut state = page.driver().state();
        state.events.insert("playing".to_string(), true);
        state.color = Some(Color::new(10, 240, 12));
    };
    let waits = async {
        assert!(page.wait_for_event("playing").await.unwrap());
        assert!(page.similar_color(Color::GREEN).await.unwrap());
    };
    tokio::join!(flip, waits);

    page.set_timeout(Duration::from_millis(300));
    assert!(!page.similar_color(Color::RED).await.unwrap());
}

#[tokio::test]
async fn reload_clears_page_state() {
    init_test_logging();
    let page = WebRtcTestPage::new(ScriptedPage::default());
    page.subscribe_events("ended").await.unwrap();
    page.driver().state().events.insert("ended".to_string(), true);
    assert!(page.wait_for_event("ended").await.unwrap());

    page.reload().await.unwrap();
    assert!(!page.driver().poll_event("ended").await.unwrap());
}
