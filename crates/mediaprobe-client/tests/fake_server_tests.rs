//! Behavior of the fake media server as seen through the public client API.

use std::time::{Duration, Instant};

use mediaprobe_client::{
    FakeMediaServer, FakeServerConfig, IceCandidate, MediaElement, MediaPipeline, MediaProfile,
    PipelineClient, ClientError, events,
};
use mediaprobe_harness::init_test_logging;
use serde_json::json;

async fn start(config: FakeServerConfig) -> (FakeMediaServer, PipelineClient) {
    init_test_logging();
    let server = FakeMediaServer::start_with(config).await.unwrap();
    let client = PipelineClient::connect(&server.ws_uri()).await.unwrap();
    (server, client)
}

#[tokio::test]
async fn player_fires_end_of_stream_exactly_once() {
    let (_server, client) =
        start(FakeServerConfig::default().with_default_duration(Duration::from_millis(100))).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();
    let mut eos = player.subscribe_end_of_stream().await.unwrap();

    player.play().await.unwrap();
    let event = eos.wait(Duration::from_secs(2)).await.expect("no EndOfStream event");
    assert_eq!(event.object, player.object());
    assert_eq!(event.event_type, events::END_OF_STREAM);
    assert_eq!(event.data["source"], player.object());

    // One play, one terminal event.
    assert!(eos.wait(Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn pause_holds_back_end_of_stream() {
    let (_server, client) =
        start(FakeServerConfig::default().with_default_duration(Duration::from_millis(300))).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();
    let mut eos = player.subscribe_end_of_stream().await.unwrap();

    player.play().await.unwrap();
    player.pause().await.unwrap();

    // Paused playback never reaches the end, however long we wait.
    assert!(eos.wait(Duration::from_millis(600)).await.is_none());

    player.play().await.unwrap();
    assert!(eos.wait(Duration::from_secs(2)).await.is_some());
}

#[tokio::test]
async fn stop_rewinds_playback() {
    let (server, client) =
        start(FakeServerConfig::default().with_default_duration(Duration::from_millis(200))).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();
    let mut eos = player.subscribe_end_of_stream().await.unwrap();

    player.play().await.unwrap();
    player.stop().await.unwrap();
    assert_eq!(player.position().await.unwrap(), Duration::ZERO);
    assert!(eos.wait(Duration::from_millis(400)).await.is_none());

    // A fresh play runs the full media again.
    let restarted = Instant::now();
    player.play().await.unwrap();
    assert!(eos.wait(Duration::from_secs(2)).await.is_some());
    assert!(restarted.elapsed() >= Duration::from_millis(200));
    assert_eq!(server.media_fraction(player.object()), Some(1.0));
}

#[tokio::test]
async fn seek_shortens_time_to_end_of_stream() {
    let (_server, client) =
        start(FakeServerConfig::default().with_default_duration(Duration::from_millis(500))).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();

    player.set_position(Duration::from_millis(400)).await.unwrap();
    assert_eq!(player.position().await.unwrap(), Duration::from_millis(400));

    let mut eos = player.subscribe_end_of_stream().await.unwrap();
    let started = Instant::now();
    player.play().await.unwrap();
    assert!(eos.wait(Duration::from_secs(2)).await.is_some());
    // Only the remaining 100ms should have played.
    assert!(started.elapsed() < Duration::from_millis(450));
}

#[tokio::test]
async fn per_uri_durations_override_the_default() {
    let config = FakeServerConfig::default()
        .with_default_duration(Duration::from_millis(100))
        .with_media_duration("http://files/long.webm", Duration::from_millis(400));
    let (_server, client) = start(config).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("http://files/long.webm").build().await.unwrap();
    let mut eos = player.subscribe_end_of_stream().await.unwrap();

    let started = Instant::now();
    player.play().await.unwrap();
    assert!(eos.wait(Duration::from_secs(2)).await.is_some());
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn releasing_a_pipeline_takes_its_elements_with_it() {
    let (server, client) = start(FakeServerConfig::default()).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();
    let recorder = pipeline.create_recorder("file:///tmp/out.webm").build().await.unwrap();
    assert_eq!(server.object_count(), 3);

    pipeline.release().await.unwrap();
    assert_eq!(server.object_count(), 0);
    assert!(!server.has_object(player.object()));

    let err = player.play().await.unwrap_err();
    assert!(err.is_object_not_found(), "expected object-not-found, got {err}");
    let err = recorder.record().await.unwrap_err();
    assert!(err.is_object_not_found());
    // Releasing again fails the same way.
    assert!(pipeline.release().await.unwrap_err().is_object_not_found());
}

#[tokio::test]
async fn releasing_an_element_leaves_its_pipeline_alive() {
    let (server, client) = start(FakeServerConfig::default()).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();

    player.release().await.unwrap();
    assert!(!server.has_object(player.object()));
    assert!(server.has_object(pipeline.object()));
    assert!(player.play().await.unwrap_err().is_object_not_found());

    // The pipeline still works for new elements.
    pipeline.create_player("file:///media/other.webm").build().await.unwrap();
}

#[tokio::test]
async fn recorder_reports_recording_and_stopped() {
    let (_server, client) = start(FakeServerConfig::default()).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let recorder = pipeline
        .create_recorder("file:///tmp/out.mp4")
        .with_media_profile(MediaProfile::Mp4)
        .build()
        .await
        .unwrap();

    let mut recording = recorder.subscribe_recording().await.unwrap();
    recorder.record().await.unwrap();
    let event = recording.wait(Duration::from_secs(1)).await.expect("no Recording event");
    assert_eq!(event.event_type, events::RECORDING);

    recorder.stop_and_wait(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn webrtc_answers_offers_and_gathers_candidates() {
    let (_server, client) = start(FakeServerConfig::default()).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let webrtc = pipeline.create_webrtc().recvonly().build().await.unwrap();

    // Subscribe before gathering so no candidate can slip past.
    let mut found = webrtc.subscribe_ice_candidate_found().await.unwrap();
    let mut done = webrtc.subscribe_ice_gathering_done().await.unwrap();

    let answer = webrtc
        .process_offer("v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n")
        .await
        .unwrap();
    assert!(answer.starts_with("v=0"));
    assert!(answer.contains("VP8"));

    webrtc.gather_candidates().await.unwrap();
    assert!(done.wait(Duration::from_secs(2)).await.is_some());

    let mut candidates = Vec::new();
    while let Some(event) = found.wait(Duration::from_millis(100)).await {
        let candidate: IceCandidate =
            serde_json::from_value(event.data["candidate"].clone()).unwrap();
        assert!(candidate.candidate.contains("typ host"));
        candidates.push(candidate);
    }
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].sdp_m_line_index, 0);
    assert_eq!(candidates[1].sdp_m_line_index, 1);

    webrtc
        .add_ice_candidate(&IceCandidate {
            candidate: "candidate:3 1 UDP 1686052607 192.0.2.1 50004 typ srflx".to_string(),
            sdp_mid: "0".to_string(),
            sdp_m_line_index: 0,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn garbage_offers_are_rejected() {
    let (_server, client) = start(FakeServerConfig::default()).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let webrtc = pipeline.create_webrtc().build().await.unwrap();

    let err = webrtc.process_offer("not an sdp").await.unwrap_err();
    assert!(matches!(err, ClientError::Server { code: -32602, .. }), "got {err}");
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let (_server, client) =
        start(FakeServerConfig::default().with_default_duration(Duration::from_millis(100))).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();

    let eos = player.subscribe_end_of_stream().await.unwrap();
    let mut kept = player.subscribe_end_of_stream().await.unwrap();
    let dropped_id = eos.id().to_string();
    eos.unsubscribe().await.unwrap();

    player.play().await.unwrap();
    // The surviving subscription still gets the event.
    assert!(kept.wait(Duration::from_secs(2)).await.is_some());

    // Subscription ids are never reused.
    let replacement = client
        .subscribe(player.object(), events::END_OF_STREAM)
        .await
        .unwrap();
    assert_ne!(replacement.id(), dropped_id);
}

#[tokio::test]
async fn duplicate_subscriptions_each_get_the_event() {
    let (_server, client) =
        start(FakeServerConfig::default().with_default_duration(Duration::from_millis(100))).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();

    let mut first = player.subscribe_end_of_stream().await.unwrap();
    let mut second = player.subscribe_end_of_stream().await.unwrap();
    assert_ne!(first.id(), second.id());

    player.play().await.unwrap();
    assert!(first.wait(Duration::from_secs(2)).await.is_some());
    assert!(second.wait(Duration::from_secs(2)).await.is_some());
}

#[tokio::test]
async fn elements_connect_into_a_chain() {
    let (server, client) = start(FakeServerConfig::default()).await;

    let pipeline = MediaPipeline::create(&client).await.unwrap();
    let player = pipeline.create_player("file:///media/clip.webm").build().await.unwrap();
    let webrtc = pipeline.create_webrtc().build().await.unwrap();
    let recorder = pipeline.create_recorder("file:///tmp/out.webm").build().await.unwrap();

    player.connect(&webrtc).await.unwrap();
    player.connect(&recorder).await.unwrap();

    // Both edges are on record, in connect order.
    assert_eq!(
        server.sinks_of(player.object()),
        Some(vec![webrtc.object().to_string(), recorder.object().to_string()])
    );
    assert_eq!(server.sinks_of(webrtc.object()), Some(Vec::new()));
    assert_eq!(server.sinks_of("no_such_object"), None);

    // Connecting to something that does not exist is refused, and leaves no
    // trace in the topology.
    let err = client
        .invoke(player.object(), "connect", json!({"sink": "no_such_object"}))
        .await
        .unwrap_err();
    assert!(err.is_object_not_found());
    assert_eq!(server.sinks_of(player.object()).map(|sinks| sinks.len()), Some(2));
}
