//! Seek suite: repeated position changes, bounded by the configured
//! repetition count, must land exactly and still reach end of stream.

use std::time::{Duration, Instant};

use mediaprobe_browser::{Color, WebRtcChannel, WebRtcMode};
use mediaprobe_client::{FakeServerConfig, MediaElement, MediaPipeline};
use mediaprobe_functional_tests::{FunctionalTest, release_on_event};
use mediaprobe_harness::{EventLatch, keys};

const MEDIA_DURATION: Duration = Duration::from_millis(400);

#[tokio::test]
async fn seek_cycles_run_the_configured_number_of_times() {
    let mut fx = FunctionalTest::start(
        FakeServerConfig::default().with_default_duration(MEDIA_DURATION),
    )
    .await
    .unwrap();
    fx.props_mut().set(keys::TEST_SEEK_REPETITIONS_PROP, "6");
    let repetitions = fx.props().seek_repetitions().unwrap();
    assert_eq!(repetitions, 6);

    let pipeline = MediaPipeline::create(fx.client()).await.unwrap();
    let player = pipeline
        .create_player("file:///media/10sec/ball.webm")
        .build()
        .await
        .unwrap();
    let webrtc = pipeline.create_webrtc().recvonly().build().await.unwrap();
    player.connect(&webrtc).await.unwrap();

    let eos_latch = EventLatch::default();
    release_on_event(player.subscribe_end_of_stream().await.unwrap(), eos_latch.clone());

    let page = fx.page(Color::BLACK);
    page.subscribe_events("playing").await.unwrap();
    page.init_webrtc(&webrtc, WebRtcChannel::AudioAndVideo, WebRtcMode::RcvOnly)
        .await
        .unwrap();

    player.play().await.unwrap();
    assert!(
        page.wait_for_event("playing").await.unwrap(),
        "Not received media (timeout waiting playing event)"
    );

    // Seeks are checked paused so the position read back is exact.
    player.pause().await.unwrap();
    for repetition in 0..repetitions {
        let target = if repetition % 2 == 0 {
            Duration::from_millis(300)
        } else {
            Duration::from_millis(120)
        };
        player.set_position(target).await.unwrap();
        let position = player.position().await.unwrap();
        assert_eq!(
            position, target,
            "seek {repetition} landed at {position:?} instead of {target:?}"
        );
    }

    player.play().await.unwrap();
    assert!(
        eos_latch.wait(page.timeout()).await.is_released(),
        "Not received EOS event after seeking"
    );

    pipeline.release().await.unwrap();
    fx.shutdown().await.unwrap();
}

#[tokio::test]
async fn seeking_near_the_end_finishes_playback_early() {
    let fx = FunctionalTest::start(
        FakeServerConfig::default().with_default_duration(MEDIA_DURATION),
    )
    .await
    .unwrap();

    let pipeline = MediaPipeline::create(fx.client()).await.unwrap();
    let player = pipeline
        .create_player("file:///media/10sec/ball.webm")
        .build()
        .await
        .unwrap();

    let eos_latch = EventLatch::default();
    release_on_event(player.subscribe_end_of_stream().await.unwrap(), eos_latch.clone());

    let started = Instant::now();
    player.play().await.unwrap();
    player
        .set_position(MEDIA_DURATION - Duration::from_millis(50))
        .await
        .unwrap();

    assert!(
        eos_latch.wait(Duration::from_secs(2)).await.is_released(),
        "Not received EOS event after seeking near the end"
    );
    assert!(
        started.elapsed() < MEDIA_DURATION,
        "seek did not shorten the remaining play time"
    );

    pipeline.release().await.unwrap();
    fx.shutdown().await.unwrap();
}

#[tokio::test]
async fn seeking_past_the_end_clamps_to_the_clip_length() {
    let fx = FunctionalTest::start(
        FakeServerConfig::default().with_default_duration(MEDIA_DURATION),
    )
    .await
    .unwrap();

    let pipeline = MediaPipeline::create(fx.client()).await.unwrap();
    let player = pipeline
        .create_player("file:///media/10sec/ball.webm")
        .build()
        .await
        .unwrap();

    player.set_position(MEDIA_DURATION * 3).await.unwrap();
    assert_eq!(player.position().await.unwrap(), MEDIA_DURATION);

    pipeline.release().await.unwrap();
    fx.shutdown().await.unwrap();
}
