//! Connection lifecycle: sessions, keepalive, teardown.

use std::collections::HashSet;
use std::time::Duration;

use mediaprobe_client::{
    ClientConfig, ClientError, FakeMediaServer, MediaPipeline, PipelineClient,
};
use mediaprobe_harness::init_test_logging;

#[tokio::test]
async fn ping_answers_pong() {
    init_test_logging();
    let server = FakeMediaServer::start().await.unwrap();
    let client = PipelineClient::connect(&server.ws_uri()).await.unwrap();
    client.ping().await.unwrap();
}

#[tokio::test]
async fn session_is_assigned_on_first_request() {
    init_test_logging();
    let server = FakeMediaServer::start().await.unwrap();
    let client = PipelineClient::connect(&server.ws_uri()).await.unwrap();

    assert!(client.session_id().await.is_none());
    MediaPipeline::create(&client).await.unwrap();
    let session = client.session_id().await.expect("no session id");

    // Subsequent requests keep the same session.
    MediaPipeline::create(&client).await.unwrap();
    assert_eq!(client.session_id().await.as_deref(), Some(session.as_str()));
}

#[tokio::test]
async fn concurrent_requests_all_get_their_own_answer() {
    init_test_logging();
    let server = FakeMediaServer::start().await.unwrap();
    let client = PipelineClient::connect(&server.ws_uri()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            MediaPipeline::create(&client).await.map(|p| p.object().to_string())
        }));
    }

    let mut refs = HashSet::new();
    for handle in handles {
        let object = handle.await.unwrap().unwrap();
        assert!(refs.insert(object), "duplicate object reference");
    }
    assert_eq!(server.object_count(), 10);
}

#[tokio::test]
async fn server_sees_the_connection_come_and_go() {
    init_test_logging();
    let server = FakeMediaServer::start().await.unwrap();
    assert_eq!(server.connection_count(), 0);

    let client = PipelineClient::connect(&server.ws_uri()).await.unwrap();
    assert_eq!(server.connection_count(), 1);
    let peer = server.connections()[0].peer;
    assert!(peer.ip().is_loopback());

    client.close().await.unwrap();
    // The server notices the close asynchronously.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while server.connection_count() != 0 {
        assert!(tokio::time::Instant::now() < deadline, "connection never went away");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn requests_after_close_fail_fast() {
    init_test_logging();
    let server = FakeMediaServer::start().await.unwrap();
    let client = PipelineClient::connect(&server.ws_uri()).await.unwrap();

    client.close().await.unwrap();
    let err = MediaPipeline::create(&client).await.unwrap_err();
    assert!(matches!(err, ClientError::ConnectionClosed), "got {err}");
}

#[tokio::test]
async fn keepalive_keeps_the_connection_usable() {
    init_test_logging();
    let server = FakeMediaServer::start().await.unwrap();
    let config = ClientConfig {
        request_timeout: Duration::from_secs(5),
        keepalive: Some(Duration::from_millis(50)),
    };
    let client = PipelineClient::connect_with(&server.ws_uri(), config).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!client.is_closed());
    MediaPipeline::create(&client).await.unwrap();
}
