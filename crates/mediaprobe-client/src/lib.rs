//! Client for the media-server control protocol.
//!
//! The server exposes media pipelines over a JSON-RPC 2.0 WebSocket
//! endpoint. [`PipelineClient`] owns one such connection; the typed wrappers
//! in [`pipeline`] build object graphs on top of it, in the shape the tests
//! use them:
//!
//! ```no_run
//! # use mediaprobe_client::{PipelineClient, MediaPipeline, MediaElement};
//! # async fn demo() -> mediaprobe_client::ClientResult<()> {
//! let client = PipelineClient::connect("ws://localhost:8888/mediaserver").await?;
//! let pipeline = MediaPipeline::create(&client).await?;
//! let player = pipeline.create_player("file:///media/clip.webm").build().await?;
//! let mut eos = player.subscribe_end_of_stream().await?;
//! player.play().await?;
//! eos.next().await;
//! pipeline.release().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The [`fake`] module carries an in-process server speaking the same
//! protocol, so suites run hermetically on a loopback socket.

pub mod client;
pub mod error;
pub mod fake;
pub mod pipeline;
pub mod protocol;
pub mod transport;

pub use client::{ClientConfig, EventSubscription, PipelineClient};
pub use error::{ClientError, ClientResult};
pub use fake::{FakeMediaServer, FakeServerConfig, MonitorEvent, MonitorEventKind};
pub use pipeline::{
    IceCandidate, MediaElement, MediaPipeline, MediaProfile, PlayerEndpoint, RecorderEndpoint,
    WebRtcEndpoint,
};
pub use protocol::{ServerEvent, events};
