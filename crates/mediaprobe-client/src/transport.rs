//! WebSocket transport beneath the control connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::error::{ClientError, ClientResult};

/// What the read half of a transport hands up to the connection layer.
#[derive(Debug)]
pub enum TransportEvent {
    /// One complete text frame.
    Message(String),
    /// The transport is gone. Always the last event on the channel.
    Closed,
}

/// Write half of a control connection. The read half is a channel of
/// [`TransportEvent`]s produced by a background task, so the connection layer
/// never touches the socket directly.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one text frame.
    async fn send(&self, text: String) -> ClientResult<()>;

    /// Closes the transport. Idempotent.
    async fn close(&self) -> ClientResult<()>;

    fn is_closed(&self) -> bool;
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// Client-side WebSocket transport.
pub struct WsTransport {
    writer: Mutex<WsSink>,
    closed: AtomicBool,
    uri: String,
}

impl WsTransport {
    /// Connects to `uri` and spawns the reader task. Incoming text frames
    /// arrive on the returned channel, terminated by a single
    /// [`TransportEvent::Closed`].
    pub async fn connect(
        uri: &str,
    ) -> ClientResult<(Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let (stream, _response) = connect_async(uri).await?;
        debug!(%uri, "control connection established");

        let (writer, mut reader) = stream.split();
        let transport = Arc::new(Self {
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            uri: uri.to_string(),
        });

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reader_handle = Arc::clone(&transport);
        tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        if event_tx.send(TransportEvent::Message(text.to_string())).is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Close(_)) => {
                        debug!(uri = %reader_handle.uri, "server closed the connection");
                        break;
                    }
                    Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
                    Ok(other) => {
                        trace!(uri = %reader_handle.uri, "ignoring non-text frame: {other:?}");
                    }
                    Err(e) => {
                        warn!(uri = %reader_handle.uri, error = %e, "websocket read failed");
                        break;
                    }
                }
            }
            reader_handle.closed.store(true, Ordering::Relaxed);
            let _ = event_tx.send(TransportEvent::Closed);
        });

        Ok((transport, event_rx))
    }

    /// URI this transport was connected to.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, text: String) -> ClientResult<()> {
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        writer.send(WsMessage::text(text)).await.map_err(|e| {
            self.closed.store(true, Ordering::Relaxed);
            ClientError::transport(format!("send to {} failed: {e}", self.uri))
        })
    }

    async fn close(&self) -> ClientResult<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.send(WsMessage::Close(None)).await {
            trace!(uri = %self.uri, error = %e, "close frame not delivered");
        }
        if let Err(e) = writer.close().await {
            trace!(uri = %self.uri, error = %e, "sink close failed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
