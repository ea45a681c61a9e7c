//! In-process fake media server.
//!
//! Speaks the same JSON-RPC control protocol as a real media server so the
//! client and the functional suites can run without external infrastructure.
//! Playback is simulated: a player "plays" its URI for a configured duration
//! and then fires `EndOfStream`, honoring pause, stop and seeks in between.
//!
//! Tests observe the server through the monitor feed and position queries
//! instead of a second protocol, so assertions stay on the public client
//! API while fixtures can still follow what the server is doing.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::SinkExt;
use futures_util::stream::StreamExt;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::ClientResult;
use crate::protocol::{
    self, RpcError, RpcRequest, ServerEvent, codes, events, methods, operations,
};

/// SDP answer returned by every `processOffer`.
pub const CANNED_SDP_ANSWER: &str = "v=0\r\n\
o=- 0 0 IN IP4 127.0.0.1\r\n\
s=mediaprobe\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=mid:0\r\n\
a=setup:active\r\n\
a=sendrecv\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=mid:1\r\n\
a=setup:active\r\n\
a=sendrecv\r\n";

const LOCAL_CANDIDATES: [&str; 2] = [
    "candidate:1 1 UDP 2122252543 127.0.0.1 50000 typ host",
    "candidate:2 1 UDP 2122252542 127.0.0.1 50002 typ host",
];

/// Tunables for the fake server.
#[derive(Debug, Clone)]
pub struct FakeServerConfig {
    /// Simulated media duration for URIs without an explicit entry.
    pub default_media_duration: Duration,
    /// Simulated media duration per URI.
    pub media_durations: HashMap<String, Duration>,
}

impl Default for FakeServerConfig {
    fn default() -> Self {
        Self {
            default_media_duration: Duration::from_millis(250),
            media_durations: HashMap::new(),
        }
    }
}

impl FakeServerConfig {
    pub fn with_media_duration(mut self, uri: impl Into<String>, duration: Duration) -> Self {
        self.media_durations.insert(uri.into(), duration);
        self
    }

    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_media_duration = duration;
        self
    }
}

/// What the fake server just did, published on the monitor feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEvent {
    pub object: String,
    pub kind: MonitorEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEventKind {
    Created,
    Playing,
    Paused,
    Stopped,
    EndOfStream,
    Recording,
    Released,
}

/// One accepted control connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: u64,
    pub peer: SocketAddr,
}

#[derive(Debug, Clone)]
enum ObjectKind {
    Pipeline,
    Player { uri: String },
    Recorder { uri: String, profile: String },
    WebRtc,
}

#[derive(Debug)]
struct Playback {
    duration: Duration,
    /// Position accumulated before the current run.
    elapsed: Duration,
    /// Set while playing.
    started_at: Option<Instant>,
    finished: bool,
    /// Bumped on every (re)start so a stale timer cannot fire.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Playback {
    fn position(&self) -> Duration {
        let mut position = self.elapsed;
        if let Some(started) = self.started_at {
            position += started.elapsed();
        }
        position.min(self.duration)
    }

    fn fraction(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.position().as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Debug)]
struct ObjectEntry {
    kind: ObjectKind,
    /// Owning pipeline reference; a pipeline owns itself.
    pipeline: String,
    sinks: Vec<String>,
    playback: Option<Playback>,
}

struct Subscription {
    id: String,
    object: String,
    event_type: String,
    conn: u64,
    outbound: mpsc::UnboundedSender<String>,
}

struct ServerState {
    config: FakeServerConfig,
    objects: DashMap<String, ObjectEntry>,
    subscriptions: DashMap<String, Subscription>,
    connections: DashMap<u64, ConnectionInfo>,
    monitor: broadcast::Sender<MonitorEvent>,
    next_conn: AtomicU64,
}

impl ServerState {
    fn emit_monitor(&self, object: &str, kind: MonitorEventKind) {
        let _ = self.monitor.send(MonitorEvent { object: object.to_string(), kind });
    }

    fn media_duration(&self, uri: &str) -> Duration {
        self.config
            .media_durations
            .get(uri)
            .copied()
            .unwrap_or(self.config.default_media_duration)
    }
}

/// An in-process media server listening on a loopback port.
pub struct FakeMediaServer {
    state: Arc<ServerState>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl FakeMediaServer {
    /// Starts a server with default settings on an ephemeral port.
    pub async fn start() -> ClientResult<Self> {
        Self::start_with(FakeServerConfig::default()).await
    }

    pub async fn start_with(config: FakeServerConfig) -> ClientResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;
        let (monitor, _) = broadcast::channel(256);
        let state = Arc::new(ServerState {
            config,
            objects: DashMap::new(),
            subscriptions: DashMap::new(),
            connections: DashMap::new(),
            monitor,
            next_conn: AtomicU64::new(1),
        });

        let accept_state = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_connection(Arc::clone(&accept_state), stream, peer));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed, stopping fake media server");
                        break;
                    }
                }
            }
        });

        debug!(%local_addr, "fake media server listening");
        Ok(Self { state, local_addr, accept_task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Control endpoint URI for [`crate::PipelineClient::connect`].
    pub fn ws_uri(&self) -> String {
        format!("ws://{}/mediaserver", self.local_addr)
    }

    /// Feed of everything the server does, for test fixtures.
    pub fn monitor(&self) -> broadcast::Receiver<MonitorEvent> {
        self.state.monitor.subscribe()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.state.connections.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.len()
    }

    /// True while the object exists, so before its release.
    pub fn has_object(&self, object: &str) -> bool {
        self.state.objects.contains_key(object)
    }

    pub fn object_count(&self) -> usize {
        self.state.objects.len()
    }

    /// Sinks `object` has been connected to, in connect order. `None` when
    /// the object does not exist.
    pub fn sinks_of(&self, object: &str) -> Option<Vec<String>> {
        self.state.objects.get(object).map(|entry| entry.sinks.clone())
    }

    /// Simulated playback position of a player, `None` before first play.
    pub fn media_position(&self, object: &str) -> Option<Duration> {
        self.state
            .objects
            .get(object)
            .and_then(|entry| entry.playback.as_ref().map(Playback::position))
    }

    /// Position as a fraction of the media duration, in `0.0..=1.0`.
    pub fn media_fraction(&self, object: &str) -> Option<f64> {
        self.state
            .objects
            .get(object)
            .and_then(|entry| entry.playback.as_ref().map(Playback::fraction))
    }
}

impl Drop for FakeMediaServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn handle_connection(state: Arc<ServerState>, stream: TcpStream, peer: SocketAddr) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "websocket handshake failed");
            return;
        }
    };
    let conn_id = state.next_conn.fetch_add(1, Ordering::Relaxed);
    state.connections.insert(conn_id, ConnectionInfo { id: conn_id, peer });
    debug!(conn = conn_id, %peer, "control connection accepted");

    let (mut writer, mut reader) = ws.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if writer.send(WsMessage::text(frame)).await.is_err() {
                break;
            }
        }
        let _ = writer.close().await;
    });

    let mut session: Option<String> = None;
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                if let Some(reply) = handle_frame(&state, conn_id, &outbound, &mut session, text.as_str())
                {
                    if outbound.send(reply).is_err() {
                        break;
                    }
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                trace!(conn = conn_id, error = %e, "read failed");
                break;
            }
        }
    }

    drop(outbound);
    let _ = writer_task.await;
    state.connections.remove(&conn_id);
    // Subscriptions are connection-scoped and die with it.
    let dead: Vec<String> = state
        .subscriptions
        .iter()
        .filter(|sub| sub.conn == conn_id)
        .map(|sub| sub.id.clone())
        .collect();
    for id in dead {
        state.subscriptions.remove(&id);
    }
    debug!(conn = conn_id, "control connection closed");
}

fn handle_frame(
    state: &Arc<ServerState>,
    conn: u64,
    outbound: &mpsc::UnboundedSender<String>,
    session: &mut Option<String>,
    text: &str,
) -> Option<String> {
    let request: RpcRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            let frame = json!({
                "jsonrpc": protocol::JSONRPC_VERSION,
                "id": Value::Null,
                "error": {"code": codes::PARSE_ERROR, "message": format!("parse error: {e}")},
            });
            return Some(frame.to_string());
        }
    };

    let params = request.params.unwrap_or(Value::Null);
    // Adopt the session the client sent, or mint one on first contact.
    if let Some(sent) = params.get("sessionId").and_then(Value::as_str) {
        *session = Some(sent.to_string());
    } else if session.is_none() {
        *session = Some(Uuid::new_v4().to_string());
    }
    let session_id = session.clone().unwrap_or_default();

    let outcome = match request.method.as_str() {
        methods::PING => Ok(json!({"value": protocol::PONG_VALUE})),
        methods::CREATE => handle_create(state, &params),
        methods::INVOKE => handle_invoke(state, &params),
        methods::SUBSCRIBE => handle_subscribe(state, conn, outbound, &params),
        methods::UNSUBSCRIBE => handle_unsubscribe(state, &params),
        methods::RELEASE => handle_release(state, &params),
        other => Err(rpc_error(codes::METHOD_NOT_FOUND, format!("unknown method '{other}'"))),
    };

    let frame = match outcome {
        Ok(mut result) => {
            if let Some(result) = result.as_object_mut() {
                result.insert("sessionId".to_string(), json!(session_id));
            }
            json!({"jsonrpc": protocol::JSONRPC_VERSION, "id": request.id, "result": result})
        }
        Err(error) => {
            json!({"jsonrpc": protocol::JSONRPC_VERSION, "id": request.id, "error": error})
        }
    };
    Some(frame.to_string())
}

fn rpc_error(code: i64, message: impl Into<String>) -> RpcError {
    RpcError { code, message: message.into(), data: None }
}

fn object_not_found(object: &str) -> RpcError {
    rpc_error(codes::OBJECT_NOT_FOUND, format!("Object '{object}' not found"))
}

fn handle_create(state: &Arc<ServerState>, params: &Value) -> Result<Value, RpcError> {
    let object_type = params
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "create without type"))?;
    let ctor = params.get("constructorParams").cloned().unwrap_or_else(|| json!({}));

    let object = match object_type {
        "MediaPipeline" => {
            let object = format!("{}_MediaPipeline", Uuid::new_v4());
            state.objects.insert(
                object.clone(),
                ObjectEntry {
                    kind: ObjectKind::Pipeline,
                    pipeline: object.clone(),
                    sinks: Vec::new(),
                    playback: None,
                },
            );
            object
        }
        "PlayerEndpoint" | "RecorderEndpoint" | "WebRtcEndpoint" => {
            let pipeline = ctor.get("mediaPipeline").and_then(Value::as_str).ok_or_else(|| {
                rpc_error(codes::INVALID_PARAMS, format!("{object_type} requires mediaPipeline"))
            })?;
            if !state.objects.contains_key(pipeline) {
                return Err(object_not_found(pipeline));
            }
            let kind = match object_type {
                "PlayerEndpoint" => {
                    let uri = ctor.get("uri").and_then(Value::as_str).ok_or_else(|| {
                        rpc_error(codes::INVALID_PARAMS, "PlayerEndpoint requires uri")
                    })?;
                    ObjectKind::Player { uri: uri.to_string() }
                }
                "RecorderEndpoint" => {
                    let uri = ctor.get("uri").and_then(Value::as_str).ok_or_else(|| {
                        rpc_error(codes::INVALID_PARAMS, "RecorderEndpoint requires uri")
                    })?;
                    let profile =
                        ctor.get("mediaProfile").and_then(Value::as_str).unwrap_or("WEBM");
                    ObjectKind::Recorder { uri: uri.to_string(), profile: profile.to_string() }
                }
                _ => ObjectKind::WebRtc,
            };
            let object = format!("{}/{}_{}", pipeline, Uuid::new_v4(), object_type);
            state.objects.insert(
                object.clone(),
                ObjectEntry {
                    kind,
                    pipeline: pipeline.to_string(),
                    sinks: Vec::new(),
                    playback: None,
                },
            );
            object
        }
        other => {
            return Err(rpc_error(codes::INVALID_PARAMS, format!("unknown object type '{other}'")));
        }
    };

    state.emit_monitor(&object, MonitorEventKind::Created);
    debug!(object, "object created");
    Ok(json!({"value": object}))
}

fn handle_invoke(state: &Arc<ServerState>, params: &Value) -> Result<Value, RpcError> {
    let object = params
        .get("object")
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "invoke without object"))?;
    let operation = params
        .get("operation")
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "invoke without operation"))?;
    let op_params = params.get("operationParams").cloned().unwrap_or_else(|| json!({}));
    if !state.objects.contains_key(object) {
        return Err(object_not_found(object));
    }

    match operation {
        operations::CONNECT => {
            let sink = op_params
                .get("sink")
                .and_then(Value::as_str)
                .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "connect without sink"))?;
            if !state.objects.contains_key(sink) {
                return Err(object_not_found(sink));
            }
            if let Some(mut entry) = state.objects.get_mut(object) {
                entry.sinks.push(sink.to_string());
            }
            trace!(source = object, sink, "elements connected");
            Ok(json!({}))
        }
        operations::PLAY => player_play(state, object),
        operations::PAUSE => element_pause(state, object),
        operations::STOP => element_stop(state, object),
        operations::SET_POSITION => player_set_position(state, object, &op_params),
        operations::GET_POSITION => {
            let guard = state.objects.get(object).ok_or_else(|| object_not_found(object))?;
            if !matches!(guard.kind, ObjectKind::Player { .. }) {
                return Err(rpc_error(
                    codes::INVALID_PARAMS,
                    "getPosition is only valid on a PlayerEndpoint",
                ));
            }
            let position = guard.playback.as_ref().map(Playback::position).unwrap_or_default();
            Ok(json!({"value": position.as_millis() as u64}))
        }
        operations::RECORD => {
            let guard = state.objects.get(object).ok_or_else(|| object_not_found(object))?;
            if !matches!(guard.kind, ObjectKind::Recorder { .. }) {
                return Err(rpc_error(
                    codes::INVALID_PARAMS,
                    "record is only valid on a RecorderEndpoint",
                ));
            }
            drop(guard);
            emit_event(state, object, events::RECORDING);
            state.emit_monitor(object, MonitorEventKind::Recording);
            Ok(json!({}))
        }
        operations::PROCESS_OFFER => {
            let offer = op_params.get("offer").and_then(Value::as_str).unwrap_or_default();
            if !offer.starts_with("v=0") {
                return Err(rpc_error(codes::INVALID_PARAMS, "processOffer requires an SDP offer"));
            }
            Ok(json!({"value": CANNED_SDP_ANSWER}))
        }
        operations::GATHER_CANDIDATES => {
            spawn_ice_gathering(Arc::clone(state), object.to_string());
            Ok(json!({}))
        }
        operations::ADD_ICE_CANDIDATE => {
            op_params
                .get("candidate")
                .filter(|candidate| candidate.get("candidate").is_some())
                .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "addIceCandidate without candidate"))?;
            Ok(json!({}))
        }
        other => Err(rpc_error(
            codes::METHOD_NOT_FOUND,
            format!("object does not support operation '{other}'"),
        )),
    }
}

fn player_play(state: &Arc<ServerState>, object: &str) -> Result<Value, RpcError> {
    let Some(mut guard) = state.objects.get_mut(object) else {
        return Err(object_not_found(object));
    };
    let entry = guard.value_mut();
    let ObjectKind::Player { uri } = entry.kind.clone() else {
        return Err(rpc_error(codes::INVALID_PARAMS, "play is only valid on a PlayerEndpoint"));
    };
    let duration = state.media_duration(&uri);

    let mut elapsed = Duration::ZERO;
    let mut generation = 1;
    if let Some(playback) = entry.playback.as_mut() {
        if let Some(timer) = playback.timer.take() {
            timer.abort();
        }
        generation = playback.generation + 1;
        // Resume from a pause; anything else starts over.
        if playback.started_at.is_none() && !playback.finished {
            elapsed = playback.elapsed;
        }
    }
    let remaining = duration.saturating_sub(elapsed);
    let timer = spawn_eos_timer(Arc::clone(state), object.to_string(), generation, remaining);
    entry.playback = Some(Playback {
        duration,
        elapsed,
        started_at: Some(Instant::now()),
        finished: false,
        generation,
        timer: Some(timer),
    });
    drop(guard);

    state.emit_monitor(object, MonitorEventKind::Playing);
    trace!(object, ?duration, ?elapsed, "playback started");
    Ok(json!({}))
}

fn element_pause(state: &Arc<ServerState>, object: &str) -> Result<Value, RpcError> {
    let Some(mut guard) = state.objects.get_mut(object) else {
        return Err(object_not_found(object));
    };
    let entry = guard.value_mut();
    match entry.kind.clone() {
        ObjectKind::Player { .. } => {
            if let Some(playback) = entry.playback.as_mut() {
                if let Some(started) = playback.started_at.take() {
                    playback.elapsed = (playback.elapsed + started.elapsed()).min(playback.duration);
                    if let Some(timer) = playback.timer.take() {
                        timer.abort();
                    }
                }
            }
            drop(guard);
            state.emit_monitor(object, MonitorEventKind::Paused);
            trace!(object, "playback paused");
            Ok(json!({}))
        }
        ObjectKind::Recorder { .. } => {
            drop(guard);
            emit_event(state, object, events::PAUSED);
            state.emit_monitor(object, MonitorEventKind::Paused);
            Ok(json!({}))
        }
        _ => Err(rpc_error(codes::INVALID_PARAMS, "pause is not valid on this object")),
    }
}

fn element_stop(state: &Arc<ServerState>, object: &str) -> Result<Value, RpcError> {
    let Some(mut guard) = state.objects.get_mut(object) else {
        return Err(object_not_found(object));
    };
    let entry = guard.value_mut();
    match entry.kind.clone() {
        ObjectKind::Player { .. } => {
            if let Some(playback) = entry.playback.as_mut() {
                if let Some(timer) = playback.timer.take() {
                    timer.abort();
                }
                playback.started_at = None;
                playback.elapsed = Duration::ZERO;
                playback.finished = false;
            }
            drop(guard);
            state.emit_monitor(object, MonitorEventKind::Stopped);
            trace!(object, "playback stopped");
            Ok(json!({}))
        }
        ObjectKind::Recorder { .. } => {
            drop(guard);
            emit_event(state, object, events::STOPPED);
            state.emit_monitor(object, MonitorEventKind::Stopped);
            Ok(json!({}))
        }
        _ => Err(rpc_error(codes::INVALID_PARAMS, "stop is not valid on this object")),
    }
}

fn player_set_position(
    state: &Arc<ServerState>,
    object: &str,
    op_params: &Value,
) -> Result<Value, RpcError> {
    let position_ms = op_params
        .get("position")
        .and_then(Value::as_u64)
        .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "setPosition without position"))?;

    let Some(mut guard) = state.objects.get_mut(object) else {
        return Err(object_not_found(object));
    };
    let entry = guard.value_mut();
    let ObjectKind::Player { uri } = entry.kind.clone() else {
        return Err(rpc_error(codes::INVALID_PARAMS, "setPosition is only valid on a PlayerEndpoint"));
    };
    let duration = state.media_duration(&uri);
    let target = Duration::from_millis(position_ms).min(duration);

    match entry.playback.as_mut() {
        Some(playback) => {
            playback.elapsed = target;
            playback.finished = false;
            if playback.started_at.is_some() {
                playback.started_at = Some(Instant::now());
                if let Some(timer) = playback.timer.take() {
                    timer.abort();
                }
                playback.generation += 1;
                let timer = spawn_eos_timer(
                    Arc::clone(state),
                    object.to_string(),
                    playback.generation,
                    duration.saturating_sub(target),
                );
                playback.timer = Some(timer);
            }
        }
        None => {
            entry.playback = Some(Playback {
                duration,
                elapsed: target,
                started_at: None,
                finished: false,
                generation: 0,
                timer: None,
            });
        }
    }
    drop(guard);
    trace!(object, position_ms, "position set");
    Ok(json!({}))
}

fn handle_subscribe(
    state: &Arc<ServerState>,
    conn: u64,
    outbound: &mpsc::UnboundedSender<String>,
    params: &Value,
) -> Result<Value, RpcError> {
    let object = params
        .get("object")
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "subscribe without object"))?;
    let event_type = params
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "subscribe without type"))?;
    if !state.objects.contains_key(object) {
        return Err(object_not_found(object));
    }

    let id = Uuid::new_v4().to_string();
    state.subscriptions.insert(
        id.clone(),
        Subscription {
            id: id.clone(),
            object: object.to_string(),
            event_type: event_type.to_string(),
            conn,
            outbound: outbound.clone(),
        },
    );
    trace!(object, event_type, subscription = %id, "subscribed");
    Ok(json!({"value": id}))
}

fn handle_unsubscribe(state: &Arc<ServerState>, params: &Value) -> Result<Value, RpcError> {
    let subscription = params
        .get("subscription")
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "unsubscribe without subscription"))?;
    if state.subscriptions.remove(subscription).is_none() {
        return Err(rpc_error(codes::INVALID_PARAMS, format!("unknown subscription '{subscription}'")));
    }
    Ok(json!({}))
}

fn handle_release(state: &Arc<ServerState>, params: &Value) -> Result<Value, RpcError> {
    let object = params
        .get("object")
        .and_then(Value::as_str)
        .ok_or_else(|| rpc_error(codes::INVALID_PARAMS, "release without object"))?;
    if !state.objects.contains_key(object) {
        return Err(object_not_found(object));
    }

    // Releasing a pipeline takes its whole subtree with it.
    let removed: Vec<String> = state
        .objects
        .iter()
        .filter(|entry| entry.key() == object || entry.value().pipeline == object)
        .map(|entry| entry.key().clone())
        .collect();
    for gone in &removed {
        state.objects.remove(gone);
        let dead: Vec<String> = state
            .subscriptions
            .iter()
            .filter(|sub| &sub.object == gone)
            .map(|sub| sub.id.clone())
            .collect();
        for id in dead {
            state.subscriptions.remove(&id);
        }
        state.emit_monitor(gone, MonitorEventKind::Released);
    }
    debug!(object, released = removed.len(), "released");
    Ok(json!({}))
}

fn spawn_eos_timer(
    state: Arc<ServerState>,
    object: String,
    generation: u64,
    remaining: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(remaining).await;
        fire_end_of_stream(&state, &object, generation);
    })
}

fn fire_end_of_stream(state: &ServerState, object: &str, generation: u64) {
    {
        let Some(mut guard) = state.objects.get_mut(object) else {
            return;
        };
        let Some(playback) = guard.playback.as_mut() else {
            return;
        };
        if playback.generation != generation || playback.started_at.is_none() || playback.finished {
            return;
        }
        playback.finished = true;
        playback.elapsed = playback.duration;
        playback.started_at = None;
        playback.timer = None;
    }
    emit_event(state, object, events::END_OF_STREAM);
    state.emit_monitor(object, MonitorEventKind::EndOfStream);
    debug!(object, "end of stream");
}

fn spawn_ice_gathering(state: Arc<ServerState>, object: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        for (index, candidate) in LOCAL_CANDIDATES.iter().enumerate() {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let data = json!({
                "source": object,
                "type": events::ICE_CANDIDATE_FOUND,
                "timestampMillis": now_millis(),
                "candidate": {
                    "candidate": candidate,
                    "sdpMid": index.to_string(),
                    "sdpMLineIndex": index as u64,
                },
            });
            emit_event_with_data(&state, &object, events::ICE_CANDIDATE_FOUND, data);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        emit_event(&state, &object, events::ICE_GATHERING_DONE);
    })
}

fn emit_event(state: &ServerState, object: &str, event_type: &str) {
    let data = json!({
        "source": object,
        "type": event_type,
        "timestampMillis": now_millis(),
    });
    emit_event_with_data(state, object, event_type, data);
}

fn emit_event_with_data(state: &ServerState, object: &str, event_type: &str, data: Value) {
    let event = ServerEvent {
        object: object.to_string(),
        event_type: event_type.to_string(),
        data,
    };
    let frame = match protocol::event_notification(&event) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "failed to serialize event");
            return;
        }
    };

    let mut dead = Vec::new();
    for sub in state.subscriptions.iter() {
        if sub.object == object && sub.event_type == event_type {
            if sub.outbound.send(frame.clone()).is_err() {
                dead.push(sub.id.clone());
            }
        }
    }
    for id in dead {
        state.subscriptions.remove(&id);
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_position_is_capped_at_the_duration() {
        let playback = Playback {
            duration: Duration::from_millis(200),
            elapsed: Duration::from_millis(300),
            started_at: None,
            finished: true,
            generation: 1,
            timer: None,
        };
        assert_eq!(playback.position(), Duration::from_millis(200));
        assert_eq!(playback.fraction(), 1.0);
    }

    #[test]
    fn fraction_of_zero_duration_media_is_complete() {
        let playback = Playback {
            duration: Duration::ZERO,
            elapsed: Duration::ZERO,
            started_at: None,
            finished: false,
            generation: 1,
            timer: None,
        };
        assert_eq!(playback.fraction(), 1.0);
    }

    #[test]
    fn mid_play_fraction_is_proportional() {
        let playback = Playback {
            duration: Duration::from_millis(400),
            elapsed: Duration::from_millis(100),
            started_at: None,
            finished: false,
            generation: 1,
            timer: None,
        };
        assert_eq!(playback.fraction(), 0.25);
    }
}
