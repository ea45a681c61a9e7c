//! The control connection to a media server.
//!
//! [`PipelineClient`] owns one WebSocket connection and multiplexes every
//! request over it. Correlation is by request id: ids are allocated from an
//! atomic counter, so they are unique for the lifetime of the connection and
//! responses can arrive in any order. Event notifications are routed to
//! subscribers by `(object, event type)`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Notify, RwLock, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, ClientResult};
use crate::protocol::{
    self, RpcRequest, ServerEvent, ServerMessage, methods, parse_server_message,
};
use crate::transport::{Transport, TransportEvent, WsTransport};

/// Keepalive interval advertised in `ping` requests when none is configured.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(240);

/// Tunables for a control connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for a response before a request fails.
    pub request_timeout: Duration,
    /// When set, a background task pings the server at this interval.
    pub keepalive: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            keepalive: None,
        }
    }
}

type EventKey = (String, String);

struct Route {
    token: u64,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    next_token: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<protocol::RpcResponse>>,
    routes: DashMap<EventKey, Vec<Route>>,
    session_id: RwLock<Option<String>>,
    request_timeout: Duration,
    keepalive: Option<Duration>,
    shutdown: Notify,
}

/// Handle to a control connection. Cloning is cheap and all clones share the
/// connection.
#[derive(Clone)]
pub struct PipelineClient {
    inner: Arc<ClientInner>,
}

impl PipelineClient {
    /// Connects to a media server control endpoint with default settings.
    pub async fn connect(uri: &str) -> ClientResult<Self> {
        Self::connect_with(uri, ClientConfig::default()).await
    }

    /// Connects with explicit settings.
    pub async fn connect_with(uri: &str, config: ClientConfig) -> ClientResult<Self> {
        let (transport, events) = WsTransport::connect(uri).await?;
        Ok(Self::with_transport(transport, events, config))
    }

    /// Builds a client on top of an already established transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        config: ClientConfig,
    ) -> Self {
        let inner = Arc::new(ClientInner {
            transport,
            next_id: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
            pending: DashMap::new(),
            routes: DashMap::new(),
            session_id: RwLock::new(None),
            request_timeout: config.request_timeout,
            keepalive: config.keepalive,
            shutdown: Notify::new(),
        });

        tokio::spawn(dispatch(Arc::clone(&inner), events));
        if let Some(interval) = config.keepalive {
            tokio::spawn(keepalive(Arc::clone(&inner), interval));
        }

        Self { inner }
    }

    /// Session id assigned by the server, once the first response carried one.
    pub async fn session_id(&self) -> Option<String> {
        self.inner.session_id.read().await.clone()
    }

    /// True once the underlying connection is gone.
    pub fn is_closed(&self) -> bool {
        self.inner.transport.is_closed()
    }

    /// Creates a media object and returns its reference.
    pub async fn create(&self, object_type: &str, constructor_params: Value) -> ClientResult<String> {
        let session = self.session_id().await;
        let params = protocol::create_params(object_type, constructor_params, session.as_deref());
        let result = self.request(methods::CREATE, params).await?;
        result
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::protocol("create response without object reference"))
    }

    /// Invokes an operation on a media object and returns its result value.
    pub async fn invoke(
        &self,
        object: &str,
        operation: &str,
        operation_params: Value,
    ) -> ClientResult<Value> {
        let session = self.session_id().await;
        let params = protocol::invoke_params(object, operation, operation_params, session.as_deref());
        let result = self.request(methods::INVOKE, params).await?;
        Ok(result.get("value").cloned().unwrap_or(Value::Null))
    }

    /// Subscribes to `event_type` on `object`.
    ///
    /// The local route is registered before the request goes out, so an event
    /// the server fires immediately after acknowledging the subscription
    /// cannot be lost. Subscribing twice to the same object and type is fine;
    /// each subscription gets its own stream.
    pub async fn subscribe(&self, object: &str, event_type: &str) -> ClientResult<EventSubscription> {
        let key: EventKey = (object.to_string(), event_type.to_string());
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner
            .routes
            .entry(key.clone())
            .or_default()
            .push(Route { token, sender });

        let session = self.session_id().await;
        let params = protocol::subscribe_params(object, event_type, session.as_deref());
        let result = match self.request(methods::SUBSCRIBE, params).await {
            Ok(result) => result,
            Err(e) => {
                remove_route(&self.inner, &key, token);
                return Err(e);
            }
        };
        let Some(subscription) = result.get("value").and_then(Value::as_str) else {
            remove_route(&self.inner, &key, token);
            return Err(ClientError::protocol("subscribe response without subscription id"));
        };

        debug!(object, event_type, subscription, "subscribed");
        Ok(EventSubscription {
            client: self.clone(),
            id: subscription.to_string(),
            object: key.0,
            event_type: key.1,
            token,
            receiver,
        })
    }

    /// Releases a media object. Releasing a pipeline releases everything it
    /// owns; any later operation on those objects fails with
    /// [`ClientError::ObjectNotFound`].
    pub async fn release(&self, object: &str) -> ClientResult<()> {
        let session = self.session_id().await;
        let params = protocol::release_params(object, session.as_deref());
        self.request(methods::RELEASE, params).await.map(drop)
    }

    /// Round-trips a keepalive ping.
    pub async fn ping(&self) -> ClientResult<()> {
        let interval = self.inner.keepalive.unwrap_or(DEFAULT_PING_INTERVAL);
        let params = protocol::ping_params(interval.as_millis() as u64);
        let result = self.request(methods::PING, params).await?;
        if result.get("value").and_then(Value::as_str) == Some(protocol::PONG_VALUE) {
            Ok(())
        } else {
            Err(ClientError::protocol("ping answered without pong"))
        }
    }

    /// Closes the connection. Requests still in flight fail with
    /// [`ClientError::ConnectionClosed`].
    pub async fn close(&self) -> ClientResult<()> {
        self.inner.shutdown.notify_waiters();
        self.inner.transport.close().await
    }

    async fn request(&self, method: &str, params: Value) -> ClientResult<Value> {
        let inner = &self.inner;
        if inner.transport.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }

        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        inner.pending.insert(id, tx);

        let request = RpcRequest::new(id, method, params);
        let text = match serde_json::to_string(&request) {
            Ok(text) => text,
            Err(e) => {
                inner.pending.remove(&id);
                return Err(e.into());
            }
        };
        trace!(id, method, "sending request");
        if let Err(e) = inner.transport.send(text).await {
            inner.pending.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(inner.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            // Sender dropped: the dispatch task drained us on teardown.
            Ok(Err(_)) => return Err(ClientError::ConnectionClosed),
            Err(_) => {
                inner.pending.remove(&id);
                return Err(ClientError::Timeout { timeout: inner.request_timeout });
            }
        };

        let result = response.into_result()?;
        if let Some(session) = result.get("sessionId").and_then(Value::as_str) {
            let mut guard = inner.session_id.write().await;
            if guard.as_deref() != Some(session) {
                debug!(session, "session established");
                *guard = Some(session.to_string());
            }
        }
        Ok(result)
    }
}

/// One active event subscription, yielding events as they arrive.
pub struct EventSubscription {
    client: PipelineClient,
    id: String,
    object: String,
    event_type: String,
    token: u64,
    receiver: mpsc::UnboundedReceiver<ServerEvent>,
}

impl EventSubscription {
    /// Server-assigned subscription id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Next event, or `None` once the connection is gone.
    pub async fn next(&mut self) -> Option<ServerEvent> {
        self.receiver.recv().await
    }

    /// Next event within `timeout`, or `None` on timeout or teardown.
    pub async fn wait(&mut self, timeout: Duration) -> Option<ServerEvent> {
        tokio::time::timeout(timeout, self.receiver.recv()).await.ok().flatten()
    }

    /// Cancels the subscription on the server and drops the local route.
    pub async fn unsubscribe(mut self) -> ClientResult<()> {
        let key: EventKey = (self.object.clone(), self.event_type.clone());
        remove_route(&self.client.inner, &key, self.token);
        self.receiver.close();

        let session = self.client.session_id().await;
        let params = protocol::unsubscribe_params(&self.object, &self.id, session.as_deref());
        self.client.request(methods::UNSUBSCRIBE, params).await.map(drop)
    }
}

fn remove_route(inner: &ClientInner, key: &EventKey, token: u64) {
    if let Some(mut routes) = inner.routes.get_mut(key) {
        routes.retain(|route| route.token != token);
    }
}

async fn dispatch(inner: Arc<ClientInner>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(text) => match parse_server_message(&text) {
                Ok(ServerMessage::Response(response)) => {
                    if let Some((_, tx)) = inner.pending.remove(&response.id) {
                        let _ = tx.send(response);
                    } else {
                        warn!(id = response.id, "response for unknown request id");
                    }
                }
                Ok(ServerMessage::Event(event)) => route_event(&inner, event),
                Err(e) => warn!(error = %e, "discarding unparseable frame"),
            },
            TransportEvent::Closed => break,
        }
    }

    // Connection gone: wake the keepalive task, fail every waiter by
    // dropping its response sender, and end every subscription stream by
    // dropping its event sender.
    inner.shutdown.notify_waiters();
    let ids: Vec<u64> = inner.pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        inner.pending.remove(&id);
    }
    inner.routes.clear();
    debug!("control connection dispatch finished");
}

fn route_event(inner: &ClientInner, event: ServerEvent) {
    let key: EventKey = (event.object.clone(), event.event_type.clone());
    let Some(mut routes) = inner.routes.get_mut(&key) else {
        trace!(object = %event.object, event_type = %event.event_type, "event without subscriber");
        return;
    };
    routes.retain(|route| route.sender.send(event.clone()).is_ok());
}

async fn keepalive(inner: Arc<ClientInner>, interval: Duration) {
    let client = PipelineClient { inner };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = client.inner.shutdown.notified() => break,
            _ = ticker.tick() => {
                if client.inner.transport.is_closed() {
                    break;
                }
                if let Err(e) = client.ping().await {
                    warn!(error = %e, "keepalive ping failed");
                    break;
                }
            }
        }
    }
    trace!("keepalive task finished");
}
