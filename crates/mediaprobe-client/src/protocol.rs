//! Wire types for the JSON-RPC 2.0 control protocol.
//!
//! Every exchange with the media server is a JSON text frame over the
//! WebSocket connection. Requests carry a numeric `id` and are answered with
//! exactly one response carrying the same `id`; event deliveries arrive as
//! `onEvent` notifications without an `id`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ClientError, ClientResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// Result value of a `ping` request.
pub const PONG_VALUE: &str = "pong";

/// Method names of the control protocol.
pub mod methods {
    pub const CREATE: &str = "create";
    pub const INVOKE: &str = "invoke";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const RELEASE: &str = "release";
    pub const PING: &str = "ping";
    pub const ON_EVENT: &str = "onEvent";
}

/// Operation names invoked on media objects.
pub mod operations {
    pub const CONNECT: &str = "connect";
    pub const PLAY: &str = "play";
    pub const PAUSE: &str = "pause";
    pub const STOP: &str = "stop";
    pub const SET_POSITION: &str = "setPosition";
    pub const GET_POSITION: &str = "getPosition";
    pub const RECORD: &str = "record";
    pub const PROCESS_OFFER: &str = "processOffer";
    pub const GATHER_CANDIDATES: &str = "gatherCandidates";
    pub const ADD_ICE_CANDIDATE: &str = "addIceCandidate";
}

/// Event type names emitted by media objects.
pub mod events {
    pub const END_OF_STREAM: &str = "EndOfStream";
    pub const ERROR: &str = "Error";
    pub const ICE_CANDIDATE_FOUND: &str = "IceCandidateFound";
    pub const ICE_GATHERING_DONE: &str = "IceGatheringDone";
    pub const RECORDING: &str = "Recording";
    pub const PAUSED: &str = "Paused";
    pub const STOPPED: &str = "Stopped";
}

/// Error codes used on the wire. The positive range mirrors the media
/// server's own codes; the negative ones are standard JSON-RPC.
pub mod codes {
    pub const OBJECT_NOT_FOUND: i64 = 40101;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const PARSE_ERROR: i64 = -32700;
}

/// A request frame, client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params: Some(params),
        }
    }
}

/// A response frame, server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Unwraps the result, turning a wire error into a [`ClientError`].
    pub fn into_result(self) -> ClientResult<Value> {
        if let Some(error) = self.error {
            return Err(ClientError::from_rpc(error));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// The error member of a response frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// One event delivery, unwrapped from an `onEvent` notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerEvent {
    /// Reference of the object the event was fired on.
    pub object: String,
    /// Event type name, one of [`events`].
    #[serde(rename = "type")]
    pub event_type: String,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Value,
}

/// Everything the server can push at us.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Response(RpcResponse),
    Event(ServerEvent),
}

/// Classifies one incoming text frame.
///
/// A frame with a `method` member is a notification, anything else with an
/// `id` is a response. Other shapes are protocol violations.
pub fn parse_server_message(text: &str) -> ClientResult<ServerMessage> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("method").is_some() {
        let method = value["method"].as_str().unwrap_or_default();
        if method != methods::ON_EVENT {
            return Err(ClientError::protocol(format!("unexpected server method '{method}'")));
        }
        let event_value = value
            .get("params")
            .and_then(|p| p.get("value"))
            .cloned()
            .ok_or_else(|| ClientError::protocol("onEvent notification without params.value"))?;
        let event: ServerEvent = serde_json::from_value(event_value)?;
        return Ok(ServerMessage::Event(event));
    }
    if value.get("id").is_some() {
        let response: RpcResponse = serde_json::from_value(value)?;
        return Ok(ServerMessage::Response(response));
    }
    Err(ClientError::protocol("frame is neither a response nor a notification"))
}

/// Serializes an `onEvent` notification, used by the server side.
pub fn event_notification(event: &ServerEvent) -> ClientResult<String> {
    let frame = json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": methods::ON_EVENT,
        "params": { "value": event },
    });
    Ok(serde_json::to_string(&frame)?)
}

/// Params for a `create` request.
pub fn create_params(object_type: &str, constructor_params: Value, session_id: Option<&str>) -> Value {
    let mut params = json!({
        "type": object_type,
        "constructorParams": constructor_params,
    });
    attach_session(&mut params, session_id);
    params
}

/// Params for an `invoke` request.
pub fn invoke_params(
    object: &str,
    operation: &str,
    operation_params: Value,
    session_id: Option<&str>,
) -> Value {
    let mut params = json!({
        "object": object,
        "operation": operation,
        "operationParams": operation_params,
    });
    attach_session(&mut params, session_id);
    params
}

/// Params for a `subscribe` request.
pub fn subscribe_params(object: &str, event_type: &str, session_id: Option<&str>) -> Value {
    let mut params = json!({
        "object": object,
        "type": event_type,
    });
    attach_session(&mut params, session_id);
    params
}

/// Params for an `unsubscribe` request.
pub fn unsubscribe_params(object: &str, subscription: &str, session_id: Option<&str>) -> Value {
    let mut params = json!({
        "object": object,
        "subscription": subscription,
    });
    attach_session(&mut params, session_id);
    params
}

/// Params for a `release` request.
pub fn release_params(object: &str, session_id: Option<&str>) -> Value {
    let mut params = json!({ "object": object });
    attach_session(&mut params, session_id);
    params
}

/// Params for a `ping` request, carrying the keepalive interval.
pub fn ping_params(interval_ms: u64) -> Value {
    json!({ "interval": interval_ms })
}

fn attach_session(params: &mut Value, session_id: Option<&str>) {
    if let (Some(obj), Some(session)) = (params.as_object_mut(), session_id) {
        obj.insert("sessionId".to_string(), Value::String(session.to_string()));
    }
}
