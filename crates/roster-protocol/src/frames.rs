//! Frames exchanged on an event socket. The `type` tag tells them apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Viewer request.
/// Wire: `{ "type": "req", "id": "abc", "method": "roster.register", "params": {...} }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "req")]
pub struct ReqFrame {
    pub id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Answer to one request, carrying the action outcome when `ok`.
/// Wire: `{ "type": "res", "id": "abc", "ok": false, "error": { "code": "...", "message": "..." } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "res")]
pub struct ResFrame<P = Value> {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<P>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl<P> ResFrame<P> {
    pub fn ok(id: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: &str, message: &str) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

/// Push frame on an event channel. For roster changes `seq` is the event
/// version right after the change.
/// Wire: `{ "type": "event", "event": "inscription", "payload": {...}, "seq": 42 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "event")]
pub struct EventFrame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            event: event.into(),
            payload: serde_json::to_value(payload).ok(),
            seq: None,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}

/// Any frame read off the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFrame {
    Req(ReqFrame),
    Event(EventFrame),
    /// `res` frames and tags this protocol does not define.
    #[serde(other)]
    Other,
}

impl InboundFrame {
    pub fn as_req(&self) -> Option<&ReqFrame> {
        match self {
            InboundFrame::Req(req) => Some(req),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventFrame> {
        match self {
            InboundFrame::Event(ev) => Some(ev),
            _ => None,
        }
    }
}
