//! Wire envelope.
//!
//! Every message crossing the transport has the stable shape
//!
//! ```text
//! { "_event": <string>, "payload": <any, optional>, "cid": <string, optional> }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::correlation::CorrelationId;

/// Built-in event used to establish the connection.
pub const HANDSHAKE_EVENT: &str = "handshake";

/// Local event raised when the handshake completes.
pub const CONNECT_EVENT: &str = "connect";

/// Why inbound data was not a usable envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedEnvelope {
    /// Data was not a JSON object.
    #[error("message data is not an object")]
    NotAnObject,
    /// `_event` missing or not a string.
    #[error("message has no string `_event` field")]
    MissingEvent,
    /// Remaining fields had the wrong shape.
    #[error("invalid envelope: {0}")]
    Invalid(String),
}

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name.
    #[serde(rename = "_event")]
    pub event: String,
    /// Optional payload. A present `null` is `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<Value>,
    /// Correlation id when the sender expects a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<CorrelationId>,
}

/// Any present field is `Some`, `null` included; absence falls back to `default`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Envelope {
    /// Envelope for `event` with no payload.
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: None,
            cid: None,
        }
    }

    /// The handshake envelope.
    #[must_use]
    pub fn handshake() -> Self {
        Self::new(HANDSHAKE_EVENT)
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Option<Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a correlation id.
    #[must_use]
    pub fn with_cid(mut self, cid: CorrelationId) -> Self {
        self.cid = Some(cid);
        self
    }

    /// Whether this is the built-in handshake.
    #[must_use]
    pub fn is_handshake(&self) -> bool {
        self.event == HANDSHAKE_EVENT
    }

    /// Decode inbound message data.
    pub fn from_value(data: Value) -> Result<Self, MalformedEnvelope> {
        let Value::Object(fields) = &data else {
            return Err(MalformedEnvelope::NotAnObject);
        };
        if !matches!(fields.get("_event"), Some(Value::String(_))) {
            return Err(MalformedEnvelope::MissingEvent);
        }
        serde_json::from_value(data).map_err(|e| MalformedEnvelope::Invalid(e.to_string()))
    }

    /// Encode for the wire.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
