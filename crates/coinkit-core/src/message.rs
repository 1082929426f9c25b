//! Tagged messages exchanged with the ledger.
//!
//! A message is a type tag plus a JSON object payload. Its canonical text is
//! `{"message": <payload>, "type": <tag>}` encoded with [`canonical_json`],
//! which is the exact string that gets signed.

use serde_json::{Map, Value};

use crate::canonical::canonical_json;
use crate::error::ProtocolError;

/// Well-known message type tags.
pub mod tags {
    /// A read request; the payload holds query filters.
    pub const QUERY: &str = "Query";
    /// A query response.
    pub const DATA: &str = "Data";
    /// A rejection; the payload holds `{"error": <text>}`.
    pub const ERROR: &str = "Error";
    /// A batch of signed operations.
    pub const OPERATION: &str = "Operation";
}

/// A type tag and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: String,
    payload: Map<String, Value>,
}

impl Message {
    /// Create a message from a tag and an object payload.
    pub fn new(kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Create a message from a tag and any JSON value.
    ///
    /// The payload must be an object; `null` is accepted as an empty one.
    pub fn from_value(kind: impl Into<String>, payload: Value) -> Result<Self, ProtocolError> {
        match payload {
            Value::Object(map) => Ok(Self::new(kind, map)),
            Value::Null => Ok(Self::new(kind, Map::new())),
            other => Err(ProtocolError::MalformedMessage(format!(
                "payload must be an object, got {other}"
            ))),
        }
    }

    /// Create an Error message carrying the given text.
    pub fn error(text: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("error".into(), Value::String(text.into()));
        Self::new(tags::ERROR, payload)
    }

    /// The type tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The payload object.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Consume the message, returning its payload.
    pub fn into_payload(self) -> Map<String, Value> {
        self.payload
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Whether this is an Error message.
    pub fn is_error(&self) -> bool {
        self.kind == tags::ERROR
    }

    /// The server-supplied text of an Error message.
    pub fn error_text(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        Some(
            self.payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error"),
        )
    }

    /// The `{"message": ..., "type": ...}` JSON value.
    pub fn to_value(&self) -> Value {
        let mut envelope = Map::new();
        envelope.insert("message".into(), Value::Object(self.payload.clone()));
        envelope.insert("type".into(), Value::String(self.kind.clone()));
        Value::Object(envelope)
    }

    /// The canonical text that gets signed.
    pub fn canonical_text(&self) -> String {
        canonical_json(&self.to_value())
    }

    /// Parse the `{"message": ..., "type": ...}` text form.
    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;
        let Value::Object(mut envelope) = value else {
            return Err(ProtocolError::MalformedMessage("expected an object".into()));
        };
        let kind = match envelope.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(ProtocolError::MalformedMessage("missing type".into())),
        };
        let payload = envelope.remove("message").unwrap_or(Value::Null);
        Self::from_value(kind, payload)
    }
}
