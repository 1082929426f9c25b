//! Signed operation records.
//!
//! An operation travels inside an Operation message as
//! `{"type": ..., "operation": {...fields, "fee", "sequence", "signer"}, "signature": ...}`.
//! The signature covers the type tag immediately followed by the canonical
//! JSON of the operation object.

use serde_json::{Map, Value};

use crate::canonical::canonical_json;
use crate::crypto::{KeyPair, PublicKey};
use crate::error::ProtocolError;
use crate::message::{tags, Message};

/// An operation signed by its submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperation {
    kind: String,
    operation: Map<String, Value>,
    signature: String,
}

impl SignedOperation {
    /// Sign an operation.
    ///
    /// `signer`, `fee` and `sequence` are filled in on top of `fields`.
    pub fn sign(
        kind: impl Into<String>,
        mut fields: Map<String, Value>,
        fee: u64,
        sequence: u32,
        key_pair: &KeyPair,
    ) -> Self {
        let kind = kind.into();
        fields.insert("fee".into(), Value::from(fee));
        fields.insert("sequence".into(), Value::from(sequence));
        fields.insert(
            "signer".into(),
            Value::String(key_pair.public_key().encode()),
        );
        let signature = key_pair.sign(&signing_text(&kind, &fields));
        Self {
            kind,
            operation: fields,
            signature,
        }
    }

    /// Parse and verify an operation record from its JSON form.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let malformed = |what: &str| ProtocolError::MalformedMessage(format!("operation {what}"));

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing type"))?;
        let operation = value
            .get("operation")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed("missing body"))?;
        let signature = value
            .get("signature")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing signature"))?;

        let op = Self {
            kind: kind.to_string(),
            operation: operation.clone(),
            signature: signature.to_string(),
        };
        let signer = op.signer()?;
        if !signer.verify(&signing_text(&op.kind, &op.operation), &op.signature) {
            return Err(ProtocolError::SignatureMismatch);
        }
        Ok(op)
    }

    /// The JSON record form.
    pub fn to_value(&self) -> Value {
        let mut record = Map::new();
        record.insert("type".into(), Value::String(self.kind.clone()));
        record.insert("operation".into(), Value::Object(self.operation.clone()));
        record.insert("signature".into(), Value::String(self.signature.clone()));
        Value::Object(record)
    }

    /// Wrap a batch of operations in an Operation message.
    pub fn into_message(operations: Vec<SignedOperation>) -> Message {
        let mut payload = Map::new();
        payload.insert(
            "operations".into(),
            Value::Array(operations.iter().map(SignedOperation::to_value).collect()),
        );
        Message::new(tags::OPERATION, payload)
    }

    /// The operation type tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The operation body, including fee, sequence and signer.
    pub fn operation(&self) -> &Map<String, Value> {
        &self.operation
    }

    /// The base64 signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The sequence number claimed by this operation.
    pub fn sequence(&self) -> Option<u32> {
        self.operation
            .get("sequence")
            .and_then(Value::as_u64)
            .and_then(|s| u32::try_from(s).ok())
    }

    /// The signer's public key.
    pub fn signer(&self) -> Result<PublicKey, ProtocolError> {
        let text = self
            .operation
            .get("signer")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::MalformedMessage("operation missing signer".into()))?;
        Ok(PublicKey::decode(text)?)
    }
}

fn signing_text(kind: &str, operation: &Map<String, Value>) -> String {
    let mut text = kind.to_string();
    text.push_str(&canonical_json(&Value::Object(operation.clone())));
    text
}
