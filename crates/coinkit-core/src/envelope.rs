//! Signed message envelope and its wire framing.
//!
//! Wire form: `e:<signer>:<signature>:<canonical message text>`.
//! The message text may itself contain colons, so everything after the third
//! colon belongs to it.

use std::fmt;

use crate::crypto::{KeyPair, PublicKey};
use crate::error::ProtocolError;
use crate::message::Message;

/// Envelope version tag.
pub const ENVELOPE_VERSION: &str = "e";

/// A message together with its canonical text and a detached signature.
///
/// Only constructed by signing or by parsing a verified wire envelope, so the
/// signature always matches the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    message: Message,
    message_text: String,
    signer: PublicKey,
    signer_text: String,
    signature: String,
}

impl SignedMessage {
    /// Sign a message with the given key pair.
    pub fn from_signing(message: Message, key_pair: &KeyPair) -> Self {
        let message_text = message.canonical_text();
        let signature = key_pair.sign(&message_text);
        let signer = key_pair.public_key();
        Self {
            message,
            message_text,
            signer_text: signer.encode(),
            signer,
            signature,
        }
    }

    /// Parse and verify a wire envelope.
    pub fn from_serialized(serialized: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = serialized.splitn(4, ':').collect();
        let [version, signer_text, signature, message_text] = parts[..] else {
            return Err(ProtocolError::TooFewSegments(parts.len()));
        };

        if version != ENVELOPE_VERSION {
            return Err(ProtocolError::UnknownVersion(version.to_string()));
        }

        let signer = PublicKey::decode(signer_text)?;
        if !signer.verify(message_text, signature) {
            return Err(ProtocolError::SignatureMismatch);
        }

        let message = Message::from_text(message_text)?;
        Ok(Self {
            message,
            message_text: message_text.to_string(),
            signer,
            signer_text: signer_text.to_string(),
            signature: signature.to_string(),
        })
    }

    /// Produce the wire form (without a trailing newline).
    pub fn serialize(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            ENVELOPE_VERSION, self.signer_text, self.signature, self.message_text
        )
    }

    /// The signed message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Consume the envelope, returning the message.
    pub fn into_message(self) -> Message {
        self.message
    }

    /// The exact text that was signed.
    pub fn message_text(&self) -> &str {
        &self.message_text
    }

    /// The signer's public key.
    pub fn signer(&self) -> &PublicKey {
        &self.signer
    }

    /// The signer's public key as it appeared on the wire.
    pub fn signer_text(&self) -> &str {
        &self.signer_text
    }

    /// The base64 signature.
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Display for SignedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::tags;
    use serde_json::json;

    fn query() -> Message {
        Message::from_value(tags::QUERY, json!({"account": "x:y:z"})).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let kp = KeyPair::from_secret_phrase("foo");
        let sm = SignedMessage::from_signing(query(), &kp);
        let sm2 = SignedMessage::from_serialized(&sm.serialize()).unwrap();
        assert_eq!(sm2, sm);
        assert_eq!(sm2.message(), &query());
        assert_eq!(sm2.signer(), &kp.public_key());
    }

    #[test]
    fn test_too_few_segments() {
        assert_eq!(
            SignedMessage::from_serialized("e:abc:def"),
            Err(ProtocolError::TooFewSegments(3))
        );
        assert_eq!(
            SignedMessage::from_serialized(""),
            Err(ProtocolError::TooFewSegments(1))
        );
    }

    #[test]
    fn test_bad_version() {
        let kp = KeyPair::from_secret_phrase("foo");
        let wire = SignedMessage::from_signing(query(), &kp).serialize();
        let tampered = format!("f{}", &wire[1..]);
        assert_eq!(
            SignedMessage::from_serialized(&tampered),
            Err(ProtocolError::UnknownVersion("f".into()))
        );
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let kp = KeyPair::from_secret_phrase("foo");
        let other = KeyPair::from_secret_phrase("bar").public_key().encode();
        let sm = SignedMessage::from_signing(query(), &kp);
        let wire = format!("e:{}:{}:{}", other, sm.signature(), sm.message_text());
        assert_eq!(
            SignedMessage::from_serialized(&wire),
            Err(ProtocolError::SignatureMismatch)
        );
    }

    #[test]
    fn test_tampered_text_rejected() {
        let kp = KeyPair::from_secret_phrase("foo");
        let wire = SignedMessage::from_signing(query(), &kp).serialize();
        let tampered = wire.replace("x:y:z", "x:y:w");
        assert_eq!(
            SignedMessage::from_serialized(&tampered),
            Err(ProtocolError::SignatureMismatch)
        );
    }
}
