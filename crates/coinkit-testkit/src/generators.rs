//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

use coinkit_core::{KeyPair, Message, PublicKey};

/// Largest integer that survives a round trip through an f64.
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Generate a random key pair.
pub fn key_pair() -> impl Strategy<Value = KeyPair> {
    any::<[u8; 32]>().prop_map(|seed| KeyPair::from_seed(&seed))
}

/// Generate a public key.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    key_pair().prop_map(|kp| kp.public_key())
}

/// Generate a message type tag.
pub fn message_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Query".to_string()),
        Just("Data".to_string()),
        Just("Operation".to_string()),
        "[A-Z][A-Za-z]{0,15}",
    ]
}

/// Generate a JSON leaf: null, bool, safe integer or string.
pub fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).prop_map(|n| Value::Number(Number::from(n))),
        ".{0,16}".prop_map(Value::String),
    ]
}

/// Generate a nested JSON value.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(".{0,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate a message payload.
pub fn payload() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-zA-Z:]{1,10}", json_value(), 0..5)
        .prop_map(|m| m.into_iter().collect())
}

/// Generate a message.
pub fn message() -> impl Strategy<Value = Message> {
    (message_type(), payload()).prop_map(|(kind, payload)| Message::new(kind, payload))
}

/// A key pair and a message for it to sign.
#[derive(Debug, Clone)]
pub struct EnvelopeParams {
    pub key_pair: KeyPair,
    pub message: Message,
}

impl Arbitrary for EnvelopeParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (key_pair(), message())
            .prop_map(|(key_pair, message)| EnvelopeParams { key_pair, message })
            .boxed()
    }
}

/// Replace the character at `index` with one that means something else.
pub fn corrupt_char(text: &str, index: usize) -> String {
    text.char_indices()
        .map(|(i, c)| {
            if i != index {
                c
            } else if c == '0' {
                '1'
            } else {
                '0'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinkit_core::{ProtocolError, SignedMessage, PUBLIC_KEY_TEXT_LEN};

    proptest! {
        #[test]
        fn test_envelope_round_trip(params: EnvelopeParams) {
            let signed = SignedMessage::from_signing(params.message.clone(), &params.key_pair);
            let parsed = SignedMessage::from_serialized(&signed.serialize()).unwrap();
            prop_assert_eq!(parsed.message(), &params.message);
            prop_assert_eq!(parsed.signer(), &params.key_pair.public_key());
        }

        #[test]
        fn test_signature_tamper_is_rejected(params in any::<EnvelopeParams>(), pick in any::<prop::sample::Index>()) {
            let signed = SignedMessage::from_signing(params.message, &params.key_pair);
            let signature = corrupt_char(signed.signature(), pick.index(signed.signature().len()));
            let tampered = format!("e:{}:{}:{}", signed.signer_text(), signature, signed.message_text());
            prop_assert!(SignedMessage::from_serialized(&tampered).is_err());
        }

        #[test]
        fn test_signer_tamper_is_rejected(params in any::<EnvelopeParams>(), pick in any::<prop::sample::Index>()) {
            let signed = SignedMessage::from_signing(params.message, &params.key_pair);
            let signer = corrupt_char(signed.signer_text(), pick.index(PUBLIC_KEY_TEXT_LEN));
            let tampered = format!("e:{}:{}:{}", signer, signed.signature(), signed.message_text());
            prop_assert!(SignedMessage::from_serialized(&tampered).is_err());
        }

        #[test]
        fn test_public_key_text_round_trip(key in public_key()) {
            let text = key.encode();
            prop_assert_eq!(text.len(), PUBLIC_KEY_TEXT_LEN);
            prop_assert!(text.starts_with("0x"));
            prop_assert_eq!(PublicKey::decode(&text).unwrap(), key);
        }

        #[test]
        fn test_checksum_corruption_is_rejected(key in public_key(), offset in 0usize..4) {
            let text = key.encode();
            let corrupted = corrupt_char(&text, PUBLIC_KEY_TEXT_LEN - 4 + offset);
            prop_assert!(PublicKey::decode(&corrupted).is_err());
        }

        #[test]
        fn test_short_envelopes_are_rejected(text in "[^:]{0,20}(:[^:]{0,20}){0,2}") {
            prop_assert!(
                matches!(
                    SignedMessage::from_serialized(&text),
                    Err(ProtocolError::TooFewSegments(_))
                ),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn test_corrupt_char_changes_one_char() {
        assert_eq!(corrupt_char("0abc", 0), "1abc");
        assert_eq!(corrupt_char("0abc", 2), "0a0c");
    }
}
