//! Golden test vectors for cross-implementation verification.
//!
//! Every implementation of the protocol must derive the same keys, produce
//! the same signatures and emit the same wire bytes for these inputs.

use coinkit_core::{KeyPair, Message, SignedMessage};
use serde_json::Value;

/// A signature produced by a fixed private key.
#[derive(Debug, Clone)]
pub struct SignatureVector {
    pub name: &'static str,
    /// Base64 of the 64-byte private key.
    pub private_key: &'static str,
    /// Expected encoded public key.
    pub public_key: &'static str,
    pub message: &'static str,
    /// Expected base64 signature, unpadded.
    pub signature: &'static str,
}

/// A key pair derived from a secret phrase.
#[derive(Debug, Clone)]
pub struct PhraseVector {
    pub phrase: &'static str,
    pub public_key: &'static str,
}

/// A message signed by a phrase-derived key, in canonical and wire form.
#[derive(Debug, Clone)]
pub struct EnvelopeVector {
    pub name: &'static str,
    pub phrase: &'static str,
    pub message_type: &'static str,
    /// The message payload as JSON.
    pub payload: &'static str,
    pub canonical_text: &'static str,
    /// Serialized envelope, without the trailing newline.
    pub serialized: &'static str,
}

pub fn signature_vectors() -> Vec<SignatureVector> {
    vec![SignatureVector {
        name: "hello, hello",
        private_key: "1YBC5qpaM14DrVdsap5DtBWRv9IHf3Leyd95MOSSBV1cua0Uhxl/Y6afXFHIvFP+/m9V99AeVQndCtBV1E7/Tw",
        public_key: "0x5cb9ad1487197f63a69f5c51c8bc53fefe6f55f7d01e5509dd0ad055d44eff4f9a86",
        message: "hello, hello",
        signature: "7cvpEprNqYCkSuf8rgyV+ESSyziubcCCQpCVtp61FxMff6A3eRVPgFiKnJkH6DfIB0uMEwOr65GFVWnd8n9JAw",
    }]
}

pub fn phrase_vectors() -> Vec<PhraseVector> {
    vec![
        PhraseVector {
            phrase: "foo",
            public_key: "0x5cb9ad1487197f63a69f5c51c8bc53fefe6f55f7d01e5509dd0ad055d44eff4f9a86",
        },
        PhraseVector {
            phrase: "monkey",
            public_key: "0x2d2582674de2001d73499213adb5f2fd7d6e3296822eac6791a4763212b2efaf06de",
        },
    ]
}

pub fn envelope_vectors() -> Vec<EnvelopeVector> {
    vec![EnvelopeVector {
        name: "account query",
        phrase: "foo",
        message_type: "Query",
        payload: r#"{"account":"0x5cb9ad1487197f63a69f5c51c8bc53fefe6f55f7d01e5509dd0ad055d44eff4f9a86"}"#,
        canonical_text: r#"{"message":{"account":"0x5cb9ad1487197f63a69f5c51c8bc53fefe6f55f7d01e5509dd0ad055d44eff4f9a86"},"type":"Query"}"#,
        serialized: concat!(
            "e:0x5cb9ad1487197f63a69f5c51c8bc53fefe6f55f7d01e5509dd0ad055d44eff4f9a86:",
            "b0zwm5CPBj2DX2NEZQoivtvQ2CuknWSAvkJ/QclknmjjtzX6HyV5oSba56HQwvqaVjoTVRX8LNvZebf8tanRDg:",
            r#"{"message":{"account":"0x5cb9ad1487197f63a69f5c51c8bc53fefe6f55f7d01e5509dd0ad055d44eff4f9a86"},"type":"Query"}"#,
        ),
    }]
}

/// Sign an envelope vector's message with its phrase-derived key.
pub fn sign_envelope_vector(vector: &EnvelopeVector) -> Result<SignedMessage, String> {
    let payload: Value = serde_json::from_str(vector.payload).map_err(|e| e.to_string())?;
    let message = Message::from_value(vector.message_type, payload).map_err(|e| e.to_string())?;
    let key_pair = KeyPair::from_secret_phrase(vector.phrase);
    Ok(SignedMessage::from_signing(message, &key_pair))
}

/// Check every vector against this implementation.
///
/// Returns `(name, matches, actual)` for each check.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let mut results = Vec::new();

    for v in signature_vectors() {
        let (ok, actual) = match KeyPair::from_private_key_base64(v.private_key) {
            Ok(kp) => {
                let signature = kp.sign(v.message);
                let ok = signature == v.signature && kp.public_key().encode() == v.public_key;
                (ok, signature)
            }
            Err(e) => (false, e.to_string()),
        };
        results.push((format!("signature: {}", v.name), ok, actual));
    }

    for v in phrase_vectors() {
        let actual = KeyPair::from_secret_phrase(v.phrase).public_key().encode();
        results.push((format!("phrase: {}", v.phrase), actual == v.public_key, actual));
    }

    for v in envelope_vectors() {
        let (ok, actual) = match sign_envelope_vector(&v) {
            Ok(signed) => {
                let serialized = signed.serialize();
                let ok = signed.message_text() == v.canonical_text && serialized == v.serialized;
                (ok, serialized)
            }
            Err(e) => (false, e),
        };
        results.push((format!("envelope: {}", v.name), ok, actual));
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for (name, ok, actual) in verify_all_vectors() {
            assert!(ok, "vector '{name}' produced {actual}");
        }
    }

    #[test]
    fn test_envelope_vectors_parse() {
        for v in envelope_vectors() {
            let parsed = SignedMessage::from_serialized(v.serialized).unwrap();
            assert_eq!(parsed.message().kind(), v.message_type);
            assert_eq!(parsed.message_text(), v.canonical_text);
        }
    }
}
