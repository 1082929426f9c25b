//! Cryptographic identity for coinkit.
//!
//! Wraps Ed25519 signing with strong types and the ledger's text formats:
//!
//! - Public keys travel as `0x` + 64 hex chars + a 4 hex char checksum
//!   (the first two bytes of SHA-512/256 over the raw key), 70 chars total.
//! - Signatures travel as unpadded standard base64.
//! - Private keys are the 64-byte Ed25519 expanded form (seed || public key).

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};
use std::fmt;
use std::str::FromStr;

use crate::error::KeyError;

/// Length of a raw public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of a raw private key (seed followed by public key).
pub const PRIVATE_KEY_LEN: usize = 64;

/// Length of the checksum appended to an encoded public key.
pub const CHECKSUM_LEN: usize = 2;

/// Length of an encoded public key, including the `0x` prefix.
pub const PUBLIC_KEY_TEXT_LEN: usize = 2 + 2 * (PUBLIC_KEY_LEN + CHECKSUM_LEN);

/// Unpadded standard base64. Decoding tolerates padding so keys pasted from
/// other tools still load.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// SHA-512/256 of the given data.
pub fn sha512_256(data: &[u8]) -> [u8; 32] {
    Sha512_256::digest(data).into()
}

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice, rejecting any length other than 32.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; PUBLIC_KEY_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// The two checksum bytes appended to the text form.
    pub fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let hash = sha512_256(&self.0);
        [hash[0], hash[1]]
    }

    /// Encode as the 70-character `0x...` text form.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(PUBLIC_KEY_TEXT_LEN);
        out.push_str("0x");
        out.push_str(&hex::encode(self.0));
        out.push_str(&hex::encode(self.checksum()));
        out
    }

    /// Decode the text form, checking the prefix, length and checksum.
    pub fn decode(text: &str) -> Result<Self, KeyError> {
        let body = text.strip_prefix("0x").ok_or(KeyError::MissingPrefix)?;
        if text.len() != PUBLIC_KEY_TEXT_LEN {
            return Err(KeyError::InvalidTextLength {
                expected: PUBLIC_KEY_TEXT_LEN,
                actual: text.len(),
            });
        }

        let bytes = hex::decode(body).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        let (raw, checksum) = bytes.split_at(PUBLIC_KEY_LEN);
        let key = Self::from_slice(raw)?;
        if checksum != key.checksum() {
            return Err(KeyError::ChecksumMismatch);
        }
        Ok(key)
    }

    /// Verify a base64 signature over a UTF-8 message.
    ///
    /// Never fails loudly: a malformed signature or an invalid curve point
    /// simply does not verify.
    pub fn verify(&self, message: &str, signature: &str) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig_bytes) = BASE64.decode(signature) else {
            return false;
        };
        let Ok(sig_arr) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
            return false;
        };
        let sig = Signature::from_bytes(&sig_arr);
        verifying_key.verify(message.as_bytes(), &sig).is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(0x{}...)", &hex::encode(self.0)[..8])
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::decode(&text).map_err(de::Error::custom)
    }
}

/// Verify a signature given every input in its text form.
///
/// Returns `false` for any malformed input instead of an error, so callers
/// can treat "bad key", "bad signature encoding" and "wrong signature" alike.
pub fn verify(public_key: &str, message: &str, signature: &str) -> bool {
    match PublicKey::decode(public_key) {
        Ok(key) => key.verify(message, signature),
        Err(_) => false,
    }
}

/// An Ed25519 key pair. Immutable once constructed.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new key pair from OS entropy.
    pub fn from_random() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create from the raw 64-byte private key (seed || public key).
    ///
    /// Rejects any other length, and a public half that does not belong
    /// to the seed.
    pub fn from_private_key_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; PRIVATE_KEY_LEN] =
            bytes.try_into().map_err(|_| KeyError::InvalidLength {
                expected: PRIVATE_KEY_LEN,
                actual: bytes.len(),
            })?;
        let signing_key =
            SigningKey::from_keypair_bytes(&arr).map_err(|_| KeyError::MismatchedKeyPair)?;
        Ok(Self { signing_key })
    }

    /// Create from the base64 text of the 64-byte private key.
    pub fn from_private_key_base64(text: &str) -> Result<Self, KeyError> {
        let bytes = BASE64
            .decode(text.trim())
            .map_err(|e| KeyError::InvalidBase64(e.to_string()))?;
        Self::from_private_key_bytes(&bytes)
    }

    /// Derive a key pair deterministically from a secret phrase.
    ///
    /// The seed is the SHA-512/256 hash of the phrase's UTF-8 bytes.
    pub fn from_secret_phrase(phrase: &str) -> Self {
        Self::from_seed(&sha512_256(phrase.as_bytes()))
    }

    /// Parse the serialized form produced by [`KeyPair::serialize`].
    pub fn from_serialized(text: &str) -> Result<Self, KeyError> {
        let record: SerializedKeyPair = serde_json::from_str(text)
            .map_err(|e| KeyError::MalformedKeyPair(e.to_string()))?;
        let kp = Self::from_private_key_base64(&record.private)?;
        let public = PublicKey::decode(&record.public)?;
        if public != kp.public_key() {
            return Err(KeyError::MismatchedKeyPair);
        }
        Ok(kp)
    }

    /// Serialize as `{"Public": "0x...", "Private": "<base64>"}`.
    pub fn serialize(&self) -> String {
        serde_json::json!({
            "Public": self.public_key().encode(),
            "Private": self.private_key_base64(),
        })
        .to_string()
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Get the 64-byte private key (secret key material).
    pub fn private_key_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.signing_key.to_keypair_bytes()
    }

    /// Get the private key as unpadded base64.
    pub fn private_key_base64(&self) -> String {
        BASE64.encode(self.private_key_bytes())
    }

    /// Sign a UTF-8 message, returning the signature as unpadded base64.
    pub fn sign(&self, message: &str) -> String {
        let sig = self.signing_key.sign(message.as_bytes());
        BASE64.encode(sig.to_bytes())
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.private_key_bytes() == other.private_key_bytes()
    }
}

impl Eq for KeyPair {}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({:?})", self.public_key())
    }
}

#[derive(Deserialize)]
struct SerializedKeyPair {
    #[serde(rename = "Public")]
    public: String,
    #[serde(rename = "Private")]
    private: String,
}
