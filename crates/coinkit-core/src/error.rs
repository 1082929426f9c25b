//! Error types for coinkit core.

use thiserror::Error;

/// Errors from constructing or decoding keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid public key text length: expected {expected} characters, got {actual}")]
    InvalidTextLength { expected: usize, actual: usize },

    #[error("public key text must start with 0x")]
    MissingPrefix,

    #[error("invalid hex in public key: {0}")]
    InvalidHex(String),

    #[error("public key checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid base64 in private key: {0}")]
    InvalidBase64(String),

    #[error("private key does not match its public key")]
    MismatchedKeyPair,

    #[error("malformed serialized key pair: {0}")]
    MalformedKeyPair(String),
}

/// Errors from parsing or verifying a signed wire envelope.
///
/// These are never retried: a malformed envelope stays malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("could not find 4 parts in envelope, found {0}")]
    TooFewSegments(usize),

    #[error("unrecognized envelope version: {0:?}")]
    UnknownVersion(String),

    #[error("invalid signer: {0}")]
    InvalidSigner(#[from] KeyError),

    #[error("signature failed verification")]
    SignatureMismatch,

    #[error("malformed message: {0}")]
    MalformedMessage(String),
}
