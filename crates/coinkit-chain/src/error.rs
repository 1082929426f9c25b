//! Error types for the chain client.

use std::time::Duration;

use coinkit_core::ProtocolError;
use thiserror::Error;

/// A single failed round trip, as reported by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that can occur when talking to the ledger.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Every attempt to reach the ledger failed.
    #[error("connection to the blockchain failed after {attempts} attempts: {message}")]
    Transport { attempts: u32, message: String },

    /// The response envelope was malformed or badly signed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The ledger explicitly rejected the request. Displayed verbatim.
    #[error("{0}")]
    Chain(String),

    /// The ledger sent a keepalive where a response was required.
    #[error("empty response from the blockchain")]
    EmptyResponse,

    /// The ledger answered with an unexpected message type.
    #[error("unexpected {0} message from the blockchain")]
    UnexpectedMessage(String),

    /// A response payload did not have the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// The submitter has no account on the ledger.
    #[error("no account exists for {0}")]
    MissingAccount(String),

    /// A create operation landed but no new entity appeared.
    #[error("no {0} seems to have been created")]
    NotCreated(&'static str),

    /// The submitted sequence was not observed in time.
    #[error("sequence {sequence} was not observed after {waited:?}")]
    ConsistencyTimeout { sequence: u32, waited: Duration },

    /// A configured endpoint is not a valid base URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// No endpoints are configured.
    #[error("no endpoints configured")]
    NoEndpoints,

    /// The client was cancelled.
    #[error("cancelled")]
    Cancelled,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
