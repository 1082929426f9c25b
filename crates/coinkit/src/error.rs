//! Error types for coinkit.

use coinkit_chain::ClientError;
use coinkit_core::{KeyError, ProtocolError};
use coinkit_host::{ConfigError, HostError, TorrentError};
use thiserror::Error;

/// Any error coinkit can produce.
#[derive(Debug, Error)]
pub enum CoinkitError {
    /// Malformed key material.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Malformed or badly signed envelope.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Ledger communication failed or was rejected.
    #[error("chain error: {0}")]
    Client(#[from] ClientError),

    /// Invalid hosting configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("torrent error: {0}")]
    Torrent(#[from] TorrentError),
}

impl From<HostError> for CoinkitError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Config(e) => CoinkitError::Config(e),
            HostError::Torrent(e) => CoinkitError::Torrent(e),
            HostError::Client(e) => CoinkitError::Client(e),
        }
    }
}

impl CoinkitError {
    /// Whether the process should refuse to start.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, CoinkitError::Config(_) | CoinkitError::Key(_))
    }
}

/// Result type for coinkit operations.
pub type Result<T> = std::result::Result<T, CoinkitError>;
