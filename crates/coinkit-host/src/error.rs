//! Error types for hosting.

use std::path::PathBuf;
use std::time::Duration;

use coinkit_chain::ClientError;
use thiserror::Error;

/// Invalid startup configuration. Fatal: the server must not start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Both `id` and `key_pair` were set.
    #[error("only one of the id and key_pair options can be set")]
    AmbiguousIdentity,

    /// Neither `id` nor `key_pair` was set.
    #[error("one of the id and key_pair options must be set")]
    MissingIdentity,

    #[error("capacity must be a positive number of megabytes")]
    NonPositiveCapacity,

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    /// The key-pair file could not be read or parsed.
    #[error("could not load key pair from {path}: {message}")]
    KeyFile { path: PathBuf, message: String },

    /// The configuration file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// The owning key has more than one provider on the ledger.
    #[error("{owner} owns {count} providers; hosting for multiple providers is not supported")]
    MultipleProviders { owner: String, count: usize },

    /// The owned provider declares less capacity on the ledger than is
    /// configured locally.
    #[error("the chain only has {on_chain} capacity for this provider but {configured} is configured")]
    InsufficientCapacity { on_chain: u32, configured: u32 },
}

/// Errors from a torrent engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TorrentError {
    /// The magnet URI has no usable info-hash.
    #[error("unknown magnet format: {0}")]
    InvalidMagnet(String),

    #[error("no torrent with info hash {0}")]
    NotFound(String),

    #[error("metadata for {info_hash} did not arrive within {waited:?}")]
    MetadataTimeout { info_hash: String, waited: Duration },

    #[error("torrent engine error: {0}")]
    Engine(String),
}

/// Errors that can occur while hosting.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("chain error: {0}")]
    Client(#[from] ClientError),
}

/// Result type for hosting operations.
pub type Result<T> = std::result::Result<T, HostError>;
