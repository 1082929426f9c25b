//! # Coinkit Host
//!
//! Storage-provider hosting: keep the torrents on local disk in line with
//! the buckets the ledger assigns to a provider.
//!
//! ## Overview
//!
//! ```text
//! ChainClient ──► ProviderListener ──snapshots──► Reconciler ──► TorrentEngine
//!                                                     │
//!                                                     └──► <directory>/<info-hash>/
//! ```
//!
//! - [`ProviderListener`] polls the ledger and delivers full snapshots.
//! - [`Reconciler`] diffs each snapshot against what it last applied, starts
//!   and stops torrents, and rejects torrents larger than their bucket.
//! - [`HostingServer`] resolves the provider id and wires the two together.
//!
//! The BitTorrent protocol is behind the [`TorrentEngine`] trait;
//! [`torrent::memory::MemoryEngine`] is an in-process implementation.

pub mod config;
pub mod error;
pub mod listener;
pub mod magnet;
pub mod reconcile;
pub mod server;
pub mod torrent;

pub use config::{load_key_pair, HostingConfig, ProviderIdentity, DEFAULT_LISTEN_INTERVAL_MS};
pub use error::{ConfigError, HostError, Result, TorrentError};
pub use listener::{ProviderListener, Snapshot};
pub use magnet::{InfoHash, BTIH_PREFIX, MIN_INFO_HASH_LEN};
pub use reconcile::{ReconciliationReport, Reconciler};
pub use server::HostingServer;
pub use torrent::{memory::EngineAction, memory::MemoryEngine, TorrentEngine, TorrentFile, TorrentMetadata};
