//! # Coinkit
//!
//! The unified API for coinkit: authenticated requests to the coinkit
//! ledger, and storage-provider hosting driven by the ledger's bucket
//! assignments.
//!
//! ## Overview
//!
//! - **Identity**: Ed25519 key pairs with a checksummed 70-character public
//!   key text form
//! - **Envelope**: canonical JSON messages signed and framed as
//!   `e:<signer>:<signature>:<message>`
//! - **Chain client**: retries, queries, and operations that only return once
//!   their effect is observable
//! - **Hosting**: a listener polling the provider's assignment and a
//!   reconciler converging local torrents to it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use coinkit::host::{HostingConfig, MemoryEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() -> coinkit::Result<()> {
//!     let config = HostingConfig::load("hosting.toml")?;
//!     let engine = Arc::new(MemoryEngine::new());
//!     coinkit::run_hosting(config, engine, CancellationToken::new()).await
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `coinkit::core` - Keys, messages and envelopes
//! - `coinkit::chain` - The ledger client
//! - `coinkit::host` - Hosting and reconciliation

pub mod error;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

// Re-export component crates
pub use coinkit_chain as chain;
pub use coinkit_core as core;
pub use coinkit_host as host;

pub use error::{CoinkitError, Result};

// Re-export commonly used types
pub use coinkit_chain::{Account, Bucket, ChainClient, ClientConfig, Operation, Provider};
pub use coinkit_core::{KeyPair, Message, PublicKey, SignedMessage, SignedOperation};
pub use coinkit_host::{HostingConfig, HostingServer, ReconciliationReport, TorrentEngine};

/// Install a fmt subscriber for `tracing` events.
///
/// `RUST_LOG` wins if set; otherwise `verbose` selects `debug` over `info`.
/// Calling this more than once is harmless.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .try_init();
}

/// Host from a configuration until `cancel` fires.
///
/// Configuration problems are returned before anything is hosted.
pub async fn run_hosting(
    config: HostingConfig,
    engine: Arc<dyn TorrentEngine>,
    cancel: CancellationToken,
) -> Result<()> {
    init_tracing(config.verbose);
    tracing::info!(directory = %config.directory.display(), capacity = config.capacity, "starting");
    let mut server = HostingServer::new(config, engine)?;
    server.serve(cancel).await?;
    Ok(())
}
