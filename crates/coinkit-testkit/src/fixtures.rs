//! Test fixtures and helpers.
//!
//! Wires an in-memory ledger, chain clients, an in-memory torrent engine and
//! a temporary hosting directory together for integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use coinkit_chain::{Bucket, ChainClient, ClientConfig, MemoryLedger};
use coinkit_core::KeyPair;
use coinkit_host::{HostingConfig, InfoHash, MemoryEngine, TorrentMetadata};
use tempfile::TempDir;

/// Client configuration with millisecond waits, for tests.
pub fn fast_client_config() -> ClientConfig {
    ClientConfig::default()
        .with_retries(3, Duration::from_millis(1))
        .with_poll_interval(Duration::from_millis(1))
}

/// A magnet URI for an info-hash.
pub fn magnet_for(info_hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{info_hash}&dn={info_hash}")
}

/// A deterministic 40-character info-hash.
pub fn info_hash(index: u8) -> String {
    format!("{index:040x}")
}

/// A ledger, an engine and a hosting directory.
pub struct HostingFixture {
    pub ledger: Arc<MemoryLedger>,
    pub engine: Arc<MemoryEngine>,
    /// Owner of the hosted provider.
    pub owner: KeyPair,
    pub directory: TempDir,
}

impl HostingFixture {
    /// Create a fixture whose owner has a funded account.
    pub async fn new() -> std::io::Result<Self> {
        let fixture = Self {
            ledger: Arc::new(MemoryLedger::new()),
            engine: Arc::new(MemoryEngine::new()),
            owner: KeyPair::from_secret_phrase("hosting fixture owner"),
            directory: tempfile::tempdir()?,
        };
        fixture.fund(&fixture.owner).await;
        Ok(fixture)
    }

    /// Give a key pair an account on the ledger.
    pub async fn fund(&self, key_pair: &KeyPair) {
        self.ledger
            .create_account(&key_pair.public_key().encode(), 1_000)
            .await;
    }

    /// A client signing with `key_pair`, talking to the fixture's ledger.
    pub fn client_for(&self, key_pair: &KeyPair) -> coinkit_chain::Result<Arc<ChainClient>> {
        let client = ChainClient::with_transport(
            fast_client_config(),
            Some(key_pair.clone()),
            self.ledger.clone(),
        )?;
        Ok(Arc::new(client))
    }

    /// A client signing as the owner.
    pub fn owner_client(&self) -> coinkit_chain::Result<Arc<ChainClient>> {
        self.client_for(&self.owner)
    }

    pub fn directory(&self) -> &Path {
        self.directory.path()
    }

    /// Hosting configuration for the owner's provider, with the owner's key
    /// pair written to a file in the hosting directory's parent.
    pub fn hosting_config(&self, capacity: u32) -> std::io::Result<HostingConfig> {
        let key_file = self.key_file_path();
        std::fs::write(&key_file, self.owner.serialize())?;
        let mut config = HostingConfig::with_key_pair(key_file, capacity, self.hosting_root()?);
        config.listen_interval_ms = 5;
        config.chain = fast_client_config();
        Ok(config)
    }

    /// Root for hosted torrents, a subdirectory of the fixture directory.
    pub fn hosting_root(&self) -> std::io::Result<PathBuf> {
        let root = self.directory.path().join("hosted");
        std::fs::create_dir_all(&root)?;
        Ok(root)
    }

    fn key_file_path(&self) -> PathBuf {
        self.directory.path().join("owner.json")
    }

    /// Publish a bucket pointing at `hash` and allocate it to `provider_id`.
    ///
    /// The torrent's metadata reports `content_bytes` bytes.
    pub async fn publish(
        &self,
        name: &str,
        hash: &str,
        size_mb: u32,
        content_bytes: u64,
        provider_id: u64,
    ) {
        self.ledger
            .insert_bucket(Bucket {
                name: name.to_string(),
                owner: self.owner.public_key().encode(),
                size: size_mb,
                magnet: magnet_for(hash),
                providers: Vec::new(),
            })
            .await;
        self.ledger.insert_allocation(name, provider_id).await;
        if let Ok(info_hash) = InfoHash::new(hash) {
            self.engine
                .set_metadata(info_hash, TorrentMetadata::single_file(name, content_bytes))
                .await;
        }
    }
}
