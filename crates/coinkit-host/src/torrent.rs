//! Torrent engine abstraction.
//!
//! The BitTorrent protocol itself is out of scope. Hosting drives an engine
//! through [`TorrentEngine`]: start a transfer into a directory, wait for its
//! metadata, stop it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TorrentError;
use crate::magnet::InfoHash;

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    pub path: PathBuf,
    pub length: u64,
}

/// Torrent metadata: its file list and sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentMetadata {
    pub files: Vec<TorrentFile>,
}

impl TorrentMetadata {
    /// Metadata for a torrent holding a single file of `length` bytes.
    pub fn single_file(name: impl Into<PathBuf>, length: u64) -> Self {
        Self {
            files: vec![TorrentFile {
                path: name.into(),
                length,
            }],
        }
    }

    /// Total size of the torrent's content in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }
}

/// A BitTorrent engine.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Start downloading and seeding `magnet` into `directory`.
    ///
    /// Existing data in `directory` from a previous run is reused.
    async fn add(
        &self,
        magnet: &str,
        info_hash: &InfoHash,
        directory: &Path,
    ) -> Result<(), TorrentError>;

    /// Wait until the torrent's metadata is available.
    async fn wait_for_metadata(&self, info_hash: &InfoHash)
        -> Result<TorrentMetadata, TorrentError>;

    /// Stop the transfer. Files on disk are left alone.
    async fn remove(&self, info_hash: &InfoHash) -> Result<(), TorrentError>;
}

/// An in-memory engine for testing.
///
/// Records every action, serves metadata registered with
/// [`MemoryEngine::set_metadata`], and creates the target directory on add.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::RwLock;

    /// An action taken against the engine.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum EngineAction {
        Added {
            info_hash: InfoHash,
            directory: PathBuf,
        },
        Removed(InfoHash),
    }

    /// In-memory torrent engine.
    #[derive(Default)]
    pub struct MemoryEngine {
        metadata: RwLock<HashMap<InfoHash, TorrentMetadata>>,
        active: RwLock<HashMap<InfoHash, PathBuf>>,
        actions: RwLock<Vec<EngineAction>>,
    }

    impl MemoryEngine {
        /// Create an engine with no metadata.
        pub fn new() -> Self {
            Self::default()
        }

        /// Make metadata available for a torrent, now or later.
        pub async fn set_metadata(&self, info_hash: InfoHash, metadata: TorrentMetadata) {
            self.metadata.write().await.insert(info_hash, metadata);
        }

        /// All actions so far, in order.
        pub async fn actions(&self) -> Vec<EngineAction> {
            self.actions.read().await.clone()
        }

        /// Forget recorded actions.
        pub async fn clear_actions(&self) {
            self.actions.write().await.clear();
        }

        /// Whether a torrent is currently added.
        pub async fn is_active(&self, info_hash: &InfoHash) -> bool {
            self.active.read().await.contains_key(info_hash)
        }
    }

    #[async_trait]
    impl TorrentEngine for MemoryEngine {
        async fn add(
            &self,
            _magnet: &str,
            info_hash: &InfoHash,
            directory: &Path,
        ) -> Result<(), TorrentError> {
            tokio::fs::create_dir_all(directory)
                .await
                .map_err(|e| TorrentError::Engine(e.to_string()))?;
            self.active
                .write()
                .await
                .insert(info_hash.clone(), directory.to_path_buf());
            self.actions.write().await.push(EngineAction::Added {
                info_hash: info_hash.clone(),
                directory: directory.to_path_buf(),
            });
            Ok(())
        }

        async fn wait_for_metadata(
            &self,
            info_hash: &InfoHash,
        ) -> Result<TorrentMetadata, TorrentError> {
            loop {
                if !self.active.read().await.contains_key(info_hash) {
                    return Err(TorrentError::NotFound(info_hash.to_string()));
                }
                if let Some(metadata) = self.metadata.read().await.get(info_hash) {
                    return Ok(metadata.clone());
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        async fn remove(&self, info_hash: &InfoHash) -> Result<(), TorrentError> {
            self.active.write().await.remove(info_hash);
            self.actions
                .write()
                .await
                .push(EngineAction::Removed(info_hash.clone()));
            Ok(())
        }
    }
}
