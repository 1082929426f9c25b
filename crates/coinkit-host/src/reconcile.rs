//! Reconciliation of local torrents against the desired bucket set.
//!
//! A pass diffs a snapshot against the committed set: torrents no longer
//! wanted are stopped and their storage deleted, new ones are started and
//! checked against their bucket's declared size. The committed set is only
//! replaced once the whole pass is done.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use coinkit_chain::Bucket;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::TorrentError;
use crate::magnet::InfoHash;
use crate::torrent::{TorrentEngine, TorrentMetadata};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Torrents started and accepted.
    pub added: Vec<InfoHash>,
    /// Torrents stopped because their bucket left the snapshot.
    pub removed: Vec<InfoHash>,
    /// Torrents stopped because they exceed their bucket's declared size.
    pub rejected: Vec<InfoHash>,
    /// Buckets skipped because their magnet URI is unusable.
    pub skipped: Vec<String>,
    /// Torrents that could not be started; retried on the next pass.
    pub failed: Vec<InfoHash>,
    /// Removals whose cleanup did not fully succeed.
    pub cleanup_failures: usize,
}

impl ReconciliationReport {
    /// Whether the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.rejected.is_empty()
            && self.failed.is_empty()
    }

    /// Number of warnings logged during the pass.
    pub fn warnings(&self) -> usize {
        self.skipped.len() + self.failed.len() + self.cleanup_failures
    }
}

enum Removal {
    Done,
    CleanupFailed,
    Refused,
}

enum Addition {
    Accepted,
    Rejected(Removal),
    Failed(TorrentError),
}

/// Drives a torrent engine toward the desired bucket set.
///
/// Passes take `&mut self`, so two passes can never overlap.
pub struct Reconciler {
    engine: Arc<dyn TorrentEngine>,
    directory: PathBuf,
    metadata_timeout: Option<Duration>,
    /// Maps info-hash to the bucket last applied for it.
    committed: HashMap<InfoHash, Bucket>,
}

impl Reconciler {
    /// Create a reconciler hosting files under `directory`.
    pub fn new(engine: Arc<dyn TorrentEngine>, directory: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            directory: directory.into(),
            metadata_timeout: None,
            committed: HashMap::new(),
        }
    }

    /// Treat a torrent whose metadata takes longer than `timeout` as failed.
    pub fn with_metadata_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The committed set.
    pub fn committed(&self) -> &HashMap<InfoHash, Bucket> {
        &self.committed
    }

    /// Storage directory for one torrent.
    pub fn subdirectory(&self, info_hash: &InfoHash) -> PathBuf {
        self.directory.join(info_hash.as_str())
    }

    /// Run one pass against a snapshot.
    pub async fn reconcile(&mut self, buckets: Vec<Bucket>) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        let mut desired = HashMap::new();
        for bucket in buckets {
            match InfoHash::from_magnet(&bucket.magnet) {
                Ok(info_hash) => {
                    desired.insert(info_hash, bucket);
                }
                Err(e) => {
                    warn!(bucket = %bucket.name, error = %e, "skipping bucket");
                    report.skipped.push(bucket.name);
                }
            }
        }

        let removals: Vec<InfoHash> = self
            .committed
            .keys()
            .filter(|h| !desired.contains_key(*h))
            .cloned()
            .collect();
        for info_hash in removals {
            match self.remove(&info_hash).await {
                Removal::Done => report.removed.push(info_hash),
                Removal::CleanupFailed => {
                    report.cleanup_failures += 1;
                    report.removed.push(info_hash);
                }
                Removal::Refused => report.cleanup_failures += 1,
            }
        }

        let additions: Vec<(&InfoHash, &Bucket)> = desired
            .iter()
            .filter(|(h, _)| !self.committed.contains_key(*h))
            .collect();
        let outcomes = join_all(additions.iter().map(|(h, b)| self.add(h, b))).await;

        let mut retry = Vec::new();
        for ((info_hash, _), outcome) in additions.into_iter().zip(outcomes) {
            match outcome {
                Addition::Accepted => report.added.push(info_hash.clone()),
                Addition::Rejected(removal) => {
                    if !matches!(removal, Removal::Done) {
                        report.cleanup_failures += 1;
                    }
                    report.rejected.push(info_hash.clone());
                }
                Addition::Failed(e) => {
                    warn!(%info_hash, error = %e, "failed to add torrent");
                    report.failed.push(info_hash.clone());
                    retry.push(info_hash.clone());
                }
            }
        }
        for info_hash in retry {
            desired.remove(&info_hash);
        }

        self.committed = desired;
        if !report.is_noop() {
            info!(
                added = report.added.len(),
                removed = report.removed.len(),
                rejected = report.rejected.len(),
                failed = report.failed.len(),
                "reconciled"
            );
        }
        report
    }

    /// Start one torrent and enforce its bucket's declared size.
    async fn add(&self, info_hash: &InfoHash, bucket: &Bucket) -> Addition {
        info!(%info_hash, bucket = %bucket.name, "adding");
        let directory = self.subdirectory(info_hash);
        if let Err(e) = self.engine.add(&bucket.magnet, info_hash, &directory).await {
            return Addition::Failed(e);
        }

        let metadata = match self.metadata(info_hash).await {
            Ok(metadata) => metadata,
            Err(e) => {
                if let Err(stop) = self.engine.remove(info_hash).await {
                    debug!(%info_hash, error = %stop, "could not stop torrent");
                }
                return Addition::Failed(e);
            }
        };

        let torrent_bytes = metadata.total_bytes();
        let bucket_bytes = bucket.size_bytes();
        if torrent_bytes > bucket_bytes {
            warn!(
                %info_hash,
                bucket = %bucket.name,
                torrent_bytes,
                bucket_bytes,
                "torrent is larger than its bucket"
            );
            return Addition::Rejected(self.remove(info_hash).await);
        }
        Addition::Accepted
    }

    async fn metadata(&self, info_hash: &InfoHash) -> Result<TorrentMetadata, TorrentError> {
        let wait = self.engine.wait_for_metadata(info_hash);
        match self.metadata_timeout {
            None => wait.await,
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                TorrentError::MetadataTimeout {
                    info_hash: info_hash.to_string(),
                    waited: limit,
                }
            })?,
        }
    }

    /// Stop a torrent and delete its storage, best effort.
    async fn remove(&self, info_hash: &InfoHash) -> Removal {
        if info_hash.is_suspiciously_short() {
            warn!(%info_hash, "info hash suspiciously short, not removing");
            return Removal::Refused;
        }
        info!(%info_hash, "removing");

        let mut clean = true;
        if let Err(e) = self.engine.remove(info_hash).await {
            warn!(%info_hash, error = %e, "could not stop torrent");
            clean = false;
        }
        match tokio::fs::remove_dir_all(self.subdirectory(info_hash)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(%info_hash, error = %e, "could not delete torrent directory");
                clean = false;
            }
        }

        if clean {
            Removal::Done
        } else {
            Removal::CleanupFailed
        }
    }
}
