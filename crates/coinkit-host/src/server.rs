//! The hosting server that storage providers run.
//!
//! Resolves which provider it hosts for, then feeds the listener's
//! snapshots through the reconciler until cancelled.

use std::sync::Arc;

use coinkit_chain::{ChainClient, ProviderQuery};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{HostingConfig, ProviderIdentity};
use crate::error::{ConfigError, HostError, Result};
use crate::listener::ProviderListener;
use crate::reconcile::Reconciler;
use crate::torrent::TorrentEngine;

/// Hosts the buckets assigned to one provider.
pub struct HostingServer {
    config: HostingConfig,
    client: Arc<ChainClient>,
    provider_id: Option<u64>,
    reconciler: Reconciler,
}

impl HostingServer {
    /// Validate the configuration and build a server that talks HTTP.
    ///
    /// When the configuration names a key pair, the client signs with it.
    pub fn new(config: HostingConfig, engine: Arc<dyn TorrentEngine>) -> Result<Self> {
        config.validate()?;
        let key_pair = match config.identity()? {
            ProviderIdentity::Owner(key_pair) => Some(key_pair),
            ProviderIdentity::Id(_) => None,
        };
        let client = ChainClient::new(config.chain.clone(), key_pair)?;
        Self::with_client(config, Arc::new(client), engine)
    }

    /// Build a server around an existing client.
    ///
    /// When the configuration has no provider id, the client's key is taken
    /// as the provider owner.
    pub fn with_client(
        config: HostingConfig,
        client: Arc<ChainClient>,
        engine: Arc<dyn TorrentEngine>,
    ) -> Result<Self> {
        config.validate()?;
        debug!(directory = %config.directory.display(), "hosting files");
        let reconciler = Reconciler::new(engine, config.directory.clone())
            .with_metadata_timeout(config.metadata_timeout());
        Ok(Self {
            provider_id: config.id,
            config,
            client,
            reconciler,
        })
    }

    pub fn client(&self) -> &Arc<ChainClient> {
        &self.client
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// The provider id, once known.
    pub fn provider_id(&self) -> Option<u64> {
        self.provider_id
    }

    /// Resolve the provider id, creating a provider if the owner has none.
    pub async fn acquire_provider_id(&mut self) -> Result<u64> {
        if let Some(id) = self.provider_id {
            return Ok(id);
        }

        let owner = self.client.public_key().encode();
        let providers = self
            .client
            .get_providers(&ProviderQuery::by_owner(owner.clone()))
            .await?;

        let id = match providers.as_slice() {
            [] => {
                let provider = self.client.create_provider(self.config.capacity).await?;
                info!(id = provider.id, "created a new provider");
                provider.id
            }
            [provider] => {
                if provider.capacity < self.config.capacity {
                    return Err(ConfigError::InsufficientCapacity {
                        on_chain: provider.capacity,
                        configured: self.config.capacity,
                    }
                    .into());
                }
                info!(id = provider.id, "found provider");
                provider.id
            }
            many => {
                return Err(ConfigError::MultipleProviders {
                    owner,
                    count: many.len(),
                }
                .into())
            }
        };

        self.provider_id = Some(id);
        Ok(id)
    }

    /// Host until `cancel` fires.
    ///
    /// Fails only if the provider id cannot be resolved; errors after that
    /// are logged and hosting continues. Cancellation is honored between
    /// passes: a pass in flight runs to completion, so every torrent it
    /// started is committed. Set a metadata timeout to bound that wait.
    pub async fn serve(&mut self, cancel: CancellationToken) -> Result<()> {
        let id = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            id = self.acquire_provider_id() => id?,
        };

        let listener = ProviderListener::new(self.client.clone(), self.config.listen_interval());
        let (mut snapshots, handle) = listener.spawn(id, cancel.child_token());
        info!(provider_id = id, "hosting");

        loop {
            let buckets = tokio::select! {
                _ = cancel.cancelled() => break,
                next = snapshots.recv() => match next {
                    Some(buckets) => buckets,
                    None => break,
                },
            };
            let report = self.reconciler.reconcile(buckets).await;
            debug!(warnings = report.warnings(), "pass complete");
        }

        drop(snapshots);
        if let Err(e) = handle.await {
            warn!(error = %e, "listener task failed");
        }
        info!(provider_id = id, "stopped hosting");
        Ok(())
    }
}

impl std::fmt::Debug for HostingServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostingServer")
            .field("directory", &self.config.directory)
            .field("provider_id", &self.provider_id)
            .finish()
    }
}
