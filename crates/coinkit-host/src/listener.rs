//! Desired-state listener.
//!
//! Polls the ledger for the buckets assigned to one provider and delivers
//! each full snapshot to a single consumer over a channel. Diffing is left
//! to the consumer.

use std::sync::Arc;
use std::time::Duration;

use coinkit_chain::{Bucket, BucketQuery, ChainClient, ClientError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A snapshot of every bucket assigned to a provider.
pub type Snapshot = Vec<Bucket>;

/// Periodic poller for a provider's bucket assignment.
#[derive(Clone)]
pub struct ProviderListener {
    client: Arc<ChainClient>,
    interval: Duration,
}

impl ProviderListener {
    pub fn new(client: Arc<ChainClient>, interval: Duration) -> Self {
        Self { client, interval }
    }

    /// Fetch the current assignment once.
    pub async fn poll(&self, provider_id: u64) -> Result<Snapshot, ClientError> {
        self.client
            .get_buckets(&BucketQuery::by_provider(provider_id))
            .await
    }

    /// Poll until cancelled or until the receiver is dropped.
    ///
    /// A failed poll is logged and retried on the next tick.
    pub async fn listen(
        &self,
        provider_id: u64,
        sink: mpsc::Sender<Snapshot>,
        cancel: CancellationToken,
    ) {
        debug!(provider_id, "listening for bucket assignments");
        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => return,
                polled = self.poll(provider_id) => polled,
            };

            match polled {
                Ok(buckets) => {
                    debug!(provider_id, count = buckets.len(), "received buckets");
                    let delivered = tokio::select! {
                        _ = cancel.cancelled() => return,
                        delivered = sink.send(buckets) => delivered,
                    };
                    if delivered.is_err() {
                        debug!(provider_id, "snapshot receiver dropped");
                        return;
                    }
                }
                Err(ClientError::Cancelled) => return,
                Err(e) => warn!(provider_id, error = %e, "failed to fetch buckets"),
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Start listening on a background task.
    pub fn spawn(
        &self,
        provider_id: u64,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<Snapshot>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(1);
        let listener = self.clone();
        let handle = tokio::spawn(async move { listener.listen(provider_id, tx, cancel).await });
        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinkit_chain::{ClientConfig, MemoryLedger};
    use coinkit_core::KeyPair;

    fn bucket(name: &str) -> Bucket {
        Bucket {
            name: name.into(),
            owner: "0xowner".into(),
            size: 1,
            magnet: String::new(),
            providers: Vec::new(),
        }
    }

    async fn setup() -> (Arc<MemoryLedger>, ProviderListener, u64) {
        let ledger = Arc::new(MemoryLedger::new());
        let id = ledger.insert_provider("0xowner", 10).await;
        ledger.insert_bucket(bucket("one")).await;
        ledger.insert_allocation("one", id).await;

        let config = ClientConfig::default().with_retries(1, Duration::from_millis(1));
        let client = ChainClient::with_transport(
            config,
            Some(KeyPair::from_secret_phrase("listener")),
            ledger.clone(),
        )
        .unwrap();
        let listener = ProviderListener::new(Arc::new(client), Duration::from_millis(5));
        (ledger, listener, id)
    }

    #[tokio::test]
    async fn test_delivers_full_snapshots() {
        let (ledger, listener, id) = setup().await;
        let cancel = CancellationToken::new();
        let (mut rx, handle) = listener.spawn(id, cancel.clone());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.len(), 1);

        ledger.insert_bucket(bucket("two")).await;
        ledger.insert_allocation("two", id).await;
        loop {
            let snapshot = rx.recv().await.unwrap();
            if snapshot.len() == 2 {
                break;
            }
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_survives_failed_polls() {
        let (ledger, listener, id) = setup().await;
        ledger.fail_next(3).await;
        let cancel = CancellationToken::new();
        let (mut rx, handle) = listener.spawn(id, cancel.clone());

        assert_eq!(rx.recv().await.unwrap().len(), 1);
        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_stops_when_receiver_dropped() {
        let (_ledger, listener, id) = setup().await;
        let (rx, handle) = listener.spawn(id, CancellationToken::new());
        drop(rx);
        handle.await.unwrap();
    }
}
