//! The ledger RPC client.
//!
//! [`ChainClient`] signs every request with one fixed key pair, posts it to a
//! randomly chosen endpoint, and retries transport failures. Operations are
//! submitted with read-after-write consistency: [`ChainClient::send_operation`]
//! only returns once the submitter's account reports the new sequence number.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use coinkit_core::{tags, KeyPair, Message, PublicKey, SignedMessage, SignedOperation};
use rand::Rng;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::model::{Account, Bucket, BucketQuery, DataPayload, Operation, Provider, ProviderQuery};
use crate::transport::{HttpTransport, Transport};

/// Path under each endpoint that accepts envelopes.
pub const MESSAGES_PATH: &str = "messages";

/// A client for the ledger servers.
///
/// A client uses one key pair for its whole lifetime. Clients are cheap, so
/// to act as a different identity, create another one.
pub struct ChainClient {
    key_pair: KeyPair,
    /// Message URLs, one per configured endpoint.
    endpoints: Vec<Url>,
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    cancel: CancellationToken,
    /// Held from the account read until the submitted sequence is observed.
    submission: Mutex<()>,
}

impl ChainClient {
    /// Create a client that talks HTTP. A random key pair is used if none
    /// is given.
    pub fn new(config: ClientConfig, key_pair: Option<KeyPair>) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Self::with_transport(config, key_pair, Arc::new(transport))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(
        config: ClientConfig,
        key_pair: Option<KeyPair>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(ClientError::NoEndpoints);
        }
        let endpoints = config
            .endpoints
            .iter()
            .map(|e| message_url(e))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            key_pair: key_pair.unwrap_or_else(KeyPair::from_random),
            endpoints,
            transport,
            config,
            cancel: CancellationToken::new(),
            submission: Mutex::new(()),
        })
    }

    /// Abort in-flight and future calls when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ────────────────────────────────────────────────────────────────────────
    // Messages
    // ────────────────────────────────────────────────────────────────────────

    /// Sign and send a message, returning the ledger's reply.
    ///
    /// `Ok(None)` is an empty keepalive response. An Error reply becomes
    /// [`ClientError::Chain`].
    pub async fn send_message(&self, message: Message) -> Result<Option<Message>> {
        let signed = SignedMessage::from_signing(message, &self.key_pair);
        let body = format!("{}\n", signed.serialize());
        tracing::debug!(kind = signed.message().kind(), "sending message");

        let text = self.post_with_retry(body).await?;
        let text = text.strip_suffix('\n').unwrap_or(&text);
        if text.is_empty() {
            return Ok(None);
        }

        let response = SignedMessage::from_serialized(text)?.into_message();
        if let Some(error) = response.error_text() {
            tracing::debug!(error, "ledger rejected message");
            return Err(ClientError::Chain(error.to_string()));
        }
        Ok(Some(response))
    }

    /// Send a Query message and return the Data reply.
    pub async fn query(&self, params: Value) -> Result<Message> {
        let message = Message::from_value(tags::QUERY, params)?;
        match self.send_message(message).await? {
            None => Err(ClientError::EmptyResponse),
            Some(data) if data.kind() == tags::DATA => Ok(data),
            Some(other) => Err(ClientError::UnexpectedMessage(other.kind().to_string())),
        }
    }

    async fn query_data(&self, params: Value) -> Result<DataPayload> {
        let data = self.query(params).await?;
        serde_json::from_value(Value::Object(data.into_payload()))
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn post_with_retry(&self, body: String) -> Result<String> {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let url = self.pick_endpoint();
            match self.cancellable(self.transport.post(url, body.clone())).await? {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(%url, attempt, error = %e, "connection error");
                    last_error = e.0;
                }
            }
            if attempt < attempts {
                self.sleep(self.config.retry_wait()).await?;
            }
        }

        Err(ClientError::Transport {
            attempts,
            message: last_error,
        })
    }

    fn pick_endpoint(&self) -> &Url {
        let index = rand::thread_rng().gen_range(0..self.endpoints.len());
        &self.endpoints[index]
    }

    // ────────────────────────────────────────────────────────────────────────
    // Operations
    // ────────────────────────────────────────────────────────────────────────

    /// Submit an operation and wait until the ledger has applied it.
    ///
    /// Returns the sequence number the operation was submitted with. Without
    /// a consistency timeout this waits for as long as the ledger takes,
    /// which is forever if it never applies the operation.
    pub async fn send_operation(&self, operation: &Operation) -> Result<u32> {
        self.submit_operation(operation.kind(), operation.fields())
            .await
    }

    /// Submit an operation given as a type tag and raw fields.
    ///
    /// `fee`, `sequence` and `signer` are filled in.
    pub async fn submit_operation(&self, kind: &str, fields: Map<String, Value>) -> Result<u32> {
        let _guard = self.cancellable(self.submission.lock()).await?;

        let owner = self.public_key().encode();
        let account = self
            .get_account(&owner)
            .await?
            .ok_or_else(|| ClientError::MissingAccount(owner.clone()))?;
        let sequence = account.sequence + 1;

        let signed = SignedOperation::sign(kind, fields, 0, sequence, &self.key_pair);
        if let Some(reply) = self
            .send_message(SignedOperation::into_message(vec![signed]))
            .await?
        {
            tracing::debug!(kind = reply.kind(), "ignoring reply to operation");
        }

        self.wait_for_sequence(&owner, sequence).await?;
        tracing::debug!(kind, sequence, "operation accepted");
        Ok(sequence)
    }

    async fn wait_for_sequence(&self, owner: &str, sequence: u32) -> Result<()> {
        let started = Instant::now();
        loop {
            if let Some(account) = self.get_account(owner).await? {
                if account.sequence == sequence {
                    return Ok(());
                }
                if account.sequence > sequence {
                    tracing::warn!(
                        expected = sequence,
                        observed = account.sequence,
                        "account moved past the submitted sequence"
                    );
                    return Ok(());
                }
            }

            if let Some(limit) = self.config.consistency_timeout() {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(ClientError::ConsistencyTimeout { sequence, waited });
                }
            }
            self.sleep(self.config.poll_interval()).await?;
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Accounts and providers
    // ────────────────────────────────────────────────────────────────────────

    /// Fetch an account, or `None` if it does not exist.
    pub async fn get_account(&self, owner: &str) -> Result<Option<Account>> {
        let data = self.query_data(json!({ "account": owner })).await?;
        Ok(data
            .accounts
            .and_then(|mut accounts| accounts.remove(owner))
            .flatten())
    }

    /// Fetch providers matching a query, in no particular order.
    pub async fn get_providers(&self, query: &ProviderQuery) -> Result<Vec<Provider>> {
        let data = self.query_data(json!({ "providers": query })).await?;
        Ok(data.providers.unwrap_or_default())
    }

    /// Fetch a provider by id.
    pub async fn get_provider(&self, id: u64) -> Result<Option<Provider>> {
        let providers = self.get_providers(&ProviderQuery::by_id(id)).await?;
        Ok(providers.into_iter().next())
    }

    /// Poll until the provider exists.
    pub async fn wait_for_provider(&self, id: u64) -> Result<Provider> {
        tracing::debug!(id, "waiting for provider to be created");
        loop {
            if let Some(provider) = self.get_provider(id).await? {
                return Ok(provider);
            }
            self.sleep(self.config.poll_interval()).await?;
        }
    }

    /// Create a provider owned by this client's key and return it.
    pub async fn create_provider(&self, capacity: u32) -> Result<Provider> {
        let owned = ProviderQuery::by_owner(self.public_key().encode());
        let before = self.get_providers(&owned).await?;
        tracing::debug!(existing = before.len(), "creating provider");

        self.send_operation(&Operation::CreateProvider { capacity })
            .await?;

        let after = self.get_providers(&owned).await?;
        after
            .into_iter()
            .find(|p| !before.iter().any(|b| b.id == p.id))
            .ok_or(ClientError::NotCreated("provider"))
    }

    // ────────────────────────────────────────────────────────────────────────
    // Buckets
    // ────────────────────────────────────────────────────────────────────────

    /// Fetch buckets matching a query, in no particular order.
    pub async fn get_buckets(&self, query: &BucketQuery) -> Result<Vec<Bucket>> {
        let data = self.query_data(json!({ "buckets": query })).await?;
        Ok(data.buckets.unwrap_or_default())
    }

    /// Fetch a bucket by name.
    pub async fn get_bucket(&self, name: &str) -> Result<Option<Bucket>> {
        let buckets = self.get_buckets(&BucketQuery::by_name(name)).await?;
        Ok(buckets.into_iter().next())
    }

    /// Create a bucket owned by this client's key and return it.
    pub async fn create_bucket(&self, name: &str, size: u32) -> Result<Bucket> {
        self.send_operation(&Operation::CreateBucket {
            name: name.to_string(),
            size,
        })
        .await?;
        self.get_bucket(name)
            .await?
            .ok_or(ClientError::NotCreated("bucket"))
    }

    /// Point a bucket at new content and return the updated bucket.
    pub async fn update_bucket(&self, name: &str, magnet: &str) -> Result<Option<Bucket>> {
        self.send_operation(&Operation::UpdateBucket {
            name: name.to_string(),
            magnet: magnet.to_string(),
        })
        .await?;
        self.get_bucket(name).await
    }

    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.send_operation(&Operation::DeleteBucket {
            name: name.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Assign a bucket to a provider.
    pub async fn allocate(&self, bucket_name: &str, provider_id: u64) -> Result<()> {
        self.send_operation(&Operation::Allocate {
            bucket_name: bucket_name.to_string(),
            provider_id,
        })
        .await?;
        Ok(())
    }

    /// Remove a bucket from a provider.
    pub async fn deallocate(&self, bucket_name: &str, provider_id: u64) -> Result<()> {
        self.send_operation(&Operation::Deallocate {
            bucket_name: bucket_name.to_string(),
            provider_id,
        })
        .await?;
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Cancellation
    // ────────────────────────────────────────────────────────────────────────

    async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
            output = future => Ok(output),
        }
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        self.cancellable(tokio::time::sleep(duration)).await
    }
}

/// The message URL under an endpoint base URL.
fn message_url(endpoint: &str) -> Result<Url> {
    let invalid = |reason: String| ClientError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let mut base = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if base.cannot_be_a_base() {
        return Err(invalid("not a base URL".into()));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(MESSAGES_PATH).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::memory::MemoryLedger;
    use async_trait::async_trait;
    use coinkit_core::ProtocolError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> ClientConfig {
        ClientConfig::default()
            .with_endpoints(["http://ledger-a.test", "http://ledger-b.test/api"])
            .with_retries(3, Duration::from_millis(1))
            .with_poll_interval(Duration::from_millis(1))
    }

    async fn funded_client(ledger: &Arc<MemoryLedger>, phrase: &str) -> ChainClient {
        let kp = KeyPair::from_secret_phrase(phrase);
        ledger.create_account(&kp.public_key().encode(), 100).await;
        ChainClient::with_transport(fast_config(), Some(kp), ledger.clone()).unwrap()
    }

    #[test]
    fn test_message_url() {
        assert_eq!(
            message_url("http://localhost:8000").unwrap().as_str(),
            "http://localhost:8000/messages"
        );
        assert_eq!(
            message_url("http://host/api").unwrap().as_str(),
            "http://host/api/messages"
        );
        assert!(matches!(
            message_url("not a url"),
            Err(ClientError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_no_endpoints() {
        let config = ClientConfig::default().with_endpoints(Vec::<String>::new());
        let ledger = Arc::new(MemoryLedger::new());
        assert!(matches!(
            ChainClient::with_transport(config, None, ledger),
            Err(ClientError::NoEndpoints)
        ));
    }

    #[tokio::test]
    async fn test_get_account() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;
        let owner = client.public_key().encode();

        let account = client.get_account(&owner).await.unwrap().unwrap();
        assert_eq!(account.sequence, 0);
        assert_eq!(account.balance, 100);

        let other = KeyPair::from_secret_phrase("nobody").public_key().encode();
        assert_eq!(client.get_account(&other).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_requests_go_to_configured_endpoints() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;
        for _ in 0..10 {
            client.get_account("0x").await.unwrap();
        }
        for url in ledger.request_urls().await {
            assert!(
                url == "http://ledger-a.test/messages" || url == "http://ledger-b.test/api/messages",
                "{url}"
            );
        }
    }

    #[tokio::test]
    async fn test_transport_failures_are_retried() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;
        ledger.fail_next(2).await;
        assert!(client.get_account("0x").await.is_ok());
        assert_eq!(ledger.request_count().await, 3);
    }

    #[tokio::test]
    async fn test_transport_failure_after_budget() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;
        ledger.fail_next(3).await;
        let err = client.get_account("0x").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_chain_error_is_verbatim() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;
        let err = client.query(json!({ "nonsense": 1 })).await.unwrap_err();
        assert_eq!(err.to_string(), "unrecognized query");
    }

    #[tokio::test]
    async fn test_send_operation_waits_for_sequence() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_apply_after(5).await;
        let client = funded_client(&ledger, "alice").await;

        let sequence = client
            .send_operation(&Operation::CreateProvider { capacity: 10 })
            .await
            .unwrap();
        assert_eq!(sequence, 1);

        // Once send_operation returns, the effect is observable.
        let owner = client.public_key().encode();
        assert_eq!(client.get_account(&owner).await.unwrap().unwrap().sequence, 1);
        assert_eq!(ledger.providers().await.len(), 1);
    }

    #[tokio::test]
    async fn test_send_operation_without_account() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = ChainClient::with_transport(fast_config(), None, ledger.clone()).unwrap();
        let err = client
            .send_operation(&Operation::CreateProvider { capacity: 10 })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingAccount(_)));
    }

    #[tokio::test]
    async fn test_frozen_ledger_hangs() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_frozen(true).await;
        let client = funded_client(&ledger, "alice").await;

        let pending = client.send_operation(&Operation::CreateProvider { capacity: 10 });
        let outcome = tokio::time::timeout(Duration::from_millis(100), pending).await;
        assert!(outcome.is_err(), "operation returned against a frozen ledger");
    }

    #[tokio::test]
    async fn test_consistency_timeout() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_frozen(true).await;
        let kp = KeyPair::from_secret_phrase("alice");
        ledger.create_account(&kp.public_key().encode(), 0).await;
        let config = fast_config().with_consistency_timeout(Some(Duration::from_millis(20)));
        let client = ChainClient::with_transport(config, Some(kp), ledger.clone()).unwrap();

        let err = client
            .send_operation(&Operation::CreateProvider { capacity: 10 })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::ConsistencyTimeout { sequence: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_wait() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.set_frozen(true).await;
        let token = CancellationToken::new();
        let client = funded_client(&ledger, "alice")
            .await
            .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let err = client
            .send_operation(&Operation::CreateProvider { capacity: 10 })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_submissions_get_distinct_sequences() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;

        let (a, b) = tokio::join!(
            client.create_bucket("one", 1),
            client.create_bucket("two", 1)
        );
        a.unwrap();
        b.unwrap();
        let owner = client.public_key().encode();
        assert_eq!(ledger.account(&owner).await.unwrap().sequence, 2);
    }

    #[tokio::test]
    async fn test_create_provider_discovers_new_id() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;
        let owner = client.public_key().encode();
        let existing = ledger.insert_provider(&owner, 5).await;

        let created = client.create_provider(50).await.unwrap();
        assert_ne!(created.id, existing);
        assert_eq!(created.capacity, 50);
        assert_eq!(created.owner, owner);

        assert_eq!(client.wait_for_provider(created.id).await.unwrap(), created);
        assert_eq!(client.get_provider(999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;
        let provider = client.create_provider(100).await.unwrap();

        let bucket = client.create_bucket("photos", 10).await.unwrap();
        assert_eq!(bucket.magnet, "");

        let magnet = "magnet:?xt=urn:btih:abcdef0123456789";
        let updated = client.update_bucket("photos", magnet).await.unwrap().unwrap();
        assert_eq!(updated.magnet, magnet);

        client.allocate("photos", provider.id).await.unwrap();
        let hosted = client
            .get_buckets(&BucketQuery::by_provider(provider.id))
            .await
            .unwrap();
        assert_eq!(hosted.len(), 1);

        client.deallocate("photos", provider.id).await.unwrap();
        assert!(client
            .get_buckets(&BucketQuery::by_provider(provider.id))
            .await
            .unwrap()
            .is_empty());

        client.delete_bucket("photos").await.unwrap();
        assert_eq!(client.get_bucket("photos").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejected_operation() {
        let ledger = Arc::new(MemoryLedger::new());
        let client = funded_client(&ledger, "alice").await;
        let err = client.delete_bucket("missing").await.unwrap_err();
        assert!(matches!(err, ClientError::Chain(ref text) if text.contains("missing")));
    }

    // ────────────────────────────────────────────────────────────────────────
    // Malformed and unexpected replies
    // ────────────────────────────────────────────────────────────────────────

    /// Answers every request with the same body and counts requests.
    struct FixedReply {
        body: String,
        requests: AtomicUsize,
    }

    impl FixedReply {
        fn new(body: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                body: body.into(),
                requests: AtomicUsize::new(0),
            })
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FixedReply {
        async fn post(
            &self,
            _url: &Url,
            _body: String,
        ) -> std::result::Result<String, TransportError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn client_over(transport: Arc<FixedReply>) -> ChainClient {
        ChainClient::with_transport(fast_config(), None, transport).unwrap()
    }

    fn signed_reply(kind: &str) -> SignedMessage {
        let kp = KeyPair::from_secret_phrase("server");
        let message = Message::from_value(kind, json!({ "accounts": {} })).unwrap();
        SignedMessage::from_signing(message, &kp)
    }

    #[tokio::test]
    async fn test_badly_signed_reply_is_protocol_error_without_retry() {
        let reply = signed_reply(tags::DATA);
        let forged = KeyPair::from_secret_phrase("server").sign("something else");
        let body = format!(
            "e:{}:{}:{}\n",
            reply.signer_text(),
            forged,
            reply.message_text()
        );
        let transport = FixedReply::new(body);
        let client = client_over(transport.clone());

        let err = client.query(json!({ "account": "0x" })).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::SignatureMismatch)
        ));
        assert_eq!(transport.requests(), 1);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_protocol_error_without_retry() {
        let transport = FixedReply::new("e:0xabc:sig\n");
        let client = client_over(transport.clone());

        let err = client
            .send_message(Message::from_value(tags::QUERY, json!({})).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::TooFewSegments(3))
        ));
        assert_eq!(transport.requests(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_is_keepalive() {
        let transport = FixedReply::new("\n");
        let client = client_over(transport.clone());

        let reply = client
            .send_message(Message::from_value(tags::QUERY, json!({})).unwrap())
            .await
            .unwrap();
        assert_eq!(reply, None);

        let err = client.query(json!({ "account": "0x" })).await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyResponse));
        assert_eq!(transport.requests(), 2);
    }

    #[tokio::test]
    async fn test_non_data_reply_to_query_is_unexpected() {
        let mut body = signed_reply(tags::OPERATION).serialize();
        body.push('\n');
        let transport = FixedReply::new(body);
        let client = client_over(transport.clone());

        let err = client.query(json!({ "account": "0x" })).await.unwrap_err();
        assert!(
            matches!(err, ClientError::UnexpectedMessage(ref kind) if kind == tags::OPERATION)
        );
        assert_eq!(transport.requests(), 1);
    }
}
