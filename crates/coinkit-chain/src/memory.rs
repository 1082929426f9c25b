//! An in-memory ledger for testing.
//!
//! [`MemoryLedger`] implements [`Transport`] by answering envelopes itself
//! instead of forwarding them over the network. It checks envelope and
//! operation signatures and enforces sequence numbers. Accepted operations
//! are applied only after a configurable number of later requests, which
//! models the eventual consistency of the real ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use coinkit_core::{tags, KeyPair, Message, SignedMessage, SignedOperation};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::TransportError;
use crate::model::{Account, Bucket, BucketQuery, DataPayload, Operation, Provider, ProviderQuery};
use crate::transport::Transport;

/// Requests that pass before an accepted operation is applied, by default.
pub const DEFAULT_APPLY_AFTER: u32 = 2;

#[derive(Debug, Clone)]
struct Pending {
    countdown: u32,
    signer: String,
    sequence: u32,
    operation: Operation,
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    providers: Vec<Provider>,
    buckets: Vec<Bucket>,
    next_provider_id: u64,
    pending: Vec<Pending>,
    apply_after: u32,
    frozen: bool,
    failures_remaining: u32,
    requests: u64,
    urls: Vec<String>,
}

/// An in-memory ledger.
pub struct MemoryLedger {
    key_pair: KeyPair,
    state: Mutex<LedgerState>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::from_secret_phrase("memory ledger"),
            state: Mutex::new(LedgerState {
                next_provider_id: 1,
                apply_after: DEFAULT_APPLY_AFTER,
                ..LedgerState::default()
            }),
        }
    }

    /// Apply accepted operations after `requests` further requests.
    /// Zero applies them on acceptance.
    pub async fn set_apply_after(&self, requests: u32) {
        self.state.lock().await.apply_after = requests;
    }

    /// Stop (or resume) applying accepted operations.
    pub async fn set_frozen(&self, frozen: bool) {
        self.state.lock().await.frozen = frozen;
    }

    /// Fail the next `count` requests at the transport level.
    pub async fn fail_next(&self, count: u32) {
        self.state.lock().await.failures_remaining = count;
    }

    /// Create or replace an account.
    pub async fn create_account(&self, owner: &str, balance: u64) {
        self.state.lock().await.accounts.insert(
            owner.to_string(),
            Account {
                owner: owner.to_string(),
                sequence: 0,
                balance,
            },
        );
    }

    /// Register a provider directly, returning its id.
    pub async fn insert_provider(&self, owner: &str, capacity: u32) -> u64 {
        let mut state = self.state.lock().await;
        state.add_provider(owner, capacity)
    }

    /// Create a bucket directly.
    pub async fn insert_bucket(&self, bucket: Bucket) {
        let mut state = self.state.lock().await;
        state.buckets.retain(|b| b.name != bucket.name);
        state.buckets.push(bucket);
    }

    /// Allocate a bucket to a provider directly.
    pub async fn insert_allocation(&self, bucket_name: &str, provider_id: u64) {
        let mut state = self.state.lock().await;
        state.allocate(bucket_name, provider_id);
    }

    /// Remove a bucket directly.
    pub async fn remove_bucket(&self, name: &str) {
        self.state.lock().await.buckets.retain(|b| b.name != name);
    }

    pub async fn account(&self, owner: &str) -> Option<Account> {
        self.state.lock().await.accounts.get(owner).cloned()
    }

    pub async fn buckets(&self) -> Vec<Bucket> {
        self.state.lock().await.buckets.clone()
    }

    pub async fn providers(&self) -> Vec<Provider> {
        self.state.lock().await.providers.clone()
    }

    /// Total requests received, including failed ones.
    pub async fn request_count(&self) -> u64 {
        self.state.lock().await.requests
    }

    /// URLs requests were posted to, in order.
    pub async fn request_urls(&self) -> Vec<String> {
        self.state.lock().await.urls.clone()
    }

    fn respond(&self, message: Message) -> String {
        let mut text = SignedMessage::from_signing(message, &self.key_pair).serialize();
        text.push('\n');
        text
    }

    fn reject(&self, error: impl Into<String>) -> String {
        self.respond(Message::error(error))
    }
}

#[async_trait]
impl Transport for MemoryLedger {
    async fn post(&self, url: &Url, body: String) -> Result<String, TransportError> {
        let mut state = self.state.lock().await;
        state.requests += 1;
        state.urls.push(url.to_string());
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(TransportError::new("connection refused"));
        }
        state.tick();

        let text = body.strip_suffix('\n').unwrap_or(&body);
        let signed = match SignedMessage::from_serialized(text) {
            Ok(signed) => signed,
            Err(e) => return Ok(self.reject(e.to_string())),
        };
        let message = signed.message();

        match message.kind() {
            tags::QUERY => match state.query(message.payload()) {
                Ok(data) => Ok(self.respond(data)),
                Err(e) => Ok(self.reject(e)),
            },
            tags::OPERATION => match state.submit(message.payload()) {
                Ok(()) => Ok(String::new()),
                Err(e) => Ok(self.reject(e)),
            },
            other => Ok(self.reject(format!("unhandled message type: {other}"))),
        }
    }
}

impl LedgerState {
    fn tick(&mut self) {
        if self.frozen {
            return;
        }
        for pending in &mut self.pending {
            pending.countdown = pending.countdown.saturating_sub(1);
        }
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.countdown == 0);
        self.pending = waiting;
        for pending in ready {
            self.apply(pending);
        }
    }

    fn query(&self, payload: &Map<String, Value>) -> Result<Message, String> {
        let mut data = DataPayload::default();
        if let Some(owner) = payload.get("account").and_then(Value::as_str) {
            let mut accounts = HashMap::new();
            accounts.insert(owner.to_string(), self.accounts.get(owner).cloned());
            data.accounts = Some(accounts);
        } else if let Some(query) = payload.get("providers") {
            let query: ProviderQuery =
                serde_json::from_value(query.clone()).map_err(|e| e.to_string())?;
            data.providers = Some(self.find_providers(&query));
        } else if let Some(query) = payload.get("buckets") {
            let query: BucketQuery =
                serde_json::from_value(query.clone()).map_err(|e| e.to_string())?;
            data.buckets = Some(self.find_buckets(&query));
        } else {
            return Err("unrecognized query".into());
        }

        match serde_json::to_value(data) {
            Ok(Value::Object(map)) => Ok(Message::new(tags::DATA, map)),
            Ok(_) => Err("data did not encode as an object".into()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn find_providers(&self, query: &ProviderQuery) -> Vec<Provider> {
        let hosting = query.bucket.as_ref().map(|name| {
            self.buckets
                .iter()
                .find(|b| &b.name == name)
                .map(|b| b.providers.iter().map(|p| p.id).collect::<Vec<_>>())
                .unwrap_or_default()
        });
        let matches = self.providers.iter().filter(|p| {
            query.id.map_or(true, |id| p.id == id)
                && query.owner.as_ref().map_or(true, |o| &p.owner == o)
                && hosting.as_ref().map_or(true, |ids| ids.contains(&p.id))
        });
        matches.take(limit(query.limit)).cloned().collect()
    }

    fn find_buckets(&self, query: &BucketQuery) -> Vec<Bucket> {
        let matches = self.buckets.iter().filter(|b| {
            query.name.as_ref().map_or(true, |n| &b.name == n)
                && query.owner.as_ref().map_or(true, |o| &b.owner == o)
                && query
                    .provider
                    .map_or(true, |id| b.providers.iter().any(|p| p.id == id))
        });
        matches.take(limit(query.limit)).cloned().collect()
    }

    fn submit(&mut self, payload: &Map<String, Value>) -> Result<(), String> {
        let records = payload
            .get("operations")
            .and_then(Value::as_array)
            .ok_or("operation message has no operations")?;

        for record in records {
            let signed = SignedOperation::from_value(record).map_err(|e| e.to_string())?;
            let signer = signed.signer().map_err(|e| e.to_string())?.encode();
            let sequence = signed.sequence().ok_or("operation has no sequence")?;
            let operation =
                Operation::from_parts(signed.kind(), signed.operation()).map_err(|e| e.to_string())?;

            let account = self
                .accounts
                .get(&signer)
                .ok_or_else(|| format!("no account for {signer}"))?;
            let queued = self.pending.iter().filter(|p| p.signer == signer).count() as u32;
            let expected = account.sequence + queued + 1;
            if sequence != expected {
                return Err(format!(
                    "bad sequence {sequence} for {signer}, expected {expected}"
                ));
            }
            self.check(&signer, &operation)?;

            debug!(kind = operation.kind(), sequence, "ledger accepted operation");
            let pending = Pending {
                countdown: self.apply_after,
                signer,
                sequence,
                operation,
            };
            if self.apply_after == 0 && !self.frozen {
                self.apply(pending);
            } else {
                self.pending.push(pending);
            }
        }
        Ok(())
    }

    /// Reject operations that cannot succeed against the current state.
    fn check(&self, signer: &str, operation: &Operation) -> Result<(), String> {
        let bucket = |name: &str| {
            self.buckets
                .iter()
                .find(|b| b.name == name)
                .ok_or_else(|| format!("no bucket named {name}"))
        };
        let own_provider = |id: u64| match self.providers.iter().find(|p| p.id == id) {
            Some(p) if p.owner == signer => Ok(()),
            Some(_) => Err(format!("provider {id} is not owned by the signer")),
            None => Err(format!("no provider with id {id}")),
        };

        match operation {
            Operation::CreateProvider { capacity } if *capacity == 0 => {
                Err("provider capacity must be positive".into())
            }
            Operation::CreateProvider { .. } => Ok(()),
            Operation::CreateBucket { name, .. } => {
                if self.buckets.iter().any(|b| &b.name == name) {
                    Err(format!("bucket {name} already exists"))
                } else {
                    Ok(())
                }
            }
            Operation::UpdateBucket { name, .. } | Operation::DeleteBucket { name } => {
                if bucket(name)?.owner == signer {
                    Ok(())
                } else {
                    Err(format!("bucket {name} is not owned by the signer"))
                }
            }
            Operation::Allocate {
                bucket_name,
                provider_id,
            }
            | Operation::Deallocate {
                bucket_name,
                provider_id,
            } => {
                bucket(bucket_name)?;
                own_provider(*provider_id)
            }
        }
    }

    fn apply(&mut self, pending: Pending) {
        let Pending {
            signer,
            sequence,
            operation,
            ..
        } = pending;
        if let Some(account) = self.accounts.get_mut(&signer) {
            account.sequence = sequence;
        }
        match operation {
            Operation::CreateProvider { capacity } => {
                self.add_provider(&signer, capacity);
            }
            Operation::CreateBucket { name, size } => self.buckets.push(Bucket {
                name,
                owner: signer,
                size,
                magnet: String::new(),
                providers: Vec::new(),
            }),
            Operation::UpdateBucket { name, magnet } => {
                if let Some(b) = self.buckets.iter_mut().find(|b| b.name == name) {
                    b.magnet = magnet;
                }
            }
            Operation::DeleteBucket { name } => self.buckets.retain(|b| b.name != name),
            Operation::Allocate {
                bucket_name,
                provider_id,
            } => self.allocate(&bucket_name, provider_id),
            Operation::Deallocate {
                bucket_name,
                provider_id,
            } => {
                if let Some(b) = self.buckets.iter_mut().find(|b| b.name == bucket_name) {
                    b.providers.retain(|p| p.id != provider_id);
                }
            }
        }
    }

    fn add_provider(&mut self, owner: &str, capacity: u32) -> u64 {
        let id = self.next_provider_id;
        self.next_provider_id += 1;
        self.providers.push(Provider {
            id,
            owner: owner.to_string(),
            capacity,
        });
        id
    }

    fn allocate(&mut self, bucket_name: &str, provider_id: u64) {
        if let Some(b) = self.buckets.iter_mut().find(|b| b.name == bucket_name) {
            if !b.providers.iter().any(|p| p.id == provider_id) {
                b.providers.push(Provider {
                    id: provider_id,
                    owner: String::new(),
                    capacity: 0,
                });
            }
        }
    }
}

/// A query limit of zero or none means unlimited.
fn limit(limit: Option<u32>) -> usize {
    match limit {
        Some(n) if n > 0 => n as usize,
        _ => usize::MAX,
    }
}
