//! # Coinkit Chain
//!
//! Client for the coinkit ledger.
//!
//! ## Overview
//!
//! The ledger is an external, eventually consistent service reached over
//! HTTP. Every request and response is a signed envelope (see
//! `coinkit_core::SignedMessage`). [`ChainClient`] adds endpoint selection,
//! transport retries, and a consistency wait that turns an eventually
//! applied write into a call that returns once the write is observable.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use coinkit_chain::{ChainClient, ClientConfig};
//! use coinkit_core::KeyPair;
//!
//! async fn example() -> coinkit_chain::Result<()> {
//!     let key_pair = KeyPair::from_secret_phrase("correct horse");
//!     let client = ChainClient::new(ClientConfig::default(), Some(key_pair))?;
//!
//!     let bucket = client.create_bucket("photos", 100).await?;
//!     println!("created {bucket}");
//!     Ok(())
//! }
//! ```
//!
//! ## Testing
//!
//! [`memory::MemoryLedger`] implements [`Transport`] in process, so a client
//! can be exercised without a network.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod transport;

pub use client::{ChainClient, MESSAGES_PATH};
pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use error::{ClientError, Result, TransportError};
pub use memory::MemoryLedger;
pub use model::{Account, Bucket, BucketQuery, DataPayload, Operation, Provider, ProviderQuery};
pub use transport::{HttpTransport, Transport};
