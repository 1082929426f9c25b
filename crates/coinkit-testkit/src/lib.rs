//! # Coinkit Testkit
//!
//! Testing utilities for coinkit.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: fixed keys, signatures and wire bytes that every
//!   implementation of the protocol must reproduce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: an in-memory ledger, torrent engine and hosting directory
//!   wired together
//!
//! ## Golden Vectors
//!
//! ```rust
//! use coinkit_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, actual) in verify_all_vectors() {
//!     assert!(ok, "{name}: {actual}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use coinkit_core::SignedMessage;
//! use coinkit_testkit::generators::EnvelopeParams;
//!
//! proptest! {
//!     #[test]
//!     fn envelope_round_trip(params: EnvelopeParams) {
//!         let signed = SignedMessage::from_signing(params.message.clone(), &params.key_pair);
//!         let parsed = SignedMessage::from_serialized(&signed.serialize()).unwrap();
//!         prop_assert_eq!(parsed.message(), &params.message);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{fast_client_config, info_hash, magnet_for, HostingFixture};
pub use generators::{corrupt_char, EnvelopeParams};
pub use vectors::{
    envelope_vectors, phrase_vectors, signature_vectors, verify_all_vectors, EnvelopeVector,
    PhraseVector, SignatureVector,
};
