//! # Coinkit Core
//!
//! Pure primitives for talking to the coinkit ledger: Ed25519 identities,
//! canonical messages, and the signed envelope that carries them.
//!
//! This crate contains no I/O, no networking. It is pure computation over
//! byte buffers and JSON values.
//!
//! ## Key Types
//!
//! - [`KeyPair`] - An immutable Ed25519 key pair
//! - [`PublicKey`] - A public key with its checksummed 70-char text form
//! - [`Message`] - A type tag plus a JSON payload
//! - [`SignedMessage`] - A message with a detached signature, and its wire form
//! - [`SignedOperation`] - A signed ledger operation record
//!
//! ## Canonicalization
//!
//! Messages are signed over canonical JSON. See the [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod message;
pub mod operation;

pub use canonical::canonical_json;
pub use crypto::{sha512_256, verify, KeyPair, PublicKey, PUBLIC_KEY_TEXT_LEN};
pub use envelope::{SignedMessage, ENVELOPE_VERSION};
pub use error::{KeyError, ProtocolError};
pub use message::{tags, Message};
pub use operation::SignedOperation;
