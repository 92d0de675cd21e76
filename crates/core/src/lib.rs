//! Core protocol primitives for quorumchain.
//!
//! This crate provides the fundamental types used throughout the validator
//! network:
//! - Cryptographic primitives (Blake3 hashing, Ed25519 signing)
//! - Key stores (directory-backed and in-memory)
//! - Blocks and the fixed payload hashing contract
//! - Wire messages exchanged between validators

pub mod block;
pub mod crypto;
pub mod hash;
pub mod keystore;
pub mod message;

// Re-export commonly used types at the crate root
pub use block::{Block, GENESIS_ID};
pub use crypto::{CryptoError, Keypair, PublicKey, Signature};
pub use hash::{hash, hash_file, Hash};
pub use keystore::{DirKeyStore, KeyStore, KeyStoreError, MemoryKeyStore};
pub use message::{Message, MessageKind};
