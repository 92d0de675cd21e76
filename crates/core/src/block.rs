//! Blocks and the payload hashing contract.

use crate::crypto::{Keypair, PublicKey, Signature};
use crate::hash::{hash, Hash};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Proposer id carried by the genesis block, backed by a dedicated key.
pub const GENESIS_ID: &str = "Genesis";

/// An immutable, signed ledger record.
///
/// Digest fields are lowercase hex strings; the genesis block uses the
/// sentinel `"0"` for `data_hash` and `previous_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Round number this block was decided in (0 for genesis).
    pub index: u32,
    /// Creation instant in epoch milliseconds. Informational only; ordering
    /// is governed entirely by `index`.
    pub timestamp: i64,
    /// Digest of the external data blob.
    pub data_hash: String,
    /// Digest of the shared reference model, constant for the whole chain.
    pub model_hash: String,
    /// Identity of the proposing validator.
    pub proposer_id: String,
    /// `hash` of the predecessor block.
    pub previous_hash: String,
    /// Digest of this block's payload.
    pub hash: String,
    /// Proposer's signature over the UTF-8 bytes of `hash`.
    pub signature: Signature,
}

impl Block {
    /// Create a new unsigned block with the current timestamp.
    pub fn new(
        index: u32,
        data_hash: String,
        model_hash: String,
        proposer_id: String,
        previous_hash: String,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: current_timestamp_millis(),
            data_hash,
            model_hash,
            proposer_id,
            previous_hash,
            hash: String::new(),
            signature: Signature::default(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Create the genesis block for a chain anchored to `model_hash`.
    ///
    /// Fully deterministic given the model, so every validator constructs an
    /// identical genesis at startup.
    pub fn genesis(model_hash: String, genesis_keypair: &Keypair) -> Self {
        let mut block = Self {
            index: 0,
            timestamp: 0,
            data_hash: "0".to_string(),
            model_hash,
            proposer_id: GENESIS_ID.to_string(),
            previous_hash: "0".to_string(),
            hash: String::new(),
            signature: Signature::default(),
        };
        block.hash = block.compute_hash();
        block.sign(genesis_keypair);
        block
    }

    /// The fixed-order field concatenation hashed to produce `hash`.
    ///
    /// This ordering and the decimal integer rendering are a wire/storage
    /// contract; independently implemented validators must agree bit-exactly.
    pub fn payload(&self) -> String {
        format!(
            "{}{}{}{}{}{}",
            self.index,
            self.timestamp,
            self.data_hash,
            self.model_hash,
            self.proposer_id,
            self.previous_hash
        )
    }

    /// Recompute the payload digest as a hex string.
    pub fn compute_hash(&self) -> String {
        hash(self.payload().as_bytes()).to_hex()
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == "0"
    }

    /// Sign the block's payload hash.
    pub fn sign(&mut self, keypair: &Keypair) {
        self.signature = keypair.sign(self.hash.as_bytes());
    }

    /// Create a signed block.
    pub fn signed(mut self, keypair: &Keypair) -> Self {
        self.sign(keypair);
        self
    }

    /// Verify the signature over the stored payload hash.
    pub fn verify_signature(&self, public_key: &PublicKey) -> bool {
        public_key
            .verify(self.hash.as_bytes(), &self.signature)
            .is_ok()
    }

    /// Check that the stored hash matches the recomputed payload digest.
    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

/// Current Unix timestamp in milliseconds.
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

/// Convenience for hashing a model reference string.
pub fn model_digest(model: &str) -> String {
    hash(model.as_bytes()).to_hex()
}
