//! The append-only chain and its validation rules.

use quorumchain_core::block::model_digest;
use quorumchain_core::{hash_file, Block, KeyStore, KeyStoreError, Keypair, PublicKey, GENESIS_ID};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur constructing the ledger or forging blocks.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("cannot read block data at {path:?}: {source}")]
    DataUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// The canonical, in-memory block sequence of one validator.
///
/// Owned exclusively by that validator's consensus engine; mutated only by
/// [`Ledger::commit`]. Insertion order is canonical order, starting with the
/// genesis block.
pub struct Ledger {
    own_id: String,
    keypair: Keypair,
    registry: HashMap<String, PublicKey>,
    model_hash: String,
    faulty: u32,
    chain: Vec<Block>,
}

impl Ledger {
    /// Build a ledger for `own_id`, loading key material from the injected
    /// key store and appending the deterministic genesis block.
    ///
    /// Fails if the own key, the `Genesis` key, or the registry cannot be
    /// loaded; a validator must not start without them.
    pub fn new(
        own_id: impl Into<String>,
        model: &str,
        faulty: u32,
        keystore: &dyn KeyStore,
    ) -> Result<Self> {
        let own_id = own_id.into();
        let keypair = keystore.load_keypair(&own_id)?;
        let registry = keystore.load_public_keys()?;
        let genesis_keypair = keystore.load_keypair(GENESIS_ID)?;

        let model_hash = model_digest(model);
        let genesis = Block::genesis(model_hash.clone(), &genesis_keypair);

        Ok(Self {
            own_id,
            keypair,
            registry,
            model_hash,
            faulty,
            chain: vec![genesis],
        })
    }

    /// This validator's identity.
    pub fn id(&self) -> &str {
        &self.own_id
    }

    /// The assumed upper bound on simultaneously faulty validators.
    pub fn faulty(&self) -> u32 {
        self.faulty
    }

    /// Index of the latest block (0 right after genesis).
    pub fn height(&self) -> u32 {
        self.tip().index
    }

    /// The latest block.
    pub fn tip(&self) -> &Block {
        self.chain.last().expect("chain always holds genesis")
    }

    /// The full canonical sequence, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    /// Forge the next candidate block: index = tip + 1, linked to the tip,
    /// data file digested from disk, signed with the own private key.
    ///
    /// An unreadable data file is an error; the caller must not broadcast
    /// anything in that case.
    pub fn forge(&self, data_path: impl AsRef<Path>) -> Result<Block> {
        let path = data_path.as_ref();
        let data_hash = hash_file(path).map_err(|source| LedgerError::DataUnreadable {
            path: path.display().to_string(),
            source,
        })?;

        let tip = self.tip();
        let block = Block::new(
            tip.index + 1,
            data_hash.to_hex(),
            self.model_hash.clone(),
            self.own_id.clone(),
            tip.hash.clone(),
        )
        .signed(&self.keypair);

        Ok(block)
    }

    /// Unconditional append. The consensus engine is the sole trust
    /// boundary; no re-validation happens here.
    pub fn commit(&mut self, block: Block) {
        self.chain.push(block);
    }

    /// Admit a candidate proposal against the current tip: linkage, constant
    /// model hash, recomputed payload hash, registry signature.
    pub fn validate_block(&self, candidate: &Block) -> bool {
        let tip = self.tip();

        if candidate.previous_hash != tip.hash {
            debug!(index = candidate.index, "candidate does not link to tip");
            return false;
        }
        if candidate.model_hash != tip.model_hash {
            debug!(index = candidate.index, "candidate carries foreign model hash");
            return false;
        }
        if !candidate.verify_hash() {
            debug!(index = candidate.index, "candidate payload hash mismatch");
            return false;
        }
        match self.registry.get(&candidate.proposer_id) {
            Some(key) => {
                let ok = candidate.verify_signature(key);
                if !ok {
                    debug!(
                        proposer = %candidate.proposer_id,
                        "candidate signature verification failed"
                    );
                }
                ok
            }
            None => {
                debug!(proposer = %candidate.proposer_id, "unknown proposer");
                false
            }
        }
    }

    /// Validate the whole chain pairwise; any single failure invalidates it.
    pub fn validate_chain(&self) -> bool {
        for pair in self.chain.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);

            if !curr.verify_hash() {
                return false;
            }
            if curr.previous_hash != prev.hash {
                return false;
            }
            if curr.model_hash != prev.model_hash {
                return false;
            }
            let Some(key) = self.registry.get(&curr.proposer_id) else {
                return false;
            };
            if !curr.verify_signature(key) {
                return false;
            }
        }
        true
    }

    /// Human-readable chain dump, one stanza per block.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in &self.chain {
            let _ = writeln!(out, "Index:         {}", block.index);
            let _ = writeln!(out, "Timestamp:     {}", block.timestamp);
            let _ = writeln!(out, "Data Hash:     {}", block.data_hash);
            let _ = writeln!(out, "Model Hash:    {}", block.model_hash);
            let _ = writeln!(out, "Proposer ID:   {}", block.proposer_id);
            let _ = writeln!(out, "Hash:          {}", block.hash);
            let _ = writeln!(out, "Previous Hash: {}", block.previous_hash);
            let _ = writeln!(out, "Signature:     {}", block.signature);
            let _ = writeln!(out, "-----");
        }
        out
    }
}
