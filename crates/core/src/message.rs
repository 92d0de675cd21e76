//! Protocol messages exchanged between validators.

use crate::block::Block;
use serde::{Deserialize, Serialize};

/// The two message kinds of the single-decree voting protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Propose,
    Vote,
}

/// A wire message: message kind, sending validator, and the full block the
/// message is about. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub sender_id: String,
    pub block: Block,
}

impl Message {
    /// Build a PROPOSE message for a freshly forged block.
    pub fn propose(sender_id: String, block: Block) -> Self {
        Self {
            kind: MessageKind::Propose,
            sender_id,
            block,
        }
    }

    /// Build a VOTE message endorsing a proposed block.
    pub fn vote(sender_id: String, block: Block) -> Self {
        Self {
            kind: MessageKind::Vote,
            sender_id,
            block,
        }
    }

    /// Ballot identity: votes tally per distinct block hash.
    pub fn block_id(&self) -> &str {
        &self.block.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{model_digest, Block};
    use crate::crypto::Keypair;

    #[test]
    fn test_block_id_is_block_hash() {
        let kp = Keypair::generate();
        let block = Block::genesis(model_digest("m"), &kp);
        let hash = block.hash.clone();

        let msg = Message::propose("A".to_string(), block);
        assert_eq!(msg.block_id(), hash);
        assert_eq!(msg.kind, MessageKind::Propose);
    }

    #[test]
    fn test_bincode_roundtrip() {
        let kp = Keypair::generate();
        let block = Block::genesis(model_digest("m"), &kp);
        let msg = Message::vote("B".to_string(), block);

        let bytes = bincode::serialize(&msg).unwrap();
        let decoded: Message = bincode::deserialize(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }
}
