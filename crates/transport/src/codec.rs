//! Message encoding and decoding for the wire.
//!
//! # Wire Format
//!
//! ```text
//! [length: u32 BE][version: u8][payload: bincode-encoded Message]
//! ```
//!
//! - The length prefix counts the version byte plus the payload.
//! - Version is currently `1`; unknown versions are rejected.
//! - The payload is a [`quorumchain_core::Message`] in bincode's fixed field
//!   order, so independently built validators interoperate without sharing
//!   runtime type representations.

use quorumchain_core::Message;
use thiserror::Error;

/// Current wire format version.
pub const WIRE_VERSION: u8 = 1;

/// Upper bound on a frame body; anything larger is rejected before
/// allocation.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown wire version: {0}")]
    UnknownVersion(u8),

    #[error("frame too short")]
    FrameTooShort,

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte cap")]
    FrameTooLarge(usize),

    #[error("payload decode error: {0}")]
    Decode(#[from] bincode::Error),
}

/// Encode a message into a frame body (version byte + payload), without the
/// length prefix.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serialize(message)?;
    let mut bytes = Vec::with_capacity(1 + payload.len());
    bytes.push(WIRE_VERSION);
    bytes.extend(payload);
    Ok(bytes)
}

/// Decode a frame body back into a message.
pub fn decode_frame(data: &[u8]) -> Result<Message, CodecError> {
    if data.is_empty() {
        return Err(CodecError::FrameTooShort);
    }
    if data.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(data.len()));
    }
    let version = data[0];
    if version != WIRE_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }
    Ok(bincode::deserialize(&data[1..])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumchain_core::block::model_digest;
    use quorumchain_core::{Block, Keypair, Message};

    fn sample_message() -> Message {
        let kp = Keypair::generate();
        let block = Block::genesis(model_digest("model-v1"), &kp);
        Message::propose("A".to_string(), block)
    }

    #[test]
    fn test_roundtrip() {
        let msg = sample_message();
        let frame = encode_frame(&msg).unwrap();
        assert_eq!(frame[0], WIRE_VERSION);

        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut frame = encode_frame(&sample_message()).unwrap();
        frame[0] = 99;
        assert!(matches!(
            decode_frame(&frame),
            Err(CodecError::UnknownVersion(99))
        ));
    }

    #[test]
    fn test_empty_frame_rejected() {
        assert!(matches!(decode_frame(&[]), Err(CodecError::FrameTooShort)));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let frame = encode_frame(&sample_message()).unwrap();
        assert!(decode_frame(&frame[..frame.len() / 2]).is_err());
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let mut frame = vec![WIRE_VERSION];
        frame.extend([0xFF; 16]);
        assert!(decode_frame(&frame).is_err());
    }
}
