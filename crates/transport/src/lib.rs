//! Point-to-point TCP transport for quorumchain.
//!
//! Delivers discrete protocol messages between validators addressed by a
//! fixed socket address per identity. Topology is static; there is no
//! discovery and no membership change. Connections carry exactly one
//! length-prefixed, versioned frame each and are then closed. Broadcast is
//! best-effort: unreachable peers are logged and skipped, with no retry and
//! no acknowledgment.

pub mod codec;
pub mod net;

pub use codec::{decode_frame, encode_frame, CodecError, MAX_FRAME_LEN, WIRE_VERSION};
pub use net::Transport;
