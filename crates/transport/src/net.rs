//! TCP listener and best-effort broadcast.

use crate::codec::{decode_frame, encode_frame, MAX_FRAME_LEN};
use quorumchain_core::Message;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Socket transport for one validator: a listening accept loop feeding the
/// engine's inbound queue, plus one-shot outbound connections per peer.
pub struct Transport {
    peers: Vec<SocketAddr>,
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl Transport {
    /// Bind the validator's own address and start accepting.
    ///
    /// Received messages are pushed into `inbound`; the receiving half
    /// belongs to the consensus engine.
    pub async fn bind(
        addr: SocketAddr,
        peers: Vec<SocketAddr>,
        inbound: mpsc::UnboundedSender<Message>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, peers, inbound))
    }

    /// Wrap an already-bound listener. Useful when binding to an ephemeral
    /// port and distributing the resulting address to peers.
    pub fn from_listener(
        listener: TcpListener,
        peers: Vec<SocketAddr>,
        inbound: mpsc::UnboundedSender<Message>,
    ) -> Self {
        let local_addr = listener
            .local_addr()
            .expect("bound listener has a local address");
        let accept_task = tokio::spawn(accept_loop(listener, inbound));
        Self {
            peers,
            local_addr,
            accept_task,
        }
    }

    /// Number of configured peers, excluding this node. The engine uses this
    /// to enforce the `n >= 3f + 1` startup precondition.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send one message to every configured peer, sequentially, over a fresh
    /// connection each. Unreachable peers are logged and skipped; commit
    /// liveness relies on enough peers being reachable to form a quorum.
    pub async fn broadcast(&self, message: &Message) {
        let frame = match encode_frame(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound message");
                return;
            }
        };
        for peer in &self.peers {
            if let Err(e) = send_frame(*peer, &frame).await {
                warn!(peer = %peer, error = %e, "peer unreachable, skipping");
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn send_frame(peer: SocketAddr, frame: &[u8]) -> io::Result<()> {
    let mut stream = TcpStream::connect(peer).await?;
    stream.write_u32(frame.len() as u32).await?;
    stream.write_all(frame).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}

async fn accept_loop(listener: TcpListener, inbound: mpsc::UnboundedSender<Message>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                let inbound = inbound.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &inbound).await {
                        debug!(remote = %remote, error = %e, "dropping inbound connection");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
            }
        }
    }
}

/// Read exactly one frame, decode it, enqueue it, done. Connections are
/// single-message and never reused.
async fn handle_connection(
    mut stream: TcpStream,
    inbound: &mpsc::UnboundedSender<Message>,
) -> io::Result<()> {
    let len = stream.read_u32().await? as usize;
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {len} out of bounds"),
        ));
    }
    let mut frame = vec![0u8; len];
    stream.read_exact(&mut frame).await?;

    let message =
        decode_frame(&frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    // A closed queue means the engine is gone; nothing left to deliver to.
    let _ = inbound.send(message);
    Ok(())
}
