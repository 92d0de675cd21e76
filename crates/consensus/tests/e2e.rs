//! Multi-validator scenarios over real TCP transports.

use quorumchain_consensus::{Engine, EngineConfig, EngineHandle};
use quorumchain_core::{MemoryKeyStore, Message, GENESIS_ID};
use quorumchain_ledger::Ledger;
use quorumchain_transport::Transport;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::sleep;

const IDS: [&str; 4] = ["A", "B", "C", "D"];

fn keystore() -> MemoryKeyStore {
    let mut store = MemoryKeyStore::new();
    for id in IDS {
        store.generate(id);
    }
    store.generate(GENESIS_ID);
    store
}

fn data_file(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

async fn bind_listeners(n: usize) -> (Vec<TcpListener>, Vec<SocketAddr>) {
    let mut listeners = Vec::new();
    let mut addrs = Vec::new();
    for _ in 0..n {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        addrs.push(listener.local_addr().unwrap());
        listeners.push(listener);
    }
    (listeners, addrs)
}

/// A running validator: engine task, transport, and the forwarder draining
/// the engine's outbound queue into broadcasts.
fn start_validator(
    store: &MemoryKeyStore,
    id: &str,
    listener: TcpListener,
    peers: Vec<SocketAddr>,
    timeout: Duration,
) -> EngineHandle {
    let ledger = Ledger::new(id, "model-v1", 1, store).unwrap();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (engine, handle) =
        Engine::new(ledger, EngineConfig { timeout }, peers.len(), outbound_tx).unwrap();

    let transport = Arc::new(Transport::from_listener(
        listener,
        peers,
        handle.inbound_sender(),
    ));
    tokio::spawn(engine.run());
    tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            transport.broadcast(&msg).await;
        }
    });
    handle
}

/// A bound socket whose messages go nowhere: a live but silent validator.
fn start_silent(listener: TcpListener) -> (Transport, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Transport::from_listener(listener, vec![], tx), rx)
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn peers_excluding(addrs: &[SocketAddr], own: usize) -> Vec<SocketAddr> {
    addrs
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != own)
        .map(|(_, a)| *a)
        .collect()
}

/// Four validators, f=1, quorum 3. A proposes; A, B, and C vote; the silent
/// fourth validator has no effect on the outcome.
#[tokio::test]
async fn four_validators_commit_with_one_silent() {
    let store = keystore();
    let (mut listeners, addrs) = bind_listeners(4).await;
    let d_listener = listeners.pop().unwrap();
    let mut handles = Vec::new();
    for (i, listener) in listeners.into_iter().enumerate() {
        handles.push(start_validator(
            &store,
            IDS[i],
            listener,
            peers_excluding(&addrs, i),
            Duration::from_secs(10),
        ));
    }
    let (_silent, mut silent_rx) = start_silent(d_listener);

    let data = data_file(b"round 1 payload");
    let block = handles[0].propose(data.path().to_str().unwrap()).unwrap();
    assert_eq!(block.index, 1);

    wait_for(|| handles.iter().all(|h| h.round() == 2)).await;

    for handle in &handles {
        assert_eq!(handle.height(), 1);
        let tip = handle.snapshot().last().cloned().unwrap();
        assert_eq!(tip, block);
        assert!(handle.validate_chain());
    }

    // The silent validator received traffic but never influenced anything
    wait_for(|| silent_rx.try_recv().is_ok()).await;
}

/// A's first proposal stalls below quorum; the round timeout reopens voting
/// for the same round, and the retry commits once the missing vote arrives.
#[tokio::test]
async fn timeout_then_retry_commits_same_round() {
    let store = keystore();
    let (mut listeners, addrs) = bind_listeners(4).await;

    // Only A and B run engines; C and D stay silent at first
    let d_listener = listeners.pop().unwrap();
    let c_listener = listeners.pop().unwrap();
    let timeout = Duration::from_millis(400);

    let handle_a = start_validator(
        &store,
        "A",
        listeners.remove(0),
        peers_excluding(&addrs, 0),
        timeout,
    );
    let handle_b = start_validator(
        &store,
        "B",
        listeners.remove(0),
        peers_excluding(&addrs, 1),
        timeout,
    );
    let (_silent_c, _rx_c) = start_silent(c_listener);
    let (_silent_d, _rx_d) = start_silent(d_listener);

    let data = data_file(b"round 1 payload");
    let first = handle_a.propose(data.path().to_str().unwrap()).unwrap();
    assert_eq!(first.index, 1);

    // Self-vote plus B: two of three. Quorum never forms.
    sleep(Duration::from_millis(200)).await;
    assert_eq!(handle_a.round(), 1);
    assert_eq!(handle_b.round(), 1);

    // Let both round timeouts fire and reopen voting
    sleep(timeout * 3).await;
    assert_eq!(handle_a.round(), 1);
    assert_eq!(handle_a.height(), 0);

    // Retry for the unchanged round
    let second = handle_a.propose(data.path().to_str().unwrap()).unwrap();
    assert_eq!(second.index, 1);
    sleep(Duration::from_millis(200)).await;

    // C comes back just long enough to cast the missing vote
    let (c_tx, _c_rx) = mpsc::unbounded_channel();
    let c_sender = Transport::bind(
        "127.0.0.1:0".parse().unwrap(),
        vec![addrs[0], addrs[1]],
        c_tx,
    )
    .await
    .unwrap();
    c_sender
        .broadcast(&Message::vote("C".to_string(), second.clone()))
        .await;

    wait_for(|| handle_a.round() == 2 && handle_b.round() == 2).await;

    for handle in [&handle_a, &handle_b] {
        assert_eq!(handle.height(), 1);
        assert_eq!(handle.snapshot().last().unwrap(), &second);
        assert!(handle.validate_chain());
    }
}
