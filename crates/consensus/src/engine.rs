//! The per-round single-decree voting engine.
//!
//! One engine instance runs per validator. A single consumer task drains the
//! inbound queue in arrival order and serializes every state transition;
//! the only concurrent actors are the propose-once atomic gate and the round
//! timeout task, which shares a mutex-guarded critical section with commit
//! so an expiring timeout can never clear state mid-finalization.

use quorumchain_core::{Block, Message, MessageKind};
use quorumchain_ledger::{Ledger, LedgerError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Minimum matching votes required to commit a block under `f` faults.
pub fn quorum(faulty: u32) -> usize {
    2 * faulty as usize + 1
}

/// Errors raised at engine construction or when proposing.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{have} validators cannot tolerate f={faulty} faults (need at least {need})")]
    InsufficientValidators { faulty: u32, have: usize, need: usize },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Engine tuning parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long after casting a vote the round stays open before the vote
    /// state is reset and the round can be re-proposed.
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// State scoped to the round currently being decided. Cleared entirely on
/// commit or on timeout expiry.
struct RoundState {
    ledger: Ledger,
    /// First-seen proposal per block id; later proposals under the same id
    /// are ignored.
    candidates: HashMap<String, Block>,
    /// Idempotent voter sets per block id.
    votes: HashMap<String, HashSet<String>>,
    /// At most one outstanding timeout.
    timeout_task: Option<JoinHandle<()>>,
}

struct Shared {
    own_id: String,
    quorum: usize,
    timeout: Duration,
    /// Monotonic round counter; advances only on commit.
    round: AtomicU32,
    /// Propose-once gate, deliberately decoupled from the state lock so the
    /// dedup check stays race-free without it.
    has_voted: AtomicBool,
    state: Mutex<RoundState>,
    inbound_tx: mpsc::UnboundedSender<Message>,
    outbound_tx: mpsc::UnboundedSender<Message>,
}

/// The consensus state machine. Construct with [`Engine::new`], then drive
/// it by awaiting [`Engine::run`] on a task.
pub struct Engine {
    shared: Arc<Shared>,
    inbound_rx: mpsc::UnboundedReceiver<Message>,
}

/// Cloneable handle for interacting with a running engine: proposing blocks,
/// feeding it inbound messages, and reading chain snapshots.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
}

impl Engine {
    /// Build an engine around a ledger.
    ///
    /// `peer_count` is the transport topology size excluding this node;
    /// construction fails unless `peer_count + 1 >= 3f + 1`, the minimum
    /// network size that keeps quorum intersection safe under `f` faults.
    pub fn new(
        ledger: Ledger,
        config: EngineConfig,
        peer_count: usize,
        outbound_tx: mpsc::UnboundedSender<Message>,
    ) -> Result<(Self, EngineHandle), EngineError> {
        let faulty = ledger.faulty();
        let have = peer_count + 1;
        let need = 3 * faulty as usize + 1;
        if have < need {
            return Err(EngineError::InsufficientValidators { faulty, have, need });
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            own_id: ledger.id().to_string(),
            quorum: quorum(faulty),
            timeout: config.timeout,
            round: AtomicU32::new(1),
            has_voted: AtomicBool::new(false),
            state: Mutex::new(RoundState {
                ledger,
                candidates: HashMap::new(),
                votes: HashMap::new(),
                timeout_task: None,
            }),
            inbound_tx,
            outbound_tx,
        });

        let handle = EngineHandle {
            shared: Arc::clone(&shared),
        };
        Ok((Self { shared, inbound_rx }, handle))
    }

    /// Consume the inbound queue until every sender is dropped.
    ///
    /// Adversarial, stale, or duplicate input is dropped with a debug log;
    /// nothing received from the network can make this loop exit or panic.
    pub async fn run(mut self) {
        info!(id = %self.shared.own_id, quorum = self.shared.quorum, "consensus engine running");
        while let Some(msg) = self.inbound_rx.recv().await {
            Shared::route(&self.shared, msg);
        }
        debug!(id = %self.shared.own_id, "inbound queue closed, engine stopping");
    }
}

impl EngineHandle {
    /// A sender the transport pushes received messages into.
    pub fn inbound_sender(&self) -> mpsc::UnboundedSender<Message> {
        self.shared.inbound_tx.clone()
    }

    /// Forge a block from the data at `data_path` and propose it to the
    /// network (including this validator itself, which votes on it through
    /// the normal inbound path).
    ///
    /// A forge failure aborts the proposal; nothing is broadcast.
    pub fn propose(&self, data_path: &str) -> Result<Block, EngineError> {
        let block = {
            let state = self.shared.lock_state();
            state.ledger.forge(data_path)?
        };
        let msg = Message::propose(self.shared.own_id.clone(), block.clone());
        self.shared.send_outbound(msg.clone());
        // Self-delivery: the proposer validates and votes like any peer.
        let _ = self.shared.inbound_tx.send(msg);
        Ok(block)
    }

    /// The round currently being decided.
    pub fn round(&self) -> u32 {
        self.shared.round.load(Ordering::SeqCst)
    }

    /// Index of the latest committed block.
    pub fn height(&self) -> u32 {
        self.shared.lock_state().ledger.height()
    }

    /// Clone of the canonical chain, genesis first.
    pub fn snapshot(&self) -> Vec<Block> {
        self.shared.lock_state().ledger.blocks().to_vec()
    }

    /// Re-run full chain validation.
    pub fn validate_chain(&self) -> bool {
        self.shared.lock_state().ledger.validate_chain()
    }

    /// Human-readable chain dump.
    pub fn render_chain(&self) -> String {
        self.shared.lock_state().ledger.render()
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().expect("round state lock poisoned")
    }

    fn send_outbound(&self, msg: Message) {
        if self.outbound_tx.send(msg).is_err() {
            warn!(id = %self.own_id, "outbound queue closed, dropping broadcast");
        }
    }

    fn route(this: &Arc<Self>, msg: Message) {
        match msg.kind {
            MessageKind::Propose => Self::on_propose(this, msg),
            MessageKind::Vote => this.on_vote(msg),
        }
    }

    fn on_propose(this: &Arc<Self>, msg: Message) {
        // Propose-once gate: at most one vote per round.
        if this
            .has_voted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(id = %this.own_id, sender = %msg.sender_id, "already voted this round, dropping proposal");
            return;
        }

        let mut state = this.lock_state();

        // Invalid or stale proposals are Byzantine noise, not errors. The
        // gate stays consumed until the round timeout or a commit resets it.
        if !state.ledger.validate_block(&msg.block) {
            debug!(id = %this.own_id, sender = %msg.sender_id, "dropping invalid proposal");
            return;
        }
        let round = this.round.load(Ordering::SeqCst);
        if msg.block.index != round {
            debug!(
                id = %this.own_id,
                proposal_round = msg.block.index,
                current_round = round,
                "dropping proposal for wrong round"
            );
            return;
        }

        let vote = Message::vote(this.own_id.clone(), msg.block);
        this.send_outbound(vote.clone());
        this.register_vote(&mut state, vote);
        Self::arm_timeout(this, &mut state);
    }

    fn on_vote(&self, msg: Message) {
        let mut state = self.lock_state();
        self.register_vote(&mut state, msg);
    }

    /// Tally a vote; commits the block if its voter set reaches quorum.
    fn register_vote(&self, state: &mut RoundState, msg: Message) {
        let round = self.round.load(Ordering::SeqCst);
        if msg.block.index != round {
            debug!(
                id = %self.own_id,
                vote_round = msg.block.index,
                current_round = round,
                "dropping vote for wrong round"
            );
            return;
        }

        let block_id = msg.block_id().to_string();
        state
            .candidates
            .entry(block_id.clone())
            .or_insert_with(|| msg.block.clone());
        let voters = state.votes.entry(block_id.clone()).or_default();
        voters.insert(msg.sender_id.clone());
        let tally = voters.len();

        debug!(id = %self.own_id, voter = %msg.sender_id, tally, "vote registered");

        if tally >= self.quorum {
            self.commit(state, &block_id);
        }
    }

    /// Finalize the round: append the decided block, clear round state, and
    /// advance the counter. Runs under the state lock, which the timeout
    /// handler also takes, so expiry cannot interleave with finalization.
    fn commit(&self, state: &mut RoundState, block_id: &str) {
        if let Some(task) = state.timeout_task.take() {
            task.abort();
        }

        let block = state
            .candidates
            .get(block_id)
            .cloned()
            .expect("committed block was registered with its first vote");
        info!(
            id = %self.own_id,
            round = block.index,
            hash = %block.hash,
            proposer = %block.proposer_id,
            "block committed"
        );
        state.ledger.commit(block);
        state.candidates.clear();
        state.votes.clear();
        self.has_voted.store(false, Ordering::SeqCst);
        self.round.fetch_add(1, Ordering::SeqCst);
    }

    /// Arm the round timeout, atomically replacing any prior deadline.
    fn arm_timeout(this: &Arc<Self>, state: &mut RoundState) {
        if let Some(prev) = state.timeout_task.take() {
            prev.abort();
        }
        let shared = Arc::clone(this);
        let armed_round = this.round.load(Ordering::SeqCst);
        let timeout = this.timeout;
        state.timeout_task = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            shared.expire_round(armed_round);
        }));
    }

    /// Timeout expiry: quorum was not reached in time. Clears the vote state
    /// so the unchanged round can be proposed afresh by any validator.
    fn expire_round(&self, armed_round: u32) {
        let mut state = self.lock_state();
        // A commit may have advanced the round between the sleep elapsing
        // and the lock being acquired; the stale expiry is then a no-op.
        if self.round.load(Ordering::SeqCst) != armed_round {
            return;
        }
        warn!(
            id = %self.own_id,
            round = armed_round,
            "round timed out before quorum, reopening voting"
        );
        state.candidates.clear();
        state.votes.clear();
        state.timeout_task = None;
        self.has_voted.store(false, Ordering::SeqCst);
    }
}
