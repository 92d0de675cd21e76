//! Round-based quorum voting for quorumchain.
//!
//! This crate provides the consensus state machine that drives
//! propose → vote → commit per round:
//! - a single consumer task serializing all round-state transitions,
//! - a propose-once atomic gate per round,
//! - vote tallies keyed by block hash with a `2f + 1` quorum,
//! - a cancellable round timeout that re-opens voting without advancing
//!   the round.
//!
//! The engine owns the [`quorumchain_ledger::Ledger`] and talks to the
//! outside world through two queues: an inbound queue fed by the transport
//! and an outbound queue drained into broadcasts.

pub mod engine;

pub use engine::{quorum, Engine, EngineConfig, EngineError, EngineHandle};
