//! Append-only signed block ledger for quorumchain.
//!
//! The [`Ledger`] owns the canonical block sequence of one validator. It
//! forges candidate blocks, admits proposals against the current tip, and
//! appends blocks that the consensus engine has decided on.
//!
//! # Example
//!
//! ```rust,no_run
//! use quorumchain_core::{MemoryKeyStore, GENESIS_ID};
//! use quorumchain_ledger::Ledger;
//!
//! let mut keys = MemoryKeyStore::new();
//! keys.generate("A");
//! keys.generate(GENESIS_ID);
//!
//! let ledger = Ledger::new("A", "model-v1", 1, &keys).unwrap();
//! assert_eq!(ledger.height(), 0);
//! assert!(ledger.validate_chain());
//! ```

pub mod ledger;

pub use ledger::{Ledger, LedgerError};
