//! Proof-of-work ledger node: hash-linked blocks of signed transfers,
//! balances replayed from the chain, and longest-valid-chain consensus.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod consensus;
pub mod error;
pub mod node;
pub mod persistence;
pub mod transaction;
pub mod wallet;
