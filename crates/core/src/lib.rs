//! Core ledger logic for Tally.
//!
//! This crate contains the concurrency-and-persistence core with ZERO network
//! or database dependencies: balances live in plain files, every mutation is
//! serialized per account, and every outcome lands in an append-only audit log.
//!
//! # Modules
//!
//! - `ledger` - Accounts, balance storage, audit log, operations and reports

pub mod ledger;

pub use ledger::{Ledger, LedgerError};
pub use tally_shared::{AccountId, LedgerConfig};
