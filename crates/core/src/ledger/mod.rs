//! Concurrent file-backed ledger.
//!
//! This module implements the ledger core:
//! - Balance records with atomic replacement (`store`)
//! - The serialized, append-only audit log (`audit`)
//! - The bounded registry of per-account locks (`registry`)
//! - Ledger operations with ordered two-account locking (`service`)
//! - Snapshot reports of all registered accounts (`report`)
//! - Error types for ledger operations

pub mod audit;
pub mod error;
pub mod registry;
pub mod report;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod service_props;

pub use audit::AuditLog;
pub use error::LedgerError;
pub use registry::{AccountGuard, AccountHandle, AccountRegistry};
pub use report::{Report, ReportLine, SnapshotReporter};
pub use service::Ledger;
pub use store::{BalanceStore, FileBalanceStore};
pub use types::{AuditEntry, OperationKind, Outcome, ParseEntryError, TransferReceipt};
