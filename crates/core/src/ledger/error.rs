//! Ledger error types.
//!
//! This module defines all errors that can occur during ledger operations,
//! including account lookup errors, balance errors, registry errors, storage
//! errors and transfer compensation errors.

use std::io;
use std::path::PathBuf;

use tally_shared::{AccountId, AccountIdError};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Input Errors ==========
    /// Account identifier failed validation.
    #[error("Invalid account id: {0}")]
    InvalidAccountId(#[from] AccountIdError),

    /// Amount is out of range for the operation.
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// The rejected amount.
        amount: i64,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Source and destination of a transfer are the same account.
    #[error("Cannot transfer from account {0} to itself")]
    SelfTransfer(AccountId),

    // ========== Account Errors ==========
    /// No balance record exists for the account.
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    /// A balance record already exists for the account.
    #[error("Account {0} already exists")]
    AlreadyExists(AccountId),

    /// The balance record does not contain an integer.
    #[error("Invalid balance format for account {account_id}: {content:?}")]
    CorruptFormat {
        /// The account ID.
        account_id: AccountId,
        /// Offending record content.
        content: String,
    },

    /// The registry is full.
    #[error("Account registry is full ({capacity} accounts)")]
    CapacityExceeded {
        /// Configured maximum number of accounts.
        capacity: usize,
    },

    // ========== Balance Errors ==========
    /// Balance is lower than the requested amount.
    #[error("Insufficient funds in account {account_id}. Current balance: {balance}, requested: {requested}")]
    InsufficientFunds {
        /// The account ID.
        account_id: AccountId,
        /// Balance at the time of the check.
        balance: i64,
        /// Requested amount.
        requested: i64,
    },

    /// The new balance does not fit in an `i64`.
    #[error("Balance overflow for account {0}")]
    BalanceOverflow(AccountId),

    // ========== Concurrency Errors ==========
    /// The account lock could not be acquired in time.
    #[error("Timed out waiting for lock on account {0}")]
    LockTimeout(AccountId),

    // ========== Storage Errors ==========
    /// Reading or writing a balance record failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The audit log could not be opened or written.
    #[error("Audit log unavailable at {path}: {source}")]
    LogUnavailable {
        /// Audit log path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    // ========== Transfer Compensation Errors ==========
    /// A transfer leg failed to write; no balance was left changed.
    #[error("Transfer from {from} to {to} failed and has been rolled back")]
    TransferRolledBack {
        /// Source account.
        from: AccountId,
        /// Destination account.
        to: AccountId,
    },

    /// A transfer leg failed to write and restoring a balance also failed.
    #[error("Transfer from {from} to {to} failed and could not be fully rolled back")]
    RollbackIncomplete {
        /// Source account.
        from: AccountId,
        /// Destination account.
        to: AccountId,
    },
}

impl LedgerError {
    /// Creates an I/O error for `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns a stable error code for callers and reports.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAccountId(_) => "INVALID_ACCOUNT_ID",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::SelfTransfer(_) => "SELF_TRANSFER",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::CorruptFormat { .. } => "CORRUPT_FORMAT",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::BalanceOverflow(_) => "BALANCE_OVERFLOW",
            Self::LockTimeout(_) => "LOCK_TIMEOUT",
            Self::Io { .. } => "IO_ERROR",
            Self::LogUnavailable { .. } => "LOG_UNAVAILABLE",
            Self::TransferRolledBack { .. } => "TRANSFER_ROLLED_BACK",
            Self::RollbackIncomplete { .. } => "ROLLBACK_INCOMPLETE",
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }
}
