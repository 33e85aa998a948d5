//! Ledger operations.
//!
//! `Ledger` is the context object shared by every worker. It owns the account
//! registry, the balance store and the audit log, and exposes the operations
//! workers call: create, deposit, withdraw, transfer and view.
//!
//! Every operation follows the same shape: resolve the account handle, take
//! its lock, read the balance from storage, compute, write back atomically,
//! record the outcome in the audit log, release the lock. Every call produces
//! exactly one audit entry (transfers two, one per leg), whatever the outcome.
//!
//! # Lock ordering
//!
//! A transfer holds two account locks. They are always acquired in
//! [`AccountId`] order (byte-wise string order), smaller identifier first,
//! regardless of which side is the source. Since every pair of locks in the
//! process is taken in the same global order, circular wait cannot occur.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tally_shared::{AccountId, LedgerConfig};
use tracing::{debug, error, info, warn};

use super::audit::AuditLog;
use super::error::LedgerError;
use super::registry::{AccountHandle, AccountRegistry};
use super::store::{BalanceStore, FileBalanceStore};
use super::types::{OperationKind, Outcome, TransferReceipt};

/// Shared ledger context.
#[derive(Debug)]
pub struct Ledger<S: BalanceStore = FileBalanceStore> {
    config: LedgerConfig,
    registry: AccountRegistry,
    store: S,
    audit: AuditLog,
    /// Serializes report writers, which share one temporary sibling.
    report_writer: Mutex<()>,
}

/// Both handles of a transfer, in lock order.
struct TransferPlan {
    from: AccountId,
    to: AccountId,
    first: Arc<AccountHandle>,
    second: Arc<AccountHandle>,
}

impl Ledger<FileBalanceStore> {
    /// Opens the ledger stored in `config.data_dir`, creating the directory if
    /// needed.
    ///
    /// Leftover temporary records are removed and accounts that already have a
    /// balance record are registered (sorted by identifier) so they appear in
    /// snapshots after a restart.
    pub fn open(config: LedgerConfig) -> Result<Self, LedgerError> {
        fs::create_dir_all(&config.data_dir).map_err(|e| LedgerError::io(&config.data_dir, e))?;
        let store = FileBalanceStore::new(&config.data_dir);
        Self::with_store(config, store)
    }
}

impl<S: BalanceStore> Ledger<S> {
    /// Builds a ledger over an arbitrary store. The audit log still lives in
    /// `config.data_dir`.
    pub fn with_store(config: LedgerConfig, store: S) -> Result<Self, LedgerError> {
        let purged = store.purge_temp_files()?;
        let registry = AccountRegistry::new(config.max_accounts);

        let existing = store.list_accounts()?;
        for id in &existing {
            if let Err(err) = registry.resolve(id) {
                warn!(
                    account_id = %id,
                    error = %err,
                    "Persisted account not registered"
                );
                break;
            }
        }

        info!(
            data_dir = %config.data_dir.display(),
            accounts = registry.len(),
            capacity = registry.capacity(),
            purged,
            "Ledger opened"
        );

        Ok(Self {
            audit: AuditLog::new(config.audit_log_path()),
            config,
            registry,
            store,
            report_writer: Mutex::new(()),
        })
    }

    /// Ledger configuration.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The account registry.
    #[must_use]
    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    /// The balance store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The audit log.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub(crate) fn lock_timeout(&self) -> Option<Duration> {
        self.config.lock_timeout()
    }

    pub(crate) fn lock_report_writer(&self) -> MutexGuard<'_, ()> {
        self.report_writer.lock()
    }

    /// Creates an account with `initial_balance`.
    ///
    /// Fails with `AlreadyExists` if the account already has a record.
    pub fn create_account(&self, account: &str, initial_balance: i64) -> Result<(), LedgerError> {
        let precheck = if initial_balance < 0 {
            Err(LedgerError::InvalidAmount {
                amount: initial_balance,
                reason: "initial balance cannot be negative",
            })
        } else {
            Ok(())
        };
        let detail = format!("Initial balance: {initial_balance}");

        self.run_locked(OperationKind::CreateAccount, account, &detail, precheck, |id| {
            match self.store.read(id) {
                Err(LedgerError::NotFound(_)) => self.store.write_atomic(id, initial_balance),
                Ok(_) | Err(LedgerError::CorruptFormat { .. }) => {
                    Err(LedgerError::AlreadyExists(id.clone()))
                }
                Err(err) => Err(err),
            }
        })
    }

    /// Adds `amount` to the account and returns the new balance.
    pub fn deposit(&self, account: &str, amount: i64) -> Result<i64, LedgerError> {
        let detail = format!("Amount: {amount}");
        self.run_locked(OperationKind::Deposit, account, &detail, positive(amount), |id| {
            let balance = self.store.read(id)?;
            let new_balance = balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::BalanceOverflow(id.clone()))?;
            self.store.write_atomic(id, new_balance)?;
            Ok(new_balance)
        })
    }

    /// Removes `amount` from the account and returns the new balance.
    ///
    /// Fails with `InsufficientFunds` if the balance is lower than `amount`.
    pub fn withdraw(&self, account: &str, amount: i64) -> Result<i64, LedgerError> {
        let detail = format!("Amount: {amount}");
        self.run_locked(OperationKind::Withdraw, account, &detail, positive(amount), |id| {
            let balance = self.store.read(id)?;
            if balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    account_id: id.clone(),
                    balance,
                    requested: amount,
                });
            }
            let new_balance = balance
                .checked_sub(amount)
                .ok_or_else(|| LedgerError::BalanceOverflow(id.clone()))?;
            self.store.write_atomic(id, new_balance)?;
            Ok(new_balance)
        })
    }

    /// Returns the current balance of the account.
    ///
    /// Takes the account lock like a writer, so it never reads a record in the
    /// middle of another operation.
    pub fn view_balance(&self, account: &str) -> Result<i64, LedgerError> {
        self.run_locked(OperationKind::ViewBalance, account, "Balance viewed", Ok(()), |id| {
            self.store.read(id)
        })
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Locks are taken in identifier order (see the module docs). If a leg
    /// fails to write, every leg already written is restored to its
    /// pre-transfer value and the error is `TransferRolledBack`. The
    /// compensation is best-effort: when it fails too, the error is
    /// `RollbackIncomplete` and the debit may stand without the credit.
    pub fn transfer(&self, from: &str, to: &str, amount: i64) -> Result<TransferReceipt, LedgerError> {
        let from_detail = format!("To: {to}, Amount: {amount}");
        let to_detail = format!("From: {from}, Amount: {amount}");
        let record_legs = |result: &Result<TransferReceipt, LedgerError>| {
            self.record(OperationKind::Transfer, from, &from_detail, result);
            self.record(OperationKind::Transfer, to, &to_detail, result);
        };
        let fail = |err: LedgerError| {
            let result = Err(err);
            record_legs(&result);
            result
        };

        let plan = match self.plan_transfer(from, to, amount) {
            Ok(plan) => plan,
            Err(err) => return fail(err),
        };

        let first = match plan.first.lock(self.lock_timeout()) {
            Ok(guard) => guard,
            Err(err) => return fail(err),
        };
        let second = match plan.second.lock(self.lock_timeout()) {
            Ok(guard) => guard,
            Err(err) => {
                drop(first);
                return fail(err);
            }
        };

        let result = self.move_funds(&plan.from, &plan.to, amount);
        record_legs(&result);

        drop(second);
        drop(first);
        result
    }

    /// Validates a transfer request and resolves both handles in lock order.
    fn plan_transfer(&self, from: &str, to: &str, amount: i64) -> Result<TransferPlan, LedgerError> {
        let from = AccountId::parse(from)?;
        let to = AccountId::parse(to)?;
        if from == to {
            return Err(LedgerError::SelfTransfer(from));
        }
        positive(amount)?;

        let (smaller, larger) = AccountId::lock_order(&from, &to);
        let first = self.registry.resolve(smaller)?;
        let second = self.registry.resolve(larger)?;

        Ok(TransferPlan {
            from,
            to,
            first,
            second,
        })
    }

    /// Read-modify-write of both legs. Caller holds both account locks.
    fn move_funds(&self, from: &AccountId, to: &AccountId, amount: i64) -> Result<TransferReceipt, LedgerError> {
        let from_balance = self.store.read(from)?;
        let to_balance = self.store.read(to)?;

        if from_balance < amount {
            return Err(LedgerError::InsufficientFunds {
                account_id: from.clone(),
                balance: from_balance,
                requested: amount,
            });
        }
        let new_from = from_balance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(from.clone()))?;
        let new_to = to_balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow(to.clone()))?;

        if let Err(err) = self.store.write_atomic(from, new_from) {
            // Nothing was written, both records still hold their old values.
            error!(from = %from, to = %to, amount, error = %err, "Transfer debit failed");
            return Err(LedgerError::TransferRolledBack {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if let Err(err) = self.store.write_atomic(to, new_to) {
            error!(from = %from, to = %to, amount, error = %err, "Transfer credit failed, rolling back");
            return Err(self.roll_back(from, from_balance, to));
        }

        Ok(TransferReceipt {
            from: from.clone(),
            to: to.clone(),
            amount,
            from_balance: new_from,
            to_balance: new_to,
        })
    }

    /// Writes the source's pre-transfer balance back after the credit leg
    /// failed. The destination record is untouched by the failed write.
    fn roll_back(&self, from: &AccountId, from_balance: i64, to: &AccountId) -> LedgerError {
        match self.store.write_atomic(from, from_balance) {
            Ok(()) => LedgerError::TransferRolledBack {
                from: from.clone(),
                to: to.clone(),
            },
            Err(err) => {
                error!(
                    from = %from,
                    from_balance,
                    to = %to,
                    error = %err,
                    "Transfer rollback incomplete, debit not restored"
                );
                LedgerError::RollbackIncomplete {
                    from: from.clone(),
                    to: to.clone(),
                }
            }
        }
    }

    /// Runs a single-account operation under that account's lock and records
    /// its outcome before the lock is released.
    fn run_locked<T>(
        &self,
        kind: OperationKind,
        account: &str,
        detail: &str,
        precheck: Result<(), LedgerError>,
        body: impl FnOnce(&AccountId) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let finish = |result: Result<T, LedgerError>| {
            self.record(kind, account, detail, &result);
            result
        };

        let handle = match precheck
            .and_then(|()| AccountId::parse(account).map_err(LedgerError::from))
            .and_then(|id| self.registry.resolve(&id))
        {
            Ok(handle) => handle,
            Err(err) => return finish(Err(err)),
        };

        let guard = match handle.lock(self.lock_timeout()) {
            Ok(guard) => guard,
            Err(err) => return finish(Err(err)),
        };
        let result = finish(body(guard.id()));
        drop(guard);
        result
    }

    /// Appends the audit entry for one operation (or one transfer leg).
    fn record<T>(&self, kind: OperationKind, subject: &str, detail: &str, result: &Result<T, LedgerError>) {
        let outcome = Outcome::of(result);
        match result {
            Ok(_) => {
                debug!(operation = %kind, account = subject, detail, "Operation succeeded");
                self.audit.append(kind, subject, detail, outcome);
            }
            Err(err) => {
                match err {
                    LedgerError::Io { .. }
                    | LedgerError::TransferRolledBack { .. }
                    | LedgerError::RollbackIncomplete { .. } => {
                        error!(operation = %kind, account = subject, code = err.error_code(), error = %err, "Operation failed");
                    }
                    _ => {
                        info!(operation = %kind, account = subject, code = err.error_code(), error = %err, "Operation rejected");
                    }
                }
                self.audit
                    .append(kind, subject, &format!("{detail}, Error: {err}"), outcome);
            }
        }
    }
}

fn positive(amount: i64) -> Result<(), LedgerError> {
    if amount > 0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount {
            amount,
            reason: "amount must be positive",
        })
    }
}
