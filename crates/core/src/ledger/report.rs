//! Snapshot report of all registered accounts.
//!
//! Accounts are sampled one at a time, each under its own lock, while the
//! registry lock keeps the account list fixed. The result is not a
//! point-in-time snapshot across accounts: others may change between samples.

use std::fmt;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tally_shared::AccountId;
use tracing::{info, warn};

use super::error::LedgerError;
use super::service::Ledger;
use super::store::{BalanceStore, write_file_atomic};

/// Title line of the rendered report.
pub const REPORT_TITLE: &str = "Central Log - Account Balances";

/// One sampled account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    /// The account ID.
    pub account_id: AccountId,
    /// Balance at the time it was sampled.
    pub balance: i64,
}

/// Balances of every registered account, in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// When sampling started.
    pub generated_at: NaiveDateTime,
    /// Sampled accounts.
    pub lines: Vec<ReportLine>,
    /// Registered accounts that could not be sampled.
    pub skipped: Vec<AccountId>,
}

impl Report {
    /// Sum of all sampled balances.
    ///
    /// Widened to `i128`: every balance fits in an `i64`, their sum may not.
    #[must_use]
    pub fn total(&self) -> i128 {
        self.lines.iter().map(|line| i128::from(line.balance)).sum()
    }

    /// Balance sampled for `id`, if any.
    #[must_use]
    pub fn balance_of(&self, id: &str) -> Option<i64> {
        self.lines
            .iter()
            .find(|line| line.account_id.as_str() == id)
            .map(|line| line.balance)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{REPORT_TITLE}")?;
        writeln!(f, "{}", "-".repeat(50))?;
        for line in &self.lines {
            writeln!(f, "Account: {}, Balance: {}", line.account_id, line.balance)?;
        }
        Ok(())
    }
}

/// Produces [`Report`]s from a ledger.
pub struct SnapshotReporter<'a, S: BalanceStore> {
    ledger: &'a Ledger<S>,
}

impl<'a, S: BalanceStore> SnapshotReporter<'a, S> {
    /// Creates a reporter over `ledger`.
    #[must_use]
    pub fn new(ledger: &'a Ledger<S>) -> Self {
        Self { ledger }
    }

    /// Samples every registered account.
    ///
    /// Accounts whose lock times out or whose record cannot be read are listed
    /// in `skipped` instead.
    #[must_use]
    pub fn generate(&self) -> Report {
        let generated_at = Local::now().naive_local();
        let timeout = self.ledger.lock_timeout();
        let store = self.ledger.store();

        let mut lines = Vec::new();
        let mut skipped = Vec::new();

        self.ledger.registry().with_handles(|handles| {
            for handle in handles {
                let sampled = handle
                    .lock(timeout)
                    .and_then(|guard| store.read(guard.id()));
                match sampled {
                    Ok(balance) => lines.push(ReportLine {
                        account_id: handle.id().clone(),
                        balance,
                    }),
                    Err(err) => {
                        warn!(account_id = %handle.id(), error = %err, "Account left out of report");
                        skipped.push(handle.id().clone());
                    }
                }
            }
        });

        Report {
            generated_at,
            lines,
            skipped,
        }
    }

    /// Generates a report and installs it at `path` atomically.
    ///
    /// Concurrent callers are serialized, so the last one to return installed
    /// the latest sample.
    pub fn write_report(&self, path: &Path) -> Result<Report, LedgerError> {
        let _writer = self.ledger.lock_report_writer();
        let report = self.generate();
        write_file_atomic(path, report.to_string().as_bytes())
            .map_err(|e| LedgerError::io(path, e))?;
        info!(
            path = %path.display(),
            accounts = report.lines.len(),
            skipped = report.skipped.len(),
            "Report written"
        );
        Ok(report)
    }
}

impl<S: BalanceStore> Ledger<S> {
    /// Reporter over this ledger.
    #[must_use]
    pub fn reporter(&self) -> SnapshotReporter<'_, S> {
        SnapshotReporter::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tally_shared::LedgerConfig;

    #[test]
    fn test_report_in_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(LedgerConfig::new(dir.path())).unwrap();
        ledger.create_account("User2", 200).unwrap();
        ledger.create_account("User1", 100).unwrap();
        // Registered but never created: skipped.
        let _ = ledger.view_balance("Ghost");

        let report = ledger.reporter().generate();
        assert_eq!(
            report.to_string(),
            format!(
                "{REPORT_TITLE}\n{}\nAccount: User2, Balance: 200\nAccount: User1, Balance: 100\n",
                "-".repeat(50)
            )
        );
        assert_eq!(report.total(), 300);
        assert_eq!(report.balance_of("User1"), Some(100));
        assert_eq!(report.skipped, vec![AccountId::parse("Ghost").unwrap()]);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig::new(dir.path());
        let path = config.report_path();
        let ledger = Ledger::open(config).unwrap();
        ledger.create_account("User1", 1000).unwrap();

        let report = ledger.reporter().write_report(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), report.to_string());

        // The report file is not mistaken for an account on reopen.
        let reopened = Ledger::open(LedgerConfig::new(dir.path())).unwrap();
        assert_eq!(reopened.registry().len(), 1);
    }

    #[test]
    fn test_total_beyond_i64() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(LedgerConfig::new(dir.path())).unwrap();
        ledger.create_account("A", i64::MAX).unwrap();
        ledger.create_account("B", 1).unwrap();

        let report = ledger.reporter().generate();
        assert_eq!(report.total(), i128::from(i64::MAX) + 1);
    }

    #[test]
    fn test_empty_ledger_report() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(LedgerConfig::new(dir.path())).unwrap();

        let report = ledger.reporter().generate();
        assert!(report.lines.is_empty());
        assert_eq!(report.total(), 0);
    }
}
