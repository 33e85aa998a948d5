//! Domain types shared by the ledger components.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tally_shared::AccountId;
use thiserror::Error;

/// Timestamp layout used in the audit log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Field separator of an audit line.
const FIELD_SEPARATOR: &str = " | ";

/// Kind of ledger operation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Account creation.
    CreateAccount,
    /// Deposit into one account.
    Deposit,
    /// Withdrawal from one account.
    Withdraw,
    /// Transfer between two accounts.
    Transfer,
    /// Balance inquiry.
    ViewBalance,
}

impl OperationKind {
    /// Label written to the audit log.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreateAccount => "Create Account",
            Self::Deposit => "Deposit",
            Self::Withdraw => "Withdraw",
            Self::Transfer => "Transfer",
            Self::ViewBalance => "View Balance",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OperationKind {
    type Err = ParseEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create Account" => Ok(Self::CreateAccount),
            "Deposit" => Ok(Self::Deposit),
            "Withdraw" => Ok(Self::Withdraw),
            "Transfer" => Ok(Self::Transfer),
            "View Balance" => Ok(Self::ViewBalance),
            other => Err(ParseEntryError::UnknownKind(other.to_string())),
        }
    }
}

/// Outcome of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The operation committed.
    Success,
    /// The operation did not commit.
    Failed,
}

impl Outcome {
    /// Maps an operation result to its outcome.
    #[must_use]
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() { Self::Success } else { Self::Failed }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
        })
    }
}

impl FromStr for Outcome {
    type Err = ParseEntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Success" => Ok(Self::Success),
            "Failed" => Ok(Self::Failed),
            other => Err(ParseEntryError::UnknownOutcome(other.to_string())),
        }
    }
}

/// Errors from parsing an audit line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseEntryError {
    /// The line does not have five fields.
    #[error("malformed audit line: {0:?}")]
    Malformed(String),

    /// The timestamp does not match [`TIMESTAMP_FORMAT`].
    #[error("invalid audit timestamp: {0:?}")]
    Timestamp(String),

    /// Unknown operation kind.
    #[error("unknown operation kind: {0:?}")]
    UnknownKind(String),

    /// Unknown outcome.
    #[error("unknown outcome: {0:?}")]
    UnknownOutcome(String),
}

/// One immutable line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Local time the entry was written, second precision.
    pub timestamp: NaiveDateTime,
    /// Operation kind.
    pub kind: OperationKind,
    /// Subject account as supplied by the caller.
    pub subject: String,
    /// Free-form detail.
    pub detail: String,
    /// Outcome of the operation.
    pub outcome: Outcome,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {} | {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.kind,
            self.subject,
            self.detail,
            self.outcome
        )
    }
}

impl FromStr for AuditEntry {
    type Err = ParseEntryError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseEntryError::Malformed(line.to_string());

        let mut head = line.splitn(4, FIELD_SEPARATOR);
        let timestamp = head.next().ok_or_else(malformed)?;
        let kind = head.next().ok_or_else(malformed)?;
        let subject = head.next().ok_or_else(malformed)?;
        let rest = head.next().ok_or_else(malformed)?;
        // Detail is free-form, so the outcome is taken from the right.
        let (detail, outcome) = rest.rsplit_once(FIELD_SEPARATOR).ok_or_else(malformed)?;

        Ok(Self {
            timestamp: NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
                .map_err(|_| ParseEntryError::Timestamp(timestamp.to_string()))?,
            kind: kind.parse()?,
            subject: subject.to_string(),
            detail: detail.to_string(),
            outcome: outcome.parse()?,
        })
    }
}

/// Balances after a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Source account.
    pub from: AccountId,
    /// Destination account.
    pub to: AccountId,
    /// Amount moved.
    pub amount: i64,
    /// Source balance after the transfer.
    pub from_balance: i64,
    /// Destination balance after the transfer.
    pub to_balance: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_entry(detail: &str) -> AuditEntry {
        AuditEntry {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(9, 30, 5)
                .unwrap(),
            kind: OperationKind::Transfer,
            subject: "User1".to_string(),
            detail: detail.to_string(),
            outcome: Outcome::Failed,
        }
    }

    #[test]
    fn test_entry_line_format() {
        assert_eq!(
            sample_entry("To: User2, Amount: 500").to_string(),
            "2024-01-15 09:30:05 | Transfer | User1 | To: User2, Amount: 500 | Failed"
        );
    }

    #[test]
    fn test_entry_parse_keeps_separator_in_detail() {
        let entry = sample_entry("odd | detail");
        let parsed: AuditEntry = entry.to_string().parse().unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_entry_parse_errors() {
        assert!(matches!(
            "garbage".parse::<AuditEntry>(),
            Err(ParseEntryError::Malformed(_))
        ));
        assert!(matches!(
            "2024-01-15 09:30:05 | Refund | User1 | x | Success".parse::<AuditEntry>(),
            Err(ParseEntryError::UnknownKind(_))
        ));
        assert!(matches!(
            "yesterday | Deposit | User1 | x | Success".parse::<AuditEntry>(),
            Err(ParseEntryError::Timestamp(_))
        ));
        assert!(matches!(
            "2024-01-15 09:30:05 | Deposit | User1 | x | Maybe".parse::<AuditEntry>(),
            Err(ParseEntryError::UnknownOutcome(_))
        ));
    }

    #[test]
    fn test_outcome_of_result() {
        assert_eq!(Outcome::of::<_, ()>(&Ok(1)), Outcome::Success);
        assert_eq!(Outcome::of::<(), _>(&Err("no")), Outcome::Failed);
    }
}
