//! Account identifiers.
//!
//! An `AccountId` names both the in-memory lock handle and the on-disk balance
//! record, so it is validated once at the boundary and carried around typed.
//! Its `Ord` implementation (byte-wise string order) is the total order used
//! whenever two account locks are acquired together.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons an identifier is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountIdError {
    /// The identifier is empty.
    #[error("account id cannot be empty")]
    Empty,

    /// The identifier is longer than [`AccountId::MAX_LEN`] bytes.
    #[error("account id is {len} bytes, maximum is {max}")]
    TooLong {
        /// Actual length in bytes.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// The identifier contains a character that is not allowed in a file name.
    #[error("account id contains invalid character {0:?}")]
    InvalidCharacter(char),

    /// The identifier uses a suffix reserved for ledger artifacts.
    #[error("account id cannot end with '{}'", AccountId::RESERVED_SUFFIX)]
    Reserved,
}

/// Unique, case-sensitive identifier of an account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Maximum identifier length in bytes.
    pub const MAX_LEN: usize = 49;

    /// Suffix reserved for the ledger's own files (`central_log.txt`).
    pub const RESERVED_SUFFIX: &'static str = "_log";

    /// Validates and wraps an identifier.
    ///
    /// Allowed characters are ASCII letters, digits, `_` and `-`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, AccountIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(AccountIdError::Empty);
        }
        if raw.len() > Self::MAX_LEN {
            return Err(AccountIdError::TooLong {
                len: raw.len(),
                max: Self::MAX_LEN,
            });
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(AccountIdError::InvalidCharacter(c));
        }
        if raw.ends_with(Self::RESERVED_SUFFIX) {
            return Err(AccountIdError::Reserved);
        }
        Ok(Self(raw))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Orders a pair of identifiers for lock acquisition.
    ///
    /// Returns `(smaller, larger)` regardless of argument order.
    #[must_use]
    pub fn lock_order<'a>(a: &'a Self, b: &'a Self) -> (&'a Self, &'a Self) {
        if a <= b { (a, b) } else { (b, a) }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AccountId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("User1")]
    #[case("savings_account-2")]
    #[case("a")]
    fn test_valid_ids(#[case] raw: &str) {
        let id = AccountId::parse(raw).unwrap();
        assert_eq!(id.as_str(), raw);
        assert_eq!(id.to_string(), raw);
    }

    #[rstest]
    #[case("", AccountIdError::Empty)]
    #[case("../etc", AccountIdError::InvalidCharacter('.'))]
    #[case("with space", AccountIdError::InvalidCharacter(' '))]
    #[case("central_log", AccountIdError::Reserved)]
    fn test_invalid_ids(#[case] raw: &str, #[case] expected: AccountIdError) {
        assert_eq!(AccountId::parse(raw).unwrap_err(), expected);
    }

    #[test]
    fn test_length_bound() {
        let max = "x".repeat(AccountId::MAX_LEN);
        assert!(AccountId::parse(max).is_ok());

        let over = "x".repeat(AccountId::MAX_LEN + 1);
        assert_eq!(
            AccountId::parse(over).unwrap_err(),
            AccountIdError::TooLong { len: 50, max: 49 }
        );
    }

    #[test]
    fn test_case_sensitive() {
        let lower: AccountId = "user1".parse().unwrap();
        let upper: AccountId = "User1".parse().unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_lock_order_is_direction_independent() {
        let a: AccountId = "User1".parse().unwrap();
        let b: AccountId = "User2".parse().unwrap();

        assert_eq!(AccountId::lock_order(&a, &b), (&a, &b));
        assert_eq!(AccountId::lock_order(&b, &a), (&a, &b));
    }

    #[test]
    fn test_order_is_bytewise() {
        let upper: AccountId = "Zed".parse().unwrap();
        let lower: AccountId = "alpha".parse().unwrap();
        assert!(upper < lower);
    }
}
