//! Property-based tests for ledger operations.
//!
//! - Property 1: Conservation under transfers
//! - Property 2: No negative balances
//! - Property 3: Audit completeness

use proptest::prelude::*;
use tally_shared::LedgerConfig;
use tempfile::TempDir;

use super::error::LedgerError;
use super::service::Ledger;

const ACCOUNTS: [&str; 4] = ["A", "B", "C", "D"];

/// One requested operation.
#[derive(Debug, Clone)]
enum Op {
    Deposit(usize, i64),
    Withdraw(usize, i64),
    Transfer(usize, usize, i64),
    View(usize),
}

/// Strategy to pick an account index.
fn account() -> impl Strategy<Value = usize> {
    0..ACCOUNTS.len()
}

/// Strategy to generate amounts, including invalid ones.
fn amount() -> impl Strategy<Value = i64> {
    prop_oneof![
        8 => 1i64..1_500,
        1 => -10i64..=0,
    ]
}

/// Strategy to generate a transfer (possibly a self-transfer).
fn transfer() -> impl Strategy<Value = (usize, usize, i64)> {
    (account(), account(), amount())
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (account(), amount()).prop_map(|(a, x)| Op::Deposit(a, x)),
        (account(), amount()).prop_map(|(a, x)| Op::Withdraw(a, x)),
        transfer().prop_map(|(a, b, x)| Op::Transfer(a, b, x)),
        account().prop_map(Op::View),
    ]
}

/// Ledger with every account created at `initial`.
fn ledger_with(initial: i64) -> (TempDir, Ledger) {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(LedgerConfig::new(dir.path())).unwrap();
    for name in ACCOUNTS {
        ledger.create_account(name, initial).unwrap();
    }
    (dir, ledger)
}

fn balances(ledger: &Ledger) -> Vec<i64> {
    ACCOUNTS
        .iter()
        .map(|name| ledger.view_balance(name).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property 1: For any sequence of transfers among a closed set of
    /// accounts, the sum of balances is unchanged.
    #[test]
    fn prop_transfers_conserve_total(
        initial in 0i64..2_000,
        transfers in prop::collection::vec(transfer(), 1..40),
    ) {
        let (_dir, ledger) = ledger_with(initial);
        let total = initial * 4;

        for (from, to, amount) in transfers {
            let _ = ledger.transfer(ACCOUNTS[from], ACCOUNTS[to], amount);
        }

        prop_assert_eq!(balances(&ledger).iter().sum::<i64>(), total);
    }

    /// Property 2: A successful withdrawal or transfer never leaves the source
    /// negative; an insufficient one changes nothing.
    #[test]
    fn prop_no_negative_balance(
        initial in 0i64..1_000,
        ops in prop::collection::vec(op(), 1..40),
    ) {
        let (_dir, ledger) = ledger_with(initial);

        for op in ops {
            let before = balances(&ledger);
            match op {
                Op::Withdraw(a, amount) => match ledger.withdraw(ACCOUNTS[a], amount) {
                    Ok(after) => {
                        prop_assert!(after >= 0);
                        prop_assert_eq!(after, before[a] - amount);
                    }
                    Err(LedgerError::InsufficientFunds { balance, .. }) => {
                        prop_assert_eq!(balance, before[a]);
                        prop_assert_eq!(balances(&ledger), before);
                    }
                    Err(_) => prop_assert_eq!(balances(&ledger), before),
                },
                Op::Transfer(a, b, amount) => match ledger.transfer(ACCOUNTS[a], ACCOUNTS[b], amount) {
                    Ok(receipt) => {
                        prop_assert!(receipt.from_balance >= 0);
                        prop_assert_eq!(receipt.from_balance, before[a] - amount);
                        prop_assert_eq!(receipt.to_balance, before[b] + amount);
                    }
                    Err(_) => prop_assert_eq!(balances(&ledger), before),
                },
                Op::Deposit(a, amount) => {
                    let _ = ledger.deposit(ACCOUNTS[a], amount);
                }
                Op::View(a) => {
                    prop_assert_eq!(ledger.view_balance(ACCOUNTS[a]).unwrap(), before[a]);
                }
            }
            prop_assert!(balances(&ledger).iter().all(|b| *b >= 0));
        }
    }

    /// Property 3: Every call leaves exactly one audit entry, two for a
    /// transfer, whether it succeeds or fails.
    #[test]
    fn prop_every_call_is_audited(
        ops in prop::collection::vec(op(), 1..30),
    ) {
        let (_dir, ledger) = ledger_with(500);
        let baseline = ledger.audit().read_entries().unwrap().len();

        let mut expected = 0;
        for op in ops {
            match op {
                Op::Deposit(a, x) => {
                    let _ = ledger.deposit(ACCOUNTS[a], x);
                    expected += 1;
                }
                Op::Withdraw(a, x) => {
                    let _ = ledger.withdraw(ACCOUNTS[a], x);
                    expected += 1;
                }
                Op::Transfer(a, b, x) => {
                    let _ = ledger.transfer(ACCOUNTS[a], ACCOUNTS[b], x);
                    expected += 2;
                }
                Op::View(a) => {
                    let _ = ledger.view_balance(ACCOUNTS[a]);
                    expected += 1;
                }
            }
        }

        let entries = ledger.audit().read_entries().unwrap();
        prop_assert_eq!(entries.len(), baseline + expected);
    }
}
