//! Concurrent workloads run against a shared ledger.
//!
//! Two workloads exist: a fixed ring of transfers whose result is known in
//! advance, and random user sessions mixing every operation. Each user runs on
//! its own thread; the ledger is shared by reference.

use std::panic;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tally_core::{Ledger, LedgerError};
use tally_shared::WorkloadConfig;
use tracing::{debug, info};

/// Transfer amounts of the fixed scenario, cycled around the account ring.
const SCENARIO_AMOUNTS: [i64; 3] = [500, 300, 200];

/// Counts of finished operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    fn record<T>(&mut self, result: &Result<T, LedgerError>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            succeeded: self.succeeded + other.succeeded,
            failed: self.failed + other.failed,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// One operation performed by a simulated user on their own account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Deposit(i64),
    Withdraw(i64),
    Transfer { to: String, amount: i64 },
    ViewBalance,
}

impl Operation {
    /// Picks an operation uniformly, with amounts in the usual ranges:
    /// transfers 10..=1000, deposits and withdrawals 10..=500.
    pub fn random<R: Rng>(rng: &mut R, user: &str, accounts: &[String]) -> Self {
        match rng.gen_range(0..4) {
            0 => {
                let peers: Vec<&String> = accounts.iter().filter(|a| a.as_str() != user).collect();
                match peers.choose(rng) {
                    Some(to) => Self::Transfer {
                        to: (*to).clone(),
                        amount: rng.gen_range(10..=1000),
                    },
                    None => Self::ViewBalance,
                }
            }
            1 => Self::Deposit(rng.gen_range(10..=500)),
            2 => Self::Withdraw(rng.gen_range(10..=500)),
            _ => Self::ViewBalance,
        }
    }

    fn apply(&self, ledger: &Ledger, user: &str, summary: &mut Summary) {
        match self {
            Self::Deposit(amount) => summary.record(&ledger.deposit(user, *amount)),
            Self::Withdraw(amount) => summary.record(&ledger.withdraw(user, *amount)),
            Self::Transfer { to, amount } => summary.record(&ledger.transfer(user, to, *amount)),
            Self::ViewBalance => summary.record(&ledger.view_balance(user)),
        }
    }
}

/// Runs one transfer per account, concurrently, from each account to the next
/// one in the ring.
pub fn run_scenario(ledger: &Ledger, accounts: &[String]) -> Summary {
    if accounts.len() < 2 {
        return Summary::default();
    }

    let summary = thread::scope(|s| {
        let workers: Vec<_> = accounts
            .iter()
            .enumerate()
            .map(|(i, from)| {
                let to = &accounts[(i + 1) % accounts.len()];
                let amount = SCENARIO_AMOUNTS[i % SCENARIO_AMOUNTS.len()];
                s.spawn(move || {
                    let mut summary = Summary::default();
                    summary.record(&ledger.transfer(from, to, amount));
                    summary
                })
            })
            .collect();
        join_all(workers)
    });

    info!(succeeded = summary.succeeded, failed = summary.failed, "Scenario finished");
    summary
}

/// Runs `operations_per_user` random operations for every configured account,
/// one thread per account.
pub fn run_random(ledger: &Ledger, config: &WorkloadConfig) -> Summary {
    let accounts = &config.accounts;
    let summary = thread::scope(|s| {
        let workers: Vec<_> = accounts
            .iter()
            .enumerate()
            .map(|(i, user)| {
                let mut rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(i as u64)),
                    None => StdRng::from_entropy(),
                };
                s.spawn(move || run_user(ledger, user, config, &mut rng))
            })
            .collect();
        join_all(workers)
    });

    info!(
        users = accounts.len(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Random workload finished"
    );
    summary
}

fn run_user<R: Rng>(ledger: &Ledger, user: &str, config: &WorkloadConfig, rng: &mut R) -> Summary {
    let mut summary = Summary::default();
    for _ in 0..config.operations_per_user {
        let operation = Operation::random(rng, user, &config.accounts);
        debug!(user, ?operation, "Running operation");
        operation.apply(ledger, user, &mut summary);

        let pause = if config.max_pause_ms > config.min_pause_ms {
            rng.gen_range(config.min_pause_ms..=config.max_pause_ms)
        } else {
            config.min_pause_ms
        };
        if pause > 0 {
            thread::sleep(Duration::from_millis(pause));
        }
    }
    summary
}

fn join_all(workers: Vec<thread::ScopedJoinHandle<'_, Summary>>) -> Summary {
    workers
        .into_iter()
        .map(|worker| worker.join().unwrap_or_else(|e| panic::resume_unwind(e)))
        .fold(Summary::default(), Summary::merge)
}
