//! Tally workload simulator
//!
//! Opens the ledger, creates the configured accounts, drives concurrent users
//! against it and writes the balance report.

mod workload;

use anyhow::Context;
use tally_core::{Ledger, LedgerError};
use tally_shared::AppConfig;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_core=info,tally_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    let workload = &config.workload;

    let ledger = Ledger::open(config.ledger.clone()).context("Failed to open ledger")?;

    for account in &workload.accounts {
        match ledger.create_account(account, workload.initial_balance) {
            Ok(()) => {}
            Err(LedgerError::AlreadyExists(_)) => {
                warn!(account, "Account already exists, keeping its balance");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to create account {account}"));
            }
        }
    }

    let mut summary = workload::run_scenario(&ledger, &workload.accounts);
    if workload.operations_per_user > 0 {
        let random = workload::run_random(&ledger, workload);
        summary.succeeded += random.succeeded;
        summary.failed += random.failed;
    }

    let report_path = config.ledger.report_path();
    let report = ledger
        .reporter()
        .write_report(&report_path)
        .context("Failed to write report")?;

    info!(
        operations = summary.total(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        accounts = report.lines.len(),
        total = report.total(),
        report = %report_path.display(),
        "Simulation complete"
    );
    print!("{report}");

    Ok(())
}
