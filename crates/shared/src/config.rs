//! Application configuration management.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Ledger core configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Workload driver configuration.
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// Ledger core configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Directory holding balance records, the audit log and the report.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Maximum number of accounts the registry accepts.
    #[serde(default = "default_max_accounts")]
    pub max_accounts: usize,
    /// Account lock acquisition timeout in milliseconds. `0` waits forever.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// File name of the audit log inside `data_dir`.
    #[serde(default = "default_audit_log_file")]
    pub audit_log_file: String,
    /// File name of the snapshot report inside `data_dir`.
    #[serde(default = "default_report_file")]
    pub report_file: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("accounts")
}

fn default_max_accounts() -> usize {
    100
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_audit_log_file() -> String {
    "transactions.log".to_string()
}

fn default_report_file() -> String {
    "central_log.txt".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_accounts: default_max_accounts(),
            lock_timeout_ms: default_lock_timeout_ms(),
            audit_log_file: default_audit_log_file(),
            report_file: default_report_file(),
        }
    }
}

impl LedgerConfig {
    /// Creates a configuration rooted at `data_dir` with default settings.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Set the registry capacity.
    #[must_use]
    pub fn with_max_accounts(mut self, max_accounts: usize) -> Self {
        self.max_accounts = max_accounts;
        self
    }

    /// Set the lock timeout. `None` waits forever.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout_ms = timeout.map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Lock acquisition timeout, `None` when unbounded.
    #[must_use]
    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_ms > 0).then(|| Duration::from_millis(self.lock_timeout_ms))
    }

    /// Full path of the audit log.
    #[must_use]
    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.audit_log_file)
    }

    /// Full path of the snapshot report.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join(&self.report_file)
    }
}

/// Workload driver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Accounts created before the workload starts.
    #[serde(default = "default_accounts")]
    pub accounts: Vec<String>,
    /// Initial balance of every account.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: i64,
    /// Random operations each user performs after the fixed scenario.
    #[serde(default)]
    pub operations_per_user: usize,
    /// Seed for the random workload; random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Shortest pause between two random operations, in milliseconds.
    #[serde(default = "default_min_pause_ms")]
    pub min_pause_ms: u64,
    /// Longest pause between two random operations, in milliseconds.
    #[serde(default = "default_max_pause_ms")]
    pub max_pause_ms: u64,
}

fn default_accounts() -> Vec<String> {
    vec!["User1".to_string(), "User2".to_string(), "User3".to_string()]
}

fn default_initial_balance() -> i64 {
    1000
}

fn default_min_pause_ms() -> u64 {
    100
}

fn default_max_pause_ms() -> u64 {
    500
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            accounts: default_accounts(),
            initial_balance: default_initial_balance(),
            operations_per_user: 0,
            seed: None,
            min_pause_ms: default_min_pause_ms(),
            max_pause_ms: default_max_pause_ms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// and `TALLY__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("workload.accounts"),
            )
            .build()?;

        config.try_deserialize()
    }
}
