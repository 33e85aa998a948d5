//! Append-only audit log.
//!
//! One writer at a time across the whole log. Each append opens the file in
//! append mode, writes one complete line and closes it again, so concurrent
//! operations never interleave partial lines.
//!
//! Audit failures are best-effort: the first one is reported as a warning,
//! later ones only at debug level, and none of them change the outcome of the
//! ledger operation being recorded.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Local, Timelike};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::error::LedgerError;
use super::types::{AuditEntry, OperationKind, Outcome};

/// Serialized writer of audit entries.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<()>,
    failure_reported: AtomicBool,
}

impl AuditLog {
    /// Creates a log writing to `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
            failure_reported: AtomicBool::new(false),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records one entry stamped with the current local time.
    ///
    /// Never fails; see [`AuditLog::try_append`] for the fallible variant.
    pub fn append(&self, kind: OperationKind, subject: &str, detail: &str, outcome: Outcome) {
        if let Err(err) = self.try_append(kind, subject, detail, outcome) {
            if self.failure_reported.swap(true, Ordering::Relaxed) {
                debug!(error = %err, "Audit entry dropped");
            } else {
                warn!(error = %err, "Audit log unavailable, entries will be dropped");
            }
        }
    }

    /// Records one entry, returning `LogUnavailable` if the log cannot be written.
    pub fn try_append(
        &self,
        kind: OperationKind,
        subject: &str,
        detail: &str,
        outcome: Outcome,
    ) -> Result<(), LedgerError> {
        let subject = one_line(subject).replace('|', "_");
        let detail = one_line(detail);

        let _writer = self.writer.lock();
        // Stamped under the writer lock so file order is timestamp order.
        let now = Local::now().naive_local();
        let entry = AuditEntry {
            timestamp: now.with_nanosecond(0).unwrap_or(now),
            kind,
            subject,
            detail,
            outcome,
        };
        self.write_line(&format!("{entry}\n"))
            .map_err(|source| LedgerError::LogUnavailable {
                path: self.path.clone(),
                source,
            })
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// Parses every entry currently in the log.
    ///
    /// A missing log reads as empty. Taken under the writer lock so the last
    /// line is never read half-written.
    pub fn read_entries(&self) -> Result<Vec<AuditEntry>, LedgerError> {
        let content = {
            let _writer = self.writer.lock();
            match fs::read_to_string(&self.path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(source) => {
                    return Err(LedgerError::LogUnavailable {
                        path: self.path.clone(),
                        source,
                    });
                }
            }
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.parse().map_err(|e| LedgerError::LogUnavailable {
                    path: self.path.clone(),
                    source: io::Error::new(io::ErrorKind::InvalidData, e),
                })
            })
            .collect()
    }
}

/// Keeps caller-supplied text from splitting an entry across lines.
fn one_line(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
