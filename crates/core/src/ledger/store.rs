//! Balance records on stable storage.
//!
//! Every account has one record, `<dir>/<id>.txt`, holding its integer
//! balance. Records are replaced with write-temp-then-rename so a reader only
//! ever sees the value before or after a write. There is no cache: each read
//! and write goes to the file, and callers serialize access per account.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tally_shared::AccountId;
use tracing::{debug, warn};

use super::error::LedgerError;

/// Extension of a balance record.
const RECORD_EXTENSION: &str = ".txt";

/// Suffix of the temporary sibling written before the rename.
const TEMP_SUFFIX: &str = ".tmp";

/// Extension of a temporary balance record.
const TEMP_EXTENSION: &str = ".txt.tmp";

/// Persistent storage of account balances.
///
/// Implementations must make `write_atomic` all-or-nothing from the point of
/// view of a later `read`.
pub trait BalanceStore: Send + Sync {
    /// Reads the balance of `id`.
    ///
    /// Fails with `NotFound` when no record exists and `CorruptFormat` when the
    /// record is not an integer.
    fn read(&self, id: &AccountId) -> Result<i64, LedgerError>;

    /// Replaces the balance of `id`.
    fn write_atomic(&self, id: &AccountId, balance: i64) -> Result<(), LedgerError>;

    /// Identifiers that currently have a record, sorted.
    fn list_accounts(&self) -> Result<Vec<AccountId>, LedgerError>;

    /// Removes artifacts of interrupted writes and returns how many were found.
    fn purge_temp_files(&self) -> Result<usize, LedgerError> {
        Ok(0)
    }
}

/// `BalanceStore` backed by one text file per account.
#[derive(Debug, Clone)]
pub struct FileBalanceStore {
    dir: PathBuf,
}

impl FileBalanceStore {
    /// Creates a store over an existing directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the balance record of `id`.
    #[must_use]
    pub fn record_path(&self, id: &AccountId) -> PathBuf {
        self.dir.join(format!("{id}{RECORD_EXTENSION}"))
    }

    fn dir_entries(&self) -> Result<impl Iterator<Item = (PathBuf, String)>, LedgerError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| LedgerError::io(&self.dir, e))?;
        Ok(entries.filter_map(Result::ok).filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            Some((entry.path(), name))
        }))
    }
}

impl BalanceStore for FileBalanceStore {
    fn read(&self, id: &AccountId) -> Result<i64, LedgerError> {
        let path = self.record_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LedgerError::NotFound(id.clone()));
            }
            Err(e) => return Err(LedgerError::io(path, e)),
        };

        content
            .trim()
            .parse::<i64>()
            .map_err(|_| LedgerError::CorruptFormat {
                account_id: id.clone(),
                content,
            })
    }

    fn write_atomic(&self, id: &AccountId, balance: i64) -> Result<(), LedgerError> {
        let path = self.record_path(id);
        write_file_atomic(&path, format!("{balance}\n").as_bytes())
            .map_err(|e| LedgerError::io(&path, e))?;
        debug!(account_id = %id, balance, "Balance record written");
        Ok(())
    }

    fn list_accounts(&self) -> Result<Vec<AccountId>, LedgerError> {
        let mut ids: Vec<AccountId> = self
            .dir_entries()?
            .filter_map(|(_, name)| {
                let stem = name.strip_suffix(RECORD_EXTENSION)?;
                AccountId::parse(stem).ok()
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn purge_temp_files(&self) -> Result<usize, LedgerError> {
        let mut purged = 0;
        for (path, name) in self.dir_entries()? {
            if !name.ends_with(TEMP_EXTENSION) {
                continue;
            }
            fs::remove_file(&path).map_err(|e| LedgerError::io(&path, e))?;
            warn!(path = %path.display(), "Removed leftover temp record from interrupted write");
            purged += 1;
        }
        Ok(purged)
    }
}

/// Path of the temporary sibling used while replacing `path`.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Replaces `path` with `contents` through a fsynced temporary sibling and a
/// rename. On failure the sibling is removed and `path` is left as it was.
pub(crate) fn write_file_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let temp = temp_path_for(path);

    let written = File::create(&temp)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&temp, path));

    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&temp) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(path = %temp.display(), error = %cleanup, "Failed to remove temp file");
            }
        }
        return Err(e);
    }

    if let Some(dir) = path.parent() {
        sync_dir(dir);
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "Directory fsync failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn id(raw: &str) -> AccountId {
        AccountId::parse(raw).unwrap()
    }

    fn store() -> (TempDir, FileBalanceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBalanceStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_read_missing_record() {
        let (_dir, store) = store();
        assert!(matches!(store.read(&id("User1")), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, store) = store();
        let user = id("User1");

        store.write_atomic(&user, 1000).unwrap();
        assert_eq!(store.read(&user).unwrap(), 1000);
        assert_eq!(fs::read_to_string(store.record_path(&user)).unwrap(), "1000\n");
        assert!(!temp_path_for(&store.record_path(&user)).exists());
    }

    #[rstest]
    #[case("42", 42)]
    #[case("42\n", 42)]
    #[case("-7\r\n", -7)]
    fn test_read_tolerates_trailing_newline(#[case] content: &str, #[case] expected: i64) {
        let (_dir, store) = store();
        let user = id("User1");
        fs::write(store.record_path(&user), content).unwrap();
        assert_eq!(store.read(&user).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("12abc")]
    #[case("1.5\n")]
    fn test_read_rejects_non_integer(#[case] content: &str) {
        let (_dir, store) = store();
        let user = id("User1");
        fs::write(store.record_path(&user), content).unwrap();
        assert!(matches!(
            store.read(&user),
            Err(LedgerError::CorruptFormat { .. })
        ));
    }

    #[test]
    fn test_failed_rename_removes_temp_and_keeps_target() {
        let (_dir, store) = store();
        let user = id("User1");
        // A non-empty directory at the record path makes the rename fail.
        let target = store.record_path(&user);
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let err = store.write_atomic(&user, 5).unwrap_err();
        assert!(matches!(err, LedgerError::Io { .. }));
        assert!(!temp_path_for(&store.record_path(&user)).exists());
        assert!(target.join("keep").exists());
    }

    #[test]
    fn test_list_accounts_skips_foreign_files() {
        let (dir, store) = store();
        store.write_atomic(&id("User2"), 1).unwrap();
        store.write_atomic(&id("User1"), 1).unwrap();
        fs::write(dir.path().join("transactions.log"), "").unwrap();
        fs::write(dir.path().join("central_log.txt"), "").unwrap();
        fs::write(dir.path().join("User3.txt.tmp"), "9\n").unwrap();

        assert_eq!(store.list_accounts().unwrap(), vec![id("User1"), id("User2")]);
    }

    #[test]
    fn test_purge_temp_files() {
        let (dir, store) = store();
        store.write_atomic(&id("User1"), 10).unwrap();
        fs::write(dir.path().join("User1.txt.tmp"), "99").unwrap();
        fs::write(dir.path().join("User2.txt.tmp"), "").unwrap();

        assert_eq!(store.purge_temp_files().unwrap(), 2);
        assert_eq!(store.purge_temp_files().unwrap(), 0);
        assert_eq!(store.read(&id("User1")).unwrap(), 10);
    }
}
