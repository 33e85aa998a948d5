//! Account registry: identifier to per-account lock handle.
//!
//! Handles are created lazily on first reference, never removed, and bounded
//! by a fixed capacity. The registry lock only covers lookup and insertion;
//! account-level work happens on the returned handle after it is released.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tally_shared::AccountId;
use tracing::debug;

use super::error::LedgerError;

/// In-memory representation of an account: its identifier and its lock.
#[derive(Debug)]
pub struct AccountHandle {
    id: AccountId,
    lock: Mutex<()>,
}

impl AccountHandle {
    fn new(id: AccountId) -> Self {
        Self {
            id,
            lock: Mutex::new(()),
        }
    }

    /// The account identifier.
    #[must_use]
    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// Acquires the account lock, waiting at most `timeout` when one is given.
    pub fn lock(&self, timeout: Option<Duration>) -> Result<AccountGuard<'_>, LedgerError> {
        let guard = match timeout {
            Some(timeout) => self
                .lock
                .try_lock_for(timeout)
                .ok_or_else(|| LedgerError::LockTimeout(self.id.clone()))?,
            None => self.lock.lock(),
        };
        Ok(AccountGuard {
            id: &self.id,
            _guard: guard,
        })
    }
}

/// Proof that an account lock is held; released on drop.
#[derive(Debug)]
pub struct AccountGuard<'a> {
    id: &'a AccountId,
    _guard: MutexGuard<'a, ()>,
}

impl AccountGuard<'_> {
    /// The locked account.
    #[must_use]
    pub fn id(&self) -> &AccountId {
        self.id
    }
}

#[derive(Debug, Default)]
struct Entries {
    /// Registration order.
    handles: Vec<Arc<AccountHandle>>,
    index: HashMap<AccountId, usize>,
}

/// Bounded, append-only table of account handles.
#[derive(Debug)]
pub struct AccountRegistry {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl AccountRegistry {
    /// Creates an empty registry accepting at most `capacity` accounts.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Returns the handle for `id`, registering it if there is room.
    pub fn resolve(&self, id: &AccountId) -> Result<Arc<AccountHandle>, LedgerError> {
        let mut entries = self.entries.lock();
        if let Some(&slot) = entries.index.get(id) {
            return Ok(Arc::clone(&entries.handles[slot]));
        }
        if entries.handles.len() >= self.capacity {
            return Err(LedgerError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let handle = Arc::new(AccountHandle::new(id.clone()));
        let slot = entries.handles.len();
        entries.handles.push(Arc::clone(&handle));
        entries.index.insert(id.clone(), slot);
        debug!(account_id = %id, slot, "Account registered");
        Ok(handle)
    }

    /// Maximum number of accounts.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of registered accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().handles.len()
    }

    /// Returns true if no account is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all handles in registration order.
    #[must_use]
    pub fn handles(&self) -> Vec<Arc<AccountHandle>> {
        self.entries.lock().handles.clone()
    }

    /// Runs `f` over the handles in registration order while holding the
    /// registry lock, so no account is registered meanwhile.
    ///
    /// `f` must not call back into the registry.
    pub fn with_handles<R>(&self, f: impl FnOnce(&[Arc<AccountHandle>]) -> R) -> R {
        let entries = self.entries.lock();
        f(&entries.handles)
    }
}
