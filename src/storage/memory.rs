//! Ledger state held in process memory; gone when the process exits.

use std::sync::{Mutex, PoisonError};

use crate::error::{LedgerError, Result};

use super::LedgerState;

/// Volatile ledger storage, safe to share between threads.
///
/// # Example
///
/// ```rust
/// use points_ledger::ledger::Ledger;
/// use points_ledger::storage::InMemoryStorage;
///
/// let ledger = Ledger::new(InMemoryStorage::new());
/// assert!(ledger.balances().unwrap().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    /// Payers, transactions, and id counters. Readers and writers alike
    /// hold the mutex for their whole scope.
    state: Mutex<LedgerState>,
}

impl InMemoryStorage {
    /// Empty ledger storage.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// A thread panicked while holding the state mutex.
fn poisoned<T>(err: &PoisonError<T>) -> LedgerError {
    LedgerError::Storage(format!("in-memory ledger poisoned: {err}").into())
}

impl super::Storage for InMemoryStorage {
    #[inline]
    fn read<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&LedgerState) -> Result<R>,
    {
        let state = self.state.lock().map_err(|err| poisoned(&err))?;
        op(&*state)
    }

    #[inline]
    fn write<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut LedgerState) -> Result<R>,
    {
        let mut state = self.state.lock().map_err(|err| poisoned(&err))?;
        op(&mut *state)
    }
}
