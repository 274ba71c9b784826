//! Ledger persisted as JSON documents on disk.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::models::{Payer, Transaction, TransactionId};

use super::LedgerState;

/// Directory name under the platform data dir.
const APP_NAME: &str = "points-ledger";

/// File name for payers.
const PAYERS_FILE: &str = "payers.json";
/// File name for the transaction log.
const TRANSACTIONS_FILE: &str = "transactions.json";
/// Advisory lock sentinel.
const LOCK_FILE: &str = "storage.lock";

/// On-disk form of the transaction store.
///
/// The next identifier is kept alongside the entries so that retiring the
/// newest transaction never lets its identifier be handed out again.
#[derive(Debug, Serialize, Deserialize)]
struct TransactionLog {
    /// Identifier for the next inserted transaction.
    next_id: TransactionId,
    /// Live transactions, in creation order.
    transactions: Vec<Transaction>,
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self {
            next_id: TransactionId::FIRST,
            transactions: Vec::new(),
        }
    }
}

/// How [`FileStorage::locked`] holds the sentinel file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    /// Many readers at once, across processes.
    Shared,
    /// A single writer; blocks readers in other processes.
    Exclusive,
}

/// Ledger storage kept as two JSON documents in one directory.
///
/// Callers in the same process are serialized by a mutex. Other
/// processes sharing the directory coordinate through an advisory lock on
/// `storage.lock`: a read scope holds it shared while loading, a write
/// scope holds it exclusive from loading the documents until its changes
/// are stored, so two processes never plan against the same snapshot.
/// A write never leaves a half-written document behind, since each file
/// is written beside its target and renamed over it.
///
/// ```text
/// <dir>/
///   storage.lock
///   payers.json         [{"id": 1, "name": "DANNON"}, ...]
///   transactions.json   {"next_id": 6, "transactions": [...]}
/// ```
#[derive(Debug)]
pub struct FileStorage {
    /// Directory holding the ledger documents.
    dir: PathBuf,
    /// In-process serialization of ledger access.
    guard: Mutex<()>,
    /// Advisory lock sentinel shared with other processes.
    sentinel: fs::File,
}

impl FileStorage {
    /// Opens the ledger stored in `dir`, creating the directory and its
    /// lock sentinel when missing. An empty directory is an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if `dir` or the sentinel cannot be
    /// created.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(storage_io_error)?;
        let sentinel = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(dir.join(LOCK_FILE))
            .map_err(storage_io_error)?;
        Ok(Self {
            dir,
            guard: Mutex::new(()),
            sentinel,
        })
    }

    /// Per-user ledger directory, `points-ledger` under the platform data
    /// dir (`~/.local/share/points-ledger/` on most Linux systems).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] when the platform has no data
    /// directory.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        let Some(base) = dirs::data_dir() else {
            return Err(LedgerError::Storage(
                "no platform data directory for the ledger".into(),
            ));
        };
        Ok(base.join(APP_NAME))
    }

    /// Location of one ledger document.
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Runs `op` while holding the in-process guard and the sentinel lock
    /// in `mode`. An unlock failure is reported only if `op` succeeded.
    fn locked<R, F: FnOnce() -> Result<R>>(&self, mode: LockMode, op: F) -> Result<R> {
        let _held: MutexGuard<'_, ()> =
            self.guard.lock().map_err(|err| lock_poison_error(&err))?;
        let acquired = match mode {
            LockMode::Shared => self.sentinel.lock_shared(),
            LockMode::Exclusive => self.sentinel.lock(),
        };
        acquired.map_err(storage_io_error)?;
        let outcome = op();
        match (self.sentinel.unlock(), outcome) {
            (Err(err), Ok(_)) => Err(storage_io_error(err)),
            (Ok(()) | Err(_), outcome) => outcome,
        }
    }

    /// Loads a document, treating a missing file as `T::default()`.
    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        match fs::read_to_string(self.path(name)) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(err) => Err(storage_io_error(err)),
        }
    }

    /// Replaces a document: writes `<name>.tmp`, then renames it over
    /// `<name>`.
    fn store<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let staged = self.path(&format!("{name}.tmp"));
        fs::write(&staged, serde_json::to_vec_pretty(value)?).map_err(storage_io_error)?;
        fs::rename(&staged, self.path(name)).map_err(storage_io_error)
    }

    /// Loads both documents. Caller holds the lock.
    fn load_state(&self) -> Result<LedgerState> {
        let payers: Vec<Payer> = self.load(PAYERS_FILE)?;
        let log: TransactionLog = self.load(TRANSACTIONS_FILE)?;
        Ok(LedgerState::restore(payers, log.transactions, log.next_id))
    }

    /// Stores whichever documents `state` changed. Caller holds the
    /// exclusive lock.
    fn persist(&self, state: LedgerState) -> Result<()> {
        let payers_changed = state.payers_changed();
        let transactions_changed = state.transactions_changed();
        let (payers, transactions, next_id) = state.into_parts();
        if payers_changed {
            self.store(PAYERS_FILE, &payers)?;
        }
        if transactions_changed {
            self.store(
                TRANSACTIONS_FILE,
                &TransactionLog {
                    next_id,
                    transactions,
                },
            )?;
        }
        Ok(())
    }
}

/// Maps a filesystem failure to [`LedgerError::Storage`].
fn storage_io_error(err: std::io::Error) -> LedgerError {
    LedgerError::Storage(Box::new(err))
}

/// Maps a poisoned in-process guard to [`LedgerError::Storage`].
fn lock_poison_error<T>(err: &std::sync::PoisonError<T>) -> LedgerError {
    LedgerError::Storage(format!("ledger storage guard poisoned: {err}").into())
}

impl super::Storage for FileStorage {
    #[inline]
    fn read<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&LedgerState) -> Result<R>,
    {
        let state = self.locked(LockMode::Shared, || self.load_state())?;
        op(&state)
    }

    #[inline]
    fn write<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut LedgerState) -> Result<R>,
    {
        self.locked(LockMode::Exclusive, || {
            let mut state = self.load_state()?;
            let outcome = op(&mut state);
            self.persist(state)?;
            outcome
        })
    }
}
