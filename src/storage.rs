//! Pluggable storage backends for the payer registry and the
//! transaction store.
//!
//! This module defines the [`Storage`] trait and the change records a
//! spend pass commits through it.

#[cfg(feature = "storage-file")]
mod file;
mod memory;
mod state;

#[cfg(feature = "storage-file")]
pub use file::FileStorage;
pub use memory::InMemoryStorage;
pub use state::LedgerState;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Payer, PayerId, Transaction, TransactionId};

/// A single mutation produced by a spend pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionChange {
    /// Lowers an earning entry to the given remaining points.
    Reduce {
        /// Transaction to update.
        id: TransactionId,
        /// Points left on the transaction, always positive.
        points: i64,
    },
    /// Deletes a transaction outright.
    Retire(TransactionId),
}

impl TransactionChange {
    /// Returns the transaction this change targets.
    #[inline]
    #[must_use]
    pub const fn id(self) -> TransactionId {
        match self {
            Self::Reduce { id, .. } | Self::Retire(id) => id,
        }
    }
}

/// Storage backend for ledger state.
///
/// Backends expose the state through two scopes. A read scope sees a
/// consistent snapshot and may overlap other read scopes. A write scope
/// excludes every other scope, in this process and in any other process
/// sharing the backend, from before the state is loaded until its changes
/// are stored. The ledger runs each operation inside exactly one scope.
///
/// Changes made inside a write scope are kept even when `op` returns an
/// error, so callers mutate only once every check has passed.
pub trait Storage: core::fmt::Debug + Send + Sync {
    /// Runs `op` against a consistent snapshot of the state.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`, or an error if the backend fails to read.
    fn read<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&LedgerState) -> Result<R>;

    /// Runs `op` with exclusive access to the state, then stores whatever
    /// it changed.
    ///
    /// # Errors
    ///
    /// Returns the error of `op`, or an error if the backend fails to read
    /// or write.
    fn write<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut LedgerState) -> Result<R>;

    /// Returns every payer ever created, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    #[inline]
    fn payers(&self) -> Result<Vec<Payer>> {
        self.read(|state| Ok(state.payers().to_vec()))
    }

    /// Looks up a payer by exact (already trimmed) name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    #[inline]
    fn find_payer(&self, name: &str) -> Result<Option<Payer>> {
        self.read(|state| Ok(state.find_payer(name).cloned()))
    }

    /// Returns the payer with this name, creating and persisting it first
    /// if it does not exist yet. Never creates duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read or write.
    #[inline]
    fn get_or_create_payer(&self, name: &str) -> Result<Payer> {
        self.write(|state| Ok(state.get_or_create_payer(name)))
    }

    /// Returns all live transactions, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    #[inline]
    fn transactions(&self) -> Result<Vec<Transaction>> {
        self.read(|state| Ok(state.transactions().to_vec()))
    }

    /// Appends a transaction, assigning it the next identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to write.
    #[inline]
    fn insert_transaction(
        &self,
        payer: PayerId,
        points: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<Transaction> {
        self.write(|state| Ok(state.insert_transaction(payer, points, timestamp)))
    }

    /// Applies a batch of changes in one write scope. Changes naming
    /// unknown transactions are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to write.
    #[inline]
    fn apply_changes(&self, changes: &[TransactionChange]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.write(|state| {
            state.apply_changes(changes);
            Ok(())
        })
    }
}
