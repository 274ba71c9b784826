//! The ledger state a storage scope hands to the engine.

use chrono::{DateTime, Utc};

use crate::models::{Payer, PayerId, Transaction, TransactionId};

use super::TransactionChange;

/// Payers, live transactions, and identifier counters, as seen inside one
/// storage scope.
///
/// Mutators record which half of the state they touched so a persistent
/// backend only rewrites what changed.
#[derive(Debug, Clone)]
pub struct LedgerState {
    /// Every payer ever registered, in creation order.
    payers: Vec<Payer>,
    /// Live transactions, in creation order.
    transactions: Vec<Transaction>,
    /// Identifier for the next payer.
    next_payer: PayerId,
    /// Identifier for the next transaction.
    next_transaction: TransactionId,
    /// Set once a payer is registered.
    #[cfg_attr(
        not(feature = "storage-file"),
        expect(dead_code, reason = "read only by the file backend")
    )]
    payers_changed: bool,
    /// Set once a transaction is inserted, reduced, or retired.
    #[cfg_attr(
        not(feature = "storage-file"),
        expect(dead_code, reason = "read only by the file backend")
    )]
    transactions_changed: bool,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            payers: Vec::new(),
            transactions: Vec::new(),
            next_payer: PayerId::FIRST,
            next_transaction: TransactionId::FIRST,
            payers_changed: false,
            transactions_changed: false,
        }
    }
}

impl LedgerState {
    /// Rebuilds state from persisted parts. Counters never fall behind an
    /// identifier already in use.
    #[cfg(feature = "storage-file")]
    pub(crate) fn restore(
        payers: Vec<Payer>,
        transactions: Vec<Transaction>,
        next_transaction: TransactionId,
    ) -> Self {
        let next_payer = payers
            .iter()
            .map(|p| p.id)
            .max()
            .map_or(PayerId::FIRST, PayerId::next);
        let next_transaction = transactions
            .iter()
            .map(|tx| tx.id.next())
            .fold(next_transaction, Ord::max);
        Self {
            payers,
            transactions,
            next_payer,
            next_transaction,
            payers_changed: false,
            transactions_changed: false,
        }
    }

    /// Splits the state into payers, transactions, and the next
    /// transaction identifier.
    #[cfg(feature = "storage-file")]
    pub(crate) fn into_parts(self) -> (Vec<Payer>, Vec<Transaction>, TransactionId) {
        (self.payers, self.transactions, self.next_transaction)
    }

    /// Whether a payer was registered in this scope.
    #[cfg(feature = "storage-file")]
    pub(crate) const fn payers_changed(&self) -> bool {
        self.payers_changed
    }

    /// Whether the transaction list was modified in this scope.
    #[cfg(feature = "storage-file")]
    pub(crate) const fn transactions_changed(&self) -> bool {
        self.transactions_changed
    }

    /// Every payer ever registered, in creation order.
    #[inline]
    #[must_use]
    pub fn payers(&self) -> &[Payer] {
        &self.payers
    }

    /// Live transactions, in creation order.
    #[inline]
    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Looks up a payer by exact (already trimmed) name.
    #[inline]
    #[must_use]
    pub fn find_payer(&self, name: &str) -> Option<&Payer> {
        self.payers.iter().find(|p| p.name == name)
    }

    /// Returns the payer with this name, registering it first if needed.
    #[inline]
    pub fn get_or_create_payer(&mut self, name: &str) -> Payer {
        if let Some(existing) = self.find_payer(name) {
            return existing.clone();
        }
        let payer = Payer {
            id: self.next_payer,
            name: name.to_owned(),
        };
        self.next_payer = self.next_payer.next();
        self.payers.push(payer.clone());
        self.payers_changed = true;
        payer
    }

    /// Appends a transaction under the next identifier.
    #[inline]
    pub fn insert_transaction(
        &mut self,
        payer: PayerId,
        points: i64,
        timestamp: DateTime<Utc>,
    ) -> Transaction {
        let tx = Transaction {
            id: self.next_transaction,
            payer,
            points,
            timestamp,
        };
        self.next_transaction = self.next_transaction.next();
        self.transactions.push(tx.clone());
        self.transactions_changed = true;
        tx
    }

    /// Applies a spend pass. Changes naming unknown transactions are
    /// ignored.
    #[inline]
    pub fn apply_changes(&mut self, changes: &[TransactionChange]) {
        for &change in changes {
            match change {
                TransactionChange::Reduce { id, points } => {
                    if let Some(tx) = self.transactions.iter_mut().find(|tx| tx.id == id) {
                        tx.points = points;
                    }
                }
                TransactionChange::Retire(id) => self.transactions.retain(|tx| tx.id != id),
            }
        }
        if !changes.is_empty() {
            self.transactions_changed = true;
        }
    }
}
