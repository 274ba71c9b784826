//! The consumption pass behind [`crate::ledger::Ledger::spend`].
//!
//! Planning is pure: it reads a snapshot of live transactions and
//! returns the changes to apply plus the per-payer deltas to report.
//! The ledger validates the plan before anything reaches storage.

use crate::models::{PayerId, Transaction};
use crate::storage::TransactionChange;

/// Outcome of a consumption pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct SpendPlan {
    /// Reductions and retirements, in consumption order.
    pub(crate) changes: Vec<TransactionChange>,
    /// Net balance change per touched payer, in first-touch order.
    pub(crate) deltas: Vec<(PayerId, i64)>,
    /// Budget left when the walk ended. Zero whenever the pre-check on the
    /// total balance passed.
    pub(crate) unspent: i64,
}

impl SpendPlan {
    /// Folds a balance change into the payer's running delta.
    fn record(&mut self, payer: PayerId, change: i64) {
        match self.deltas.iter_mut().find(|entry| entry.0 == payer) {
            Some(entry) => entry.1 = entry.1.saturating_add(change),
            None => self.deltas.push((payer, change)),
        }
    }
}

/// Walks live transactions oldest first and draws `amount` points.
///
/// Earning entries are drawn down and retired once empty. Compensating
/// entries met along the way are retired whole and hand their magnitude
/// back to the budget, since it was never part of the spendable pool.
/// The walk stops as soon as the budget reaches zero.
pub(crate) fn plan(transactions: &[Transaction], amount: i64) -> SpendPlan {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_unstable_by_key(|tx| tx.consumption_key());

    let mut result = SpendPlan::default();
    let mut remaining = amount;

    for tx in ordered {
        if remaining == 0 {
            break;
        }
        let consumed = if tx.is_compensating() {
            result.changes.push(TransactionChange::Retire(tx.id));
            tx.points
        } else {
            let take = remaining.min(tx.points);
            if take == tx.points {
                result.changes.push(TransactionChange::Retire(tx.id));
            } else {
                result.changes.push(TransactionChange::Reduce {
                    id: tx.id,
                    points: tx.points - take,
                });
            }
            take
        };
        remaining = remaining.saturating_sub(consumed);
        result.record(tx.payer, consumed.saturating_neg());
    }

    result.unspent = remaining;
    result
}
