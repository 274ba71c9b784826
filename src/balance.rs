//! Balance aggregation over a snapshot of live transactions.
//!
//! Everything here is a pure function of the slice it is given. The
//! ledger calls it both to validate writes and to report balances.

use crate::error::{LedgerError, Result};
use crate::models::{Balances, Payer, PayerId, Transaction};

/// Which transactions a sum covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceScope {
    /// Every live transaction.
    All,
    /// Transactions owned by one payer.
    Payer(PayerId),
}

impl BalanceScope {
    /// Returns `true` if the transaction falls within this scope.
    #[inline]
    #[must_use]
    pub fn contains(self, tx: &Transaction) -> bool {
        match self {
            Self::All => true,
            Self::Payer(id) => tx.payer == id,
        }
    }
}

/// Sums the points of every transaction in `scope`. Returns 0 when
/// nothing matches.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidValue`] if the sum does not fit in an
/// `i64`.
#[inline]
pub fn sum_points(transactions: &[Transaction], scope: BalanceScope) -> Result<i64> {
    let total: i128 = transactions
        .iter()
        .filter(|tx| scope.contains(tx))
        .map(|tx| i128::from(tx.points))
        .sum();
    i64::try_from(total)
        .map_err(|err| LedgerError::invalid("points", format!("point total out of range ({err})")))
}

/// Computes the balance of every payer, including payers with no live
/// transactions.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidValue`] if a payer's balance does not fit
/// in an `i64`.
#[inline]
pub fn balances_by_payer(payers: &[Payer], transactions: &[Transaction]) -> Result<Balances> {
    payers
        .iter()
        .map(|payer| {
            let balance = sum_points(transactions, BalanceScope::Payer(payer.id))?;
            Ok((payer.name.clone(), balance))
        })
        .collect()
}
