//! The ledger engine.
//!
//! [`Ledger`] owns a [`Storage`] backend and implements the three ledger
//! operations on top of it: recording transactions, reporting balances,
//! and spending points oldest-first across payers.
//!
//! # Consistency
//!
//! Every operation runs inside a single storage scope. Writes validate and
//! mutate under one exclusive scope, so two writers never validate against
//! the same stale snapshot, even from different processes sharing a
//! [`crate::storage::FileStorage`] directory. Reads see a snapshot that is
//! never a spend half applied.

use crate::balance::{BalanceScope, balances_by_payer, sum_points};
use crate::error::{LedgerError, Result};
use crate::models::{Balances, NewTransaction, SpendEntry, Transaction};
use crate::spend;
use crate::storage::Storage;

/// Multi-payer point ledger.
///
/// # Example
///
/// ```rust
/// use points_ledger::ledger::Ledger;
/// use points_ledger::models::NewTransaction;
/// use points_ledger::storage::InMemoryStorage;
///
/// let ledger = Ledger::new(InMemoryStorage::new());
/// let tx = NewTransaction::parse("DANNON", "1000", "2020-11-02T14:00:00Z").unwrap();
/// let _recorded = ledger.add_transaction(&tx).unwrap();
///
/// let spent = ledger.spend(500).unwrap();
/// assert_eq!(spent[0].points, -500);
/// assert_eq!(ledger.balances().unwrap()["DANNON"], 500);
/// ```
#[derive(Debug)]
pub struct Ledger<S: Storage> {
    /// Storage backend holding payers and transactions.
    storage: S,
}

impl<S: Storage> Ledger<S> {
    /// Creates a ledger over the given storage backend.
    #[inline]
    #[must_use]
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Returns the underlying storage backend.
    #[inline]
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Records a transaction for the named payer.
    ///
    /// A payer seen for the first time is registered, unless the
    /// transaction is negative: a new payer cannot open below zero.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NegativeBalance`] if the payer's balance
    /// would drop below zero, [`LedgerError::InvalidValue`] if the payer's
    /// balance or the ledger total would overflow, or a storage error.
    /// Nothing is recorded on error, though a newly registered payer is
    /// kept.
    #[tracing::instrument(skip_all, fields(payer = %tx.payer(), points = tx.points()))]
    pub fn add_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        self.storage.write(|state| {
            let payer = match state.find_payer(tx.payer()) {
                Some(existing) => existing.clone(),
                None if tx.points() < 0 => {
                    tracing::warn!("rejecting negative opening transaction for unknown payer");
                    return Err(LedgerError::NegativeBalance {
                        payer: tx.payer().to_owned(),
                    });
                }
                None => {
                    let created = state.get_or_create_payer(tx.payer());
                    tracing::debug!(payer_id = %created.id, "registered payer");
                    created
                }
            };

            let current = sum_points(state.transactions(), BalanceScope::Payer(payer.id))?;
            let balance = current
                .checked_add(tx.points())
                .ok_or_else(|| LedgerError::invalid("points", "balance would overflow"))?;
            if balance < 0 {
                tracing::warn!(current, "rejecting transaction, balance would go negative");
                return Err(LedgerError::NegativeBalance { payer: payer.name });
            }
            let total = sum_points(state.transactions(), BalanceScope::All)?;
            if total.checked_add(tx.points()).is_none() {
                tracing::warn!(total, "rejecting transaction, ledger total would overflow");
                return Err(LedgerError::invalid(
                    "points",
                    "ledger total would overflow",
                ));
            }

            let recorded = state.insert_transaction(payer.id, tx.points(), tx.timestamp());
            tracing::info!(id = %recorded.id, balance, "transaction recorded");
            Ok(recorded)
        })
    }

    /// Returns the balance of every payer ever registered, including
    /// payers whose balance is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    #[tracing::instrument(skip_all)]
    pub fn balances(&self) -> Result<Balances> {
        self.storage
            .read(|state| balances_by_payer(state.payers(), state.transactions()))
    }

    /// Returns the balance of one payer, or `None` if no payer has that
    /// name. The name is trimmed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    #[inline]
    pub fn balance(&self, name: &str) -> Result<Option<i64>> {
        self.storage.read(|state| {
            let Some(payer) = state.find_payer(name.trim()) else {
                return Ok(None);
            };
            sum_points(state.transactions(), BalanceScope::Payer(payer.id)).map(Some)
        })
    }

    /// Returns the total number of spendable points across all payers.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    #[inline]
    pub fn total_points(&self) -> Result<i64> {
        self.storage
            .read(|state| sum_points(state.transactions(), BalanceScope::All))
    }

    /// Returns the live transactions in the order a spend consumes them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails to read.
    #[inline]
    pub fn transactions(&self) -> Result<Vec<Transaction>> {
        self.storage.read(|state| {
            let mut transactions = state.transactions().to_vec();
            transactions.sort_unstable_by_key(Transaction::consumption_key);
            Ok(transactions)
        })
    }

    /// Spends `amount` points, oldest transactions first regardless of
    /// payer, and reports the net change per payer touched.
    ///
    /// Spending zero points succeeds with an empty result. The returned
    /// entries are in the order payers were first touched, but callers
    /// should not rely on it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidValue`] for a negative amount,
    /// [`LedgerError::InsufficientPoints`] if the ledger holds fewer than
    /// `amount` points, [`LedgerError::NegativeBalance`] if the pass would
    /// leave a payer below zero, or a storage error. Nothing is changed on
    /// error.
    #[tracing::instrument(skip_all, fields(amount = amount))]
    pub fn spend(&self, amount: i64) -> Result<Vec<SpendEntry>> {
        if amount < 0 {
            return Err(LedgerError::invalid(
                "points",
                "cannot spend a negative amount",
            ));
        }
        if amount == 0 {
            return Ok(Vec::new());
        }

        self.storage.write(|state| {
            let available = sum_points(state.transactions(), BalanceScope::All)?;
            if amount > available {
                tracing::warn!(available, "rejecting spend, not enough points");
                return Err(LedgerError::InsufficientPoints {
                    requested: amount,
                    available,
                });
            }

            let plan = spend::plan(state.transactions(), amount);
            debug_assert_eq!(plan.unspent, 0, "pre-checked spend left budget unspent");
            tracing::debug!(changes = plan.changes.len(), "planned consumption pass");

            let mut entries = Vec::with_capacity(plan.deltas.len());
            for &(payer_id, delta) in &plan.deltas {
                let name = state
                    .payers()
                    .iter()
                    .find(|p| p.id == payer_id)
                    .map(|p| p.name.clone())
                    .ok_or_else(|| {
                        LedgerError::Storage(
                            format!("transaction references unknown payer {payer_id}").into(),
                        )
                    })?;
                let before = sum_points(state.transactions(), BalanceScope::Payer(payer_id))?;
                if before.saturating_add(delta) < 0 {
                    tracing::warn!(payer = %name, before, delta, "rejecting spend, payer would go negative");
                    return Err(LedgerError::NegativeBalance { payer: name });
                }
                entries.push(SpendEntry {
                    payer: name,
                    points: delta,
                });
            }

            state.apply_changes(&plan.changes);
            tracing::info!(payers = entries.len(), "points spent");
            Ok(entries)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::InMemoryStorage;
    use serde_json::json;

    fn ledger() -> Ledger<InMemoryStorage> {
        Ledger::new(InMemoryStorage::new())
    }

    fn add<S: Storage>(
        ledger: &Ledger<S>,
        payer: &str,
        points: i64,
        timestamp: &str,
    ) -> Result<Transaction> {
        let tx = NewTransaction::from_json(
            &json!({"payer": payer, "points": points, "timestamp": timestamp}),
        )?;
        ledger.add_transaction(&tx)
    }

    fn entry(payer: &str, points: i64) -> SpendEntry {
        SpendEntry {
            payer: payer.to_owned(),
            points,
        }
    }

    fn as_set(entries: Vec<SpendEntry>) -> HashSet<SpendEntry> {
        entries.into_iter().collect()
    }

    fn balances(pairs: &[(&str, i64)]) -> Balances {
        pairs
            .iter()
            .map(|&(name, points)| (name.to_owned(), points))
            .collect()
    }

    /// Loads the five-transaction ledger used by the cross-payer scenarios.
    fn seeded() -> Ledger<InMemoryStorage> {
        let ledger = ledger();
        seed(&ledger);
        ledger
    }

    fn seed<S: Storage>(ledger: &Ledger<S>) {
        let rows = [
            ("DANNON", 1000, "2020-11-02T14:00:00Z"),
            ("UNILEVER", 200, "2020-10-31T11:00:00Z"),
            ("DANNON", -200, "2020-10-31T15:00:00Z"),
            ("MILLER COORS", 10_000, "2020-11-01T14:00:00Z"),
            ("DANNON", 300, "2020-10-31T10:00:00Z"),
        ];
        for (payer, points, timestamp) in rows {
            let _tx = add(ledger, payer, points, timestamp).unwrap();
        }
    }

    #[test]
    fn empty_ledger_has_no_balances() {
        let ledger = ledger();
        assert!(ledger.balances().unwrap().is_empty());
        assert_eq!(ledger.total_points().unwrap(), 0);
    }

    #[test]
    fn single_payer_spends_down_to_zero() {
        let ledger = ledger();
        let _tx = add(&ledger, "dannon", 1000, "2020-11-02T14:00:00Z").unwrap();
        assert_eq!(ledger.balances().unwrap(), balances(&[("dannon", 1000)]));

        assert!(ledger.spend(0).unwrap().is_empty());
        assert_eq!(ledger.balances().unwrap(), balances(&[("dannon", 1000)]));

        assert_eq!(ledger.spend(500).unwrap(), vec![entry("dannon", -500)]);
        assert_eq!(ledger.balances().unwrap(), balances(&[("dannon", 500)]));

        assert_eq!(ledger.spend(500).unwrap(), vec![entry("dannon", -500)]);
        assert_eq!(ledger.balances().unwrap(), balances(&[("dannon", 0)]));
        assert!(ledger.transactions().unwrap().is_empty());
    }

    #[test]
    fn negative_add_beyond_balance_is_rejected() {
        let ledger = ledger();
        let _tx = add(&ledger, "dannon", 1000, "2020-11-02T14:00:00Z").unwrap();

        let err = add(&ledger, "dannon", -2000, "2020-12-03T14:00:00Z").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldViolateInvariant);
        assert_eq!(ledger.balances().unwrap(), balances(&[("dannon", 1000)]));

        let err = add(&ledger, "dannon", 0, "2020-12-03T14:00:00Z").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(ledger.balances().unwrap(), balances(&[("dannon", 1000)]));
    }

    #[test]
    fn negative_add_down_to_zero_is_allowed() {
        let ledger = ledger();
        let _tx = add(&ledger, "dannon", 1000, "2020-11-02T14:00:00Z").unwrap();
        let _tx = add(&ledger, "dannon", -1000, "2020-11-03T14:00:00Z").unwrap();
        assert_eq!(ledger.balance("dannon").unwrap(), Some(0));
    }

    #[test]
    fn new_payer_cannot_open_negative() {
        let ledger = ledger();
        let err = add(&ledger, "toyota", -5, "2020-11-02T14:00:00Z").unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { .. }));
        assert!(ledger.balances().unwrap().is_empty());
        assert!(ledger.storage().find_payer("toyota").unwrap().is_none());
    }

    #[test]
    fn zero_points_fail_before_touching_storage() {
        let ledger = ledger();
        let err = add(&ledger, "toyota", 0, "2020-11-02T14:00:00Z").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidValue { field: "points", .. }));
        assert!(ledger.balances().unwrap().is_empty());
    }

    #[test]
    fn payer_names_are_trimmed() {
        let ledger = ledger();
        let _tx = add(&ledger, "  toyota ", 10, "2020-11-02T14:00:00Z").unwrap();
        let _tx = add(&ledger, "toyota", 5, "2020-11-03T14:00:00Z").unwrap();
        assert_eq!(ledger.balances().unwrap(), balances(&[("toyota", 15)]));
        assert_eq!(ledger.balance(" toyota ").unwrap(), Some(15));
        assert_eq!(ledger.balance("honda").unwrap(), None);
    }

    #[test]
    fn same_payer_accumulates_and_spends_as_one() {
        let ledger = ledger();
        let _tx = add(&ledger, "toyota", 2000, "2021-11-02T14:00:00Z").unwrap();
        let _tx = add(&ledger, "toyota", 2000, "2022-12-02T14:00:00Z").unwrap();
        let _tx = add(&ledger, "toyota", 2000, "2021-11-02T14:00:00Z").unwrap();
        assert_eq!(ledger.balances().unwrap(), balances(&[("toyota", 6000)]));

        assert_eq!(ledger.spend(6000).unwrap(), vec![entry("toyota", -6000)]);
        assert_eq!(ledger.balances().unwrap(), balances(&[("toyota", 0)]));
    }

    #[test]
    fn cross_payer_spend_nets_compensating_entry() {
        let ledger = seeded();
        let before = ledger.total_points().unwrap();

        let spent = ledger.spend(5000).unwrap();
        assert_eq!(
            as_set(spent),
            as_set(vec![
                entry("DANNON", -100),
                entry("UNILEVER", -200),
                entry("MILLER COORS", -4700),
            ])
        );
        assert_eq!(
            ledger.balances().unwrap(),
            balances(&[("DANNON", 1000), ("UNILEVER", 0), ("MILLER COORS", 5300)])
        );
        assert_eq!(ledger.total_points().unwrap(), before - 5000);
    }

    #[test]
    fn follow_up_spend_drains_every_payer() {
        let ledger = seeded();
        let _first = ledger.spend(5000).unwrap();

        let spent = ledger.spend(6300).unwrap();
        assert_eq!(
            as_set(spent),
            as_set(vec![entry("DANNON", -1000), entry("MILLER COORS", -5300)])
        );
        assert_eq!(
            ledger.balances().unwrap(),
            balances(&[("DANNON", 0), ("UNILEVER", 0), ("MILLER COORS", 0)])
        );
    }

    #[test]
    fn overspend_by_one_changes_nothing() {
        let ledger = ledger();
        let err = ledger.spend(2000).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientPoints { available: 0, .. }));

        let _tx = add(&ledger, "toyota", 2000, "2021-11-02T14:00:00Z").unwrap();
        let err = ledger.spend(2001).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientPoints {
                requested: 2001,
                available: 2000,
            }
        ));
        assert_eq!(ledger.balances().unwrap(), balances(&[("toyota", 2000)]));
    }

    #[test]
    fn negative_spend_is_invalid() {
        let ledger = seeded();
        let err = ledger.spend(-1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(ledger.total_points().unwrap(), 11_300);
    }

    #[test]
    fn spend_that_would_strand_a_payer_negative_is_rejected() {
        let ledger = ledger();
        let _tx = add(&ledger, "A", 100, "2020-01-01T00:00:00Z").unwrap();
        let _tx = add(&ledger, "B", 50, "2020-01-02T00:00:00Z").unwrap();
        let _tx = add(&ledger, "A", -100, "2020-01-03T00:00:00Z").unwrap();
        let snapshot = ledger.transactions().unwrap();

        let err = ledger.spend(50).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeBalance { ref payer } if payer == "A"));
        assert_eq!(ledger.transactions().unwrap(), snapshot);
    }

    #[test]
    fn equal_timestamps_spend_in_recording_order() {
        let ledger = ledger();
        let _tx = add(&ledger, "FIRST", 100, "2020-01-01T00:00:00Z").unwrap();
        let _tx = add(&ledger, "SECOND", 100, "2020-01-01T00:00:00Z").unwrap();
        assert_eq!(ledger.spend(100).unwrap(), vec![entry("FIRST", -100)]);
        assert_eq!(
            ledger.balances().unwrap(),
            balances(&[("FIRST", 0), ("SECOND", 100)])
        );
    }

    #[test]
    fn transactions_come_back_in_consumption_order() {
        let ledger = seeded();
        let points: Vec<i64> = ledger
            .transactions()
            .unwrap()
            .iter()
            .map(|tx| tx.points)
            .collect();
        assert_eq!(points, vec![300, 200, -200, 10_000, 1000]);
    }

    #[test]
    fn ledger_total_cannot_overflow() {
        let ledger = ledger();
        let _tx = add(&ledger, "A", i64::MAX, "2020-01-01T00:00:00Z").unwrap();

        let err = add(&ledger, "B", i64::MAX, "2020-01-02T00:00:00Z").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidValue { field: "points", .. }));
        assert_eq!(
            ledger.balances().unwrap(),
            balances(&[("A", i64::MAX), ("B", 0)])
        );
        assert_eq!(ledger.total_points().unwrap(), i64::MAX);

        assert_eq!(ledger.spend(1).unwrap(), vec![entry("A", -1)]);
        let _tx = add(&ledger, "B", 1, "2020-01-03T00:00:00Z").unwrap();
        assert_eq!(ledger.total_points().unwrap(), i64::MAX);
    }

    #[test]
    fn concurrent_spends_never_overdraw() {
        use std::sync::Arc;
        use std::thread;

        let ledger = Arc::new(ledger());
        for day in 1..=20_u32 {
            let _tx = add(&ledger, "DANNON", 10, &format!("2020-01-{day:02}T00:00:00Z")).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    (0..10)
                        .filter(|_| ledger.spend(7).is_ok())
                        .count()
                })
            })
            .collect();

        let succeeded: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        let spent = i64::try_from(succeeded).unwrap() * 7;
        assert_eq!(succeeded, 28);
        assert_eq!(ledger.total_points().unwrap(), 200 - spent);
        assert!(ledger.balance("DANNON").unwrap().unwrap() >= 0);
    }

    #[cfg(feature = "storage-file")]
    mod file_backed {
        use std::path::Path;
        use std::sync::{Arc, Barrier};
        use std::thread;

        use super::*;
        use crate::storage::FileStorage;

        fn open(dir: &Path) -> Ledger<FileStorage> {
            Ledger::new(FileStorage::new(dir.to_path_buf()).unwrap())
        }

        #[test]
        fn cross_payer_spend_survives_reopen() {
            let dir = tempfile::tempdir().unwrap();
            let ledger = open(dir.path());
            seed(&ledger);
            let spent = ledger.spend(5000).unwrap();
            assert_eq!(
                as_set(spent),
                as_set(vec![
                    entry("DANNON", -100),
                    entry("UNILEVER", -200),
                    entry("MILLER COORS", -4700),
                ])
            );
            drop(ledger);

            let reopened = open(dir.path());
            assert_eq!(
                reopened.balances().unwrap(),
                balances(&[("DANNON", 1000), ("UNILEVER", 0), ("MILLER COORS", 5300)])
            );
            let spent = reopened.spend(6300).unwrap();
            assert_eq!(
                as_set(spent),
                as_set(vec![entry("DANNON", -1000), entry("MILLER COORS", -5300)])
            );
            assert_eq!(reopened.total_points().unwrap(), 0);
        }

        #[test]
        fn equal_timestamps_keep_recording_order_across_reopen() {
            let dir = tempfile::tempdir().unwrap();
            let first = add(&open(dir.path()), "FIRST", 100, "2020-01-01T00:00:00Z").unwrap();
            let second = add(&open(dir.path()), "SECOND", 100, "2020-01-01T00:00:00Z").unwrap();
            assert!(second.id > first.id);

            let ledger = open(dir.path());
            assert_eq!(ledger.spend(100).unwrap(), vec![entry("FIRST", -100)]);
            assert_eq!(
                ledger.balances().unwrap(),
                balances(&[("FIRST", 0), ("SECOND", 100)])
            );
        }

        #[test]
        fn handles_on_one_directory_never_double_spend() {
            const HANDLES: usize = 6;

            for _round in 0..20 {
                let dir = tempfile::tempdir().unwrap();
                let _tx = add(&open(dir.path()), "DANNON", 100, "2020-01-01T00:00:00Z").unwrap();

                let barrier = Arc::new(Barrier::new(HANDLES));
                let workers: Vec<_> = (0..HANDLES)
                    .map(|_| {
                        let ledger = open(dir.path());
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            let _leader = barrier.wait();
                            ledger.spend(100).is_ok()
                        })
                    })
                    .collect();
                let succeeded = workers
                    .into_iter()
                    .map(|worker| worker.join().unwrap())
                    .filter(|&ok| ok)
                    .count();

                assert_eq!(succeeded, 1);
                let ledger = open(dir.path());
                assert_eq!(ledger.balance("DANNON").unwrap(), Some(0));
                assert!(ledger.transactions().unwrap().is_empty());
            }
        }

        #[test]
        fn handles_on_one_directory_never_overdraw_a_payer() {
            const HANDLES: usize = 4;

            let dir = tempfile::tempdir().unwrap();
            let _tx = add(&open(dir.path()), "DANNON", 100, "2020-01-01T00:00:00Z").unwrap();

            let barrier = Arc::new(Barrier::new(HANDLES));
            let workers: Vec<_> = (0..HANDLES)
                .map(|_| {
                    let ledger = open(dir.path());
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        let _leader = barrier.wait();
                        add(&ledger, "DANNON", -60, "2020-01-02T00:00:00Z").is_ok()
                    })
                })
                .collect();
            let succeeded = workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .filter(|&ok| ok)
                .count();

            assert_eq!(succeeded, 1);
            assert_eq!(open(dir.path()).balance("DANNON").unwrap(), Some(40));
        }
    }
}
