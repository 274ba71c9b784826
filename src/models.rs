//! Data models for the points ledger.
//!
//! This module contains the stored entities (payers and transactions),
//! newtype ID wrappers, and the request/result types exchanged with the
//! ledger.

mod ids;
mod parse;
mod payer;
mod spend;
mod transaction;

pub use chrono::{DateTime, Utc};
pub use ids::{PayerId, TransactionId};
pub use payer::{Payer, normalize_name};
pub use spend::{SpendEntry, SpendRequest};
pub use transaction::{NewTransaction, Transaction};

/// Current balance of every known payer, keyed by payer name.
pub type Balances = std::collections::BTreeMap<String, i64>;
