//! Transaction models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{PayerId, TransactionId, normalize_name, parse};
use crate::error::{LedgerError, Result};

/// A live ledger entry: signed points attributed to one payer at one
/// point in time.
///
/// Positive points are earnings. Negative points are compensating
/// entries that are only ever retired whole by a spend pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier, increasing in creation order.
    pub id: TransactionId,
    /// Owning payer.
    pub payer: PayerId,
    /// Signed point amount.
    pub points: i64,
    /// Caller-supplied point in time.
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Returns `true` for a compensating (negative-points) entry.
    #[inline]
    #[must_use]
    pub const fn is_compensating(&self) -> bool {
        self.points < 0
    }

    /// Key the spend pass consumes transactions by: oldest first, ties
    /// broken by creation order.
    #[inline]
    #[must_use]
    pub const fn consumption_key(&self) -> (DateTime<Utc>, TransactionId) {
        (self.timestamp, self.id)
    }
}

/// A validated request to record a transaction.
///
/// Construction guarantees a non-empty trimmed payer name and non-zero
/// points, so the ledger only has to check balances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Trimmed payer name.
    payer: String,
    /// Non-zero points.
    points: i64,
    /// Point in time of the transaction.
    timestamp: DateTime<Utc>,
}

impl NewTransaction {
    /// Validates already-typed fields.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidValue`] if `points` is zero or the
    /// payer name is blank.
    #[inline]
    pub fn new(payer: &str, points: i64, timestamp: DateTime<Utc>) -> Result<Self> {
        if points == 0 {
            return Err(LedgerError::invalid(
                "points",
                "transaction should have non-zero points",
            ));
        }
        let name = normalize_name(payer)?;
        Ok(Self {
            payer: name.to_owned(),
            points,
            timestamp,
        })
    }

    /// Parses and validates textual fields, as typed on a command line.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Malformed`] if `points` is not an integer or
    /// `timestamp` cannot be parsed, and [`LedgerError::InvalidValue`] for
    /// the rules checked by [`NewTransaction::new`].
    #[inline]
    pub fn parse(payer: &str, points: &str, timestamp: &str) -> Result<Self> {
        let parsed_points = parse::integer_str("points", points)?;
        let parsed_timestamp = parse::timestamp("timestamp", timestamp)?;
        Self::new(payer, parsed_points, parsed_timestamp)
    }

    /// Parses a request body of the form
    /// `{"payer": "...", "points": 300, "timestamp": "2020-10-31T10:00:00Z"}`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Malformed`] for missing keys or values of the
    /// wrong type, and [`LedgerError::InvalidValue`] for the rules checked
    /// by [`NewTransaction::new`].
    #[inline]
    pub fn from_json(body: &Value) -> Result<Self> {
        let fields = parse::object(body)?;
        let payer = parse::string("payer", parse::required(fields, "payer")?)?;
        let points = parse::integer("points", parse::required(fields, "points")?)?;
        let raw_timestamp = parse::string("timestamp", parse::required(fields, "timestamp")?)?;
        let timestamp = parse::timestamp("timestamp", raw_timestamp)?;
        Self::new(payer, points, timestamp)
    }

    /// Returns the trimmed payer name.
    #[inline]
    #[must_use]
    pub fn payer(&self) -> &str {
        &self.payer
    }

    /// Returns the signed, non-zero points.
    #[inline]
    #[must_use]
    pub const fn points(&self) -> i64 {
        self.points
    }

    /// Returns the timestamp.
    #[inline]
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
