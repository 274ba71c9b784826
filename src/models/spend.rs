//! Spend request and result models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::parse;
use crate::error::Result;

/// A parsed request to spend points, of the form `{"points": 5000}`.
///
/// The amount is only checked for being an integer here; the ledger
/// rejects negative amounts itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendRequest {
    /// Requested amount.
    amount: i64,
}

impl SpendRequest {
    /// Wraps an already-typed amount.
    #[inline]
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self { amount }
    }

    /// Parses an amount typed as text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LedgerError::Malformed`] if `raw` is not an
    /// integer.
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        let amount = parse::integer_str("points", raw)?;
        Ok(Self { amount })
    }

    /// Parses a request body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::LedgerError::Malformed`] if the body is not
    /// an object, lacks `points`, or `points` is not an integer.
    #[inline]
    pub fn from_json(body: &Value) -> Result<Self> {
        let fields = parse::object(body)?;
        let amount = parse::integer("points", parse::required(fields, "points")?)?;
        Ok(Self { amount })
    }

    /// Returns the requested amount.
    #[inline]
    #[must_use]
    pub const fn amount(self) -> i64 {
        self.amount
    }
}

/// Net change applied to one payer by a spend.
///
/// `points` is negative for points drawn from the payer. Retiring a
/// compensating entry moves it back towards zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpendEntry {
    /// Payer name.
    pub payer: String,
    /// Signed change in the payer's balance.
    pub points: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use serde_json::json;

    #[test]
    fn from_json_reads_points() {
        let request = SpendRequest::from_json(&json!({"points": 5000})).unwrap();
        assert_eq!(request.amount(), 5000);
    }

    #[test]
    fn from_json_keeps_negative_amounts() {
        let request = SpendRequest::from_json(&json!({"points": "-5"})).unwrap();
        assert_eq!(request.amount(), -5);
    }

    #[test]
    fn parse_reads_text() {
        assert_eq!(SpendRequest::parse(" 250 ").unwrap().amount(), 250);
        assert!(SpendRequest::parse("lots").is_err());
    }

    #[test]
    fn from_json_requires_points() {
        let err = SpendRequest::from_json(&json!({"amount": 5})).unwrap_err();
        assert!(matches!(err, LedgerError::Malformed { field: "points", .. }));
    }

    #[test]
    fn entry_serializes_as_payer_and_points() {
        let entry = SpendEntry {
            payer: "DANNON".to_owned(),
            points: -100,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, json!({"payer": "DANNON", "points": -100}));
    }
}
