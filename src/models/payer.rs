//! Payer model.

use serde::{Deserialize, Serialize};

use super::PayerId;
use crate::error::{LedgerError, Result};

/// An entity that contributes points to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    /// Unique identifier.
    pub id: PayerId,
    /// Unique display name, already trimmed.
    pub name: String,
}

/// Trims a payer name and rejects names that are empty afterwards.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidValue`] if nothing but whitespace remains.
#[inline]
pub fn normalize_name(raw: &str) -> Result<&str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(LedgerError::invalid(
            "payer",
            "should have at least one non-whitespace character",
        ));
    }
    Ok(name)
}
