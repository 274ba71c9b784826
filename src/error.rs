//! Error types for the points ledger.

/// Broad classification of a [`LedgerError`].
///
/// The first three kinds are client faults: retrying the same input
/// against the same ledger state always fails the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required field is missing, has the wrong type, or cannot be parsed.
    MalformedInput,
    /// A well-formed value breaks a domain rule.
    InvalidValue,
    /// The operation would drive a balance below zero.
    WouldViolateInvariant,
    /// The storage backend failed.
    Storage,
}

/// All errors that can occur when operating on the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A field is missing, of the wrong type, or unparsable.
    #[error("malformed {field}: {reason}")]
    Malformed {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A field parsed fine but its value is not allowed.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Which rule the value breaks.
        reason: String,
    },

    /// The payer's balance would go negative.
    #[error("balance of payer {payer:?} would go negative")]
    NegativeBalance {
        /// Name of the payer.
        payer: String,
    },

    /// More points were requested than the ledger holds.
    #[error("cannot spend {requested} points, only {available} available")]
    InsufficientPoints {
        /// Requested spend amount.
        requested: i64,
        /// Total points across all payers.
        available: i64,
    },

    /// Storage backend failed.
    #[error("storage error: {0}")]
    Storage(Box<dyn core::error::Error + Send + Sync>),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Shorthand for a [`LedgerError::Malformed`] error.
    #[inline]
    pub fn malformed<R: Into<String>>(field: &'static str, reason: R) -> Self {
        Self::Malformed {
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`LedgerError::InvalidValue`] error.
    #[inline]
    pub fn invalid<R: Into<String>>(field: &'static str, reason: R) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match *self {
            Self::Malformed { .. } => ErrorKind::MalformedInput,
            Self::InvalidValue { .. } => ErrorKind::InvalidValue,
            Self::NegativeBalance { .. } | Self::InsufficientPoints { .. } => {
                ErrorKind::WouldViolateInvariant
            }
            Self::Storage(_) | Self::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Returns `true` if the caller caused this error.
    #[inline]
    #[must_use]
    pub const fn is_client_fault(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Storage)
    }
}

/// A specialized `Result` type for ledger operations.
pub type Result<T> = core::result::Result<T, LedgerError>;
