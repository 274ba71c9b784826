//! Newtype wrappers for entity identifiers.
//!
//! These prevent accidentally mixing up payer and transaction IDs at
//! compile time.

use serde::{Deserialize, Serialize};

/// Macro to define a sequential newtype ID wrapping a `u64`.
macro_rules! define_seq_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// The first identifier handed out by a fresh store.
            pub const FIRST: Self = Self(1);

            /// Creates a new identifier from the given value.
            #[inline]
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the inner value.
            #[inline]
            #[must_use]
            pub const fn into_inner(self) -> u64 {
                self.0
            }

            /// Returns the identifier that follows this one.
            #[inline]
            #[must_use]
            pub const fn next(self) -> Self {
                Self(self.0.saturating_add(1))
            }
        }

        impl core::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $name {
            #[inline]
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

define_seq_id! {
    /// Unique identifier for a payer.
    PayerId
}

define_seq_id! {
    /// Unique identifier for a transaction.
    ///
    /// Identifiers are handed out in creation order, so comparing two
    /// transaction IDs tells which one was recorded first.
    TransactionId
}
