//! Core type definitions for Historia.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a logical transaction.
///
/// Transaction IDs are monotonically increasing and never reused. Every
/// history row produced by writes that commit together carries the same
/// transaction ID, and ascending ID order corresponds to commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}
