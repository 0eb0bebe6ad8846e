//! Transaction context: lazy transaction creation and metadata.
//!
//! One [`TransactionContext`] lives inside each unit of work. It owns the
//! at-most-once creation of the shared transaction ID and an open
//! key-value metadata bag attached to that transaction. Metadata values
//! may be deferred computations, forced exactly once at flush time.

use crate::error::CoreResult;
use crate::store::VersionStore;
use crate::types::TransactionId;
use std::fmt;

/// A metadata value: eager text or a deferred computation.
pub enum MetaValue {
    /// An already-computed value.
    Text(String),
    /// A computation forced exactly once, at flush time.
    Lazy(Box<dyn FnOnce() -> String + Send>),
}

impl MetaValue {
    /// Wraps a deferred computation.
    pub fn lazy(f: impl FnOnce() -> String + Send + 'static) -> Self {
        Self::Lazy(Box::new(f))
    }

    fn force(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Lazy(f) => f(),
        }
    }
}

impl fmt::Debug for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Owns the shared transaction ID for one logical transaction.
///
/// Creation is lazy and idempotent: the first caller inserts exactly one
/// transaction row; every later call within the same unit of work gets
/// the cached ID. Caching, not a database uniqueness constraint, is what
/// guarantees the at-most-once property in the in-process realization.
#[derive(Debug, Default)]
pub struct TransactionContext {
    current: Option<TransactionId>,
    meta: Vec<(String, MetaValue)>,
}

impl TransactionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transaction ID, creating the transaction row on first
    /// call.
    pub fn get_or_create(&mut self, store: &dyn VersionStore) -> CoreResult<TransactionId> {
        if let Some(id) = self.current {
            return Ok(id);
        }
        let id = store.insert_transaction()?;
        self.current = Some(id);
        Ok(id)
    }

    /// Returns the cached transaction ID, if one was created.
    #[must_use]
    pub fn current(&self) -> Option<TransactionId> {
        self.current
    }

    /// Attaches a metadata entry to the transaction.
    ///
    /// Values are persisted at flush time, and only if the transaction
    /// produced at least one history row.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.meta.push((key.into(), value.into()));
    }

    /// Attaches a deferred metadata entry, forced once at flush time.
    pub fn set_meta_lazy(
        &mut self,
        key: impl Into<String>,
        f: impl FnOnce() -> String + Send + 'static,
    ) {
        self.meta.push((key.into(), MetaValue::lazy(f)));
    }

    /// Returns true if any metadata is attached.
    #[must_use]
    pub fn has_meta(&self) -> bool {
        !self.meta.is_empty()
    }

    /// Persists and drains the metadata bag.
    ///
    /// Deferred values are forced here, exactly once. Called by the unit
    /// of work after at least one history row has been materialized.
    pub(crate) fn persist_meta(
        &mut self,
        store: &dyn VersionStore,
        transaction_id: TransactionId,
    ) -> CoreResult<()> {
        for (key, value) in self.meta.drain(..) {
            store.insert_transaction_meta(transaction_id, &key, &value.force())?;
        }
        Ok(())
    }

    /// Clears the cached ID and any unpersisted metadata.
    pub fn reset(&mut self) {
        self.current = None;
        self.meta.clear();
    }
}
