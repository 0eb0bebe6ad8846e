//! Version store seam and the in-memory reference implementation.
//!
//! The core never talks to a database directly. The host persistence
//! layer implements [`VersionStore`]; [`MemoryStore`] is the reference
//! implementation backing the test suites.

use crate::error::{CoreError, CoreResult};
use crate::record::{Identity, OperationKind};
use crate::types::TransactionId;
use crate::value::Row;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// One materialized history row.
///
/// Append-only: the only permitted mutation is the one-time setting of
/// `end_transaction_id` by a later, superseding transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRow {
    /// Primary-key tuple of the versioned entity.
    pub identity: Identity,
    /// Transaction that produced this row.
    pub transaction_id: TransactionId,
    /// Transaction that superseded this row (validity strategy only).
    pub end_transaction_id: Option<TransactionId>,
    /// Operation that produced this row.
    pub kind: OperationKind,
    /// Full column snapshot, including modification-flag columns when
    /// the entity tracks property modifications.
    pub values: Row,
}

/// One transaction row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRow {
    /// Transaction ID.
    pub id: TransactionId,
    /// When the transaction row was created.
    pub issued_at: SystemTime,
}

/// One transaction metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMetaRow {
    /// Transaction the metadata belongs to.
    pub transaction_id: TransactionId,
    /// Metadata key.
    pub key: String,
    /// Metadata value.
    pub value: String,
}

/// Persistence seam between the versioning core and the host.
///
/// Implementations must allocate transaction IDs monotonically so that
/// ascending ID order corresponds to commit order, and must reject a
/// second version row for the same (identity, transaction) pair with
/// [`CoreError::VersionConflict`].
pub trait VersionStore {
    /// Inserts a transaction row and returns its freshly allocated ID.
    fn insert_transaction(&self) -> CoreResult<TransactionId>;

    /// Inserts one metadata row for a transaction.
    fn insert_transaction_meta(
        &self,
        transaction_id: TransactionId,
        key: &str,
        value: &str,
    ) -> CoreResult<()>;

    /// Inserts a version row into the named version table.
    fn insert_version(&self, table: &str, row: VersionRow) -> CoreResult<()>;

    /// Closes the open validity interval for an identity, if any.
    ///
    /// Sets `end_transaction_id = end` on rows matching the identity
    /// whose end is currently unset. Returns the number of rows closed
    /// (zero is a logical no-op, not an error).
    fn close_open_interval(
        &self,
        table: &str,
        identity: &Identity,
        end: TransactionId,
    ) -> CoreResult<usize>;

    /// Returns all version rows for an identity in ascending
    /// transaction-id order.
    fn versions(&self, table: &str, identity: &Identity) -> CoreResult<Vec<VersionRow>>;

    /// Returns true if the identity has any version rows.
    fn has_versions(&self, table: &str, identity: &Identity) -> CoreResult<bool> {
        Ok(!self.versions(table, identity)?.is_empty())
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    transactions: BTreeMap<TransactionId, TransactionRow>,
    meta: Vec<TransactionMetaRow>,
    tables: BTreeMap<String, Vec<VersionRow>>,
}

/// In-memory version store.
///
/// Thread-safe; writers serialize on an internal lock and transaction
/// IDs come from an atomic counter, so ID order matches commit order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_txid: AtomicU64,
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all transaction rows in ID order.
    #[must_use]
    pub fn transactions(&self) -> Vec<TransactionRow> {
        self.inner.read().transactions.values().cloned().collect()
    }

    /// Returns the number of transaction rows.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.inner.read().transactions.len()
    }

    /// Returns the metadata rows for a transaction.
    #[must_use]
    pub fn meta_for(&self, transaction_id: TransactionId) -> Vec<TransactionMetaRow> {
        self.inner
            .read()
            .meta
            .iter()
            .filter(|m| m.transaction_id == transaction_id)
            .cloned()
            .collect()
    }

    /// Returns every row of a version table in insertion order.
    #[must_use]
    pub fn table(&self, table: &str) -> Vec<VersionRow> {
        self.inner
            .read()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

impl VersionStore for MemoryStore {
    fn insert_transaction(&self) -> CoreResult<TransactionId> {
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst) + 1);
        let row = TransactionRow {
            id,
            issued_at: SystemTime::now(),
        };
        self.inner.write().transactions.insert(id, row);
        Ok(id)
    }

    fn insert_transaction_meta(
        &self,
        transaction_id: TransactionId,
        key: &str,
        value: &str,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.transactions.contains_key(&transaction_id) {
            return Err(CoreError::TransactionNotFound {
                transaction_id: transaction_id.as_u64(),
            });
        }
        inner.meta.push(TransactionMetaRow {
            transaction_id,
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn insert_version(&self, table: &str, row: VersionRow) -> CoreResult<()> {
        let mut inner = self.inner.write();
        let rows = inner.tables.entry(table.to_string()).or_default();
        // Uniqueness of (identity, transaction) mirrors the version
        // table's composite primary key.
        if rows
            .iter()
            .any(|r| r.identity == row.identity && r.transaction_id == row.transaction_id)
        {
            return Err(CoreError::version_conflict(
                table,
                row.transaction_id.as_u64(),
            ));
        }
        rows.push(row);
        Ok(())
    }

    fn close_open_interval(
        &self,
        table: &str,
        identity: &Identity,
        end: TransactionId,
    ) -> CoreResult<usize> {
        let mut inner = self.inner.write();
        let Some(rows) = inner.tables.get_mut(table) else {
            return Ok(0);
        };
        let mut closed = 0;
        for row in rows
            .iter_mut()
            .filter(|r| &r.identity == identity && r.end_transaction_id.is_none())
        {
            row.end_transaction_id = Some(end);
            closed += 1;
        }
        Ok(closed)
    }

    fn versions(&self, table: &str, identity: &Identity) -> CoreResult<Vec<VersionRow>> {
        let inner = self.inner.read();
        let mut rows: Vec<VersionRow> = inner
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| &r.identity == identity)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|r| r.transaction_id);
        Ok(rows)
    }
}
