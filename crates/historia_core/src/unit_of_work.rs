//! Per-connection write tracker and history materialization.
//!
//! One [`UnitOfWork`] exists per connection/session. It records writes as
//! [`Operation`]s, collapses them per identity, and materializes history
//! rows at flush time with all rows of one logical transaction sharing a
//! single transaction ID.
//!
//! The state machine is driven by the host persistence layer's flush
//! lifecycle:
//!
//! ```text
//! Idle -> Collecting -> Committing -> Idle
//!          record_*     before_flush   after_commit / after_rollback
//! ```

use crate::config::{Registry, Strategy, DEFAULT_TABLE_FORMAT};
use crate::error::{CoreError, CoreResult};
use crate::record::{AssociationOp, Identity, Operation, OperationKind};
use crate::store::{VersionRow, VersionStore};
use crate::transaction::{MetaValue, TransactionContext};
use crate::types::TransactionId;
use crate::value::{Row, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle state of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UowState {
    /// No writes recorded since the last reset.
    Idle,
    /// Writes are being recorded.
    Collecting,
    /// Flush lifecycle entered; materialization may run.
    Committing,
}

/// Tracks writes for one connection and materializes history at commit.
///
/// The operation collection is exclusively owned by this instance; the
/// core holds no in-process locks across sessions. Rollback at any point
/// discards everything without side effects, because nothing is written
/// to the store before [`UnitOfWork::materialize`].
pub struct UnitOfWork {
    registry: Arc<Registry>,
    context: TransactionContext,
    operations: BTreeMap<(String, Identity), Operation>,
    associations: Vec<AssociationOp>,
    state: UowState,
}

impl UnitOfWork {
    /// Creates a unit of work over the given registry.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            context: TransactionContext::new(),
            operations: BTreeMap::new(),
            associations: Vec::new(),
            state: UowState::Idle,
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> UowState {
        self.state
    }

    /// Returns the number of pending operation records.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    /// Returns the number of pending association operations.
    #[must_use]
    pub fn association_count(&self) -> usize {
        self.associations.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.associations.is_empty()
    }

    /// Returns the transaction context.
    #[must_use]
    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    /// Attaches a metadata entry to the pending transaction.
    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.context.set_meta(key, value);
    }

    /// Attaches a deferred metadata entry, forced once at flush time.
    pub fn set_meta_lazy(
        &mut self,
        key: impl Into<String>,
        f: impl FnOnce() -> String + Send + 'static,
    ) {
        self.context.set_meta_lazy(key, f);
    }

    /// Records an insert of a tracked entity.
    ///
    /// Writes to unregistered entity names and rows missing primary-key
    /// columns are silently ignored; collaborators may mix tracked and
    /// untracked entities in one unit of work.
    pub fn record_insert(&mut self, entity: &str, row: &Row) {
        self.record(entity, OperationKind::Insert, None, row);
    }

    /// Records an update of a tracked entity.
    ///
    /// `old` carries the pre-write column values used for no-op
    /// detection.
    pub fn record_update(&mut self, entity: &str, old: &Row, new: &Row) {
        self.record(entity, OperationKind::Update, Some(old), new);
    }

    /// Records a delete of a tracked entity.
    ///
    /// `row` carries the column values at deletion time.
    pub fn record_delete(&mut self, entity: &str, row: &Row) {
        self.record(entity, OperationKind::Delete, None, row);
    }

    /// Records an intercepted INSERT against a designated link table.
    pub fn record_association_insert(&mut self, table: &str, row: &Row) {
        self.record_association(table, OperationKind::Insert, row);
    }

    /// Records an intercepted DELETE against a designated link table.
    pub fn record_association_delete(&mut self, table: &str, row: &Row) {
        self.record_association(table, OperationKind::Delete, row);
    }

    /// Records a raw statement executed by the host, capturing link-table
    /// writes.
    ///
    /// Only `INSERT INTO <table>` and `DELETE FROM <table>` statements
    /// against designated link tables produce association history;
    /// everything else is silently ignored.
    pub fn intercept_statement(&mut self, statement: &str, params: &Row) {
        let mut words = statement.split_whitespace();
        let (verb, keyword) = (words.next(), words.next());
        let Some(table) = words.next() else {
            return;
        };
        let kind = match (
            verb.map(str::to_ascii_uppercase).as_deref(),
            keyword.map(str::to_ascii_uppercase).as_deref(),
        ) {
            (Some("INSERT"), Some("INTO")) => OperationKind::Insert,
            (Some("DELETE"), Some("FROM")) => OperationKind::Delete,
            _ => return,
        };
        self.record_association(table, kind, params);
    }

    /// Records an intercepted statement against a designated link table.
    ///
    /// Statements against non-designated tables are silently ignored.
    pub fn record_association(&mut self, table: &str, kind: OperationKind, row: &Row) {
        if !self.registry.is_association_table(table) {
            return;
        }
        // Repeated identical statements within one unit of work collapse
        // to one association history row.
        if self
            .associations
            .iter()
            .any(|a| a.table == table && a.kind == kind && &a.row == row)
        {
            return;
        }
        self.associations.push(AssociationOp {
            table: table.to_string(),
            kind,
            row: row.clone(),
        });
        if self.state == UowState::Idle {
            self.state = UowState::Collecting;
        }
    }

    fn record(&mut self, entity: &str, kind: OperationKind, previous: Option<&Row>, row: &Row) {
        let Some(config) = self.registry.get(entity) else {
            return;
        };
        let Some(incoming) = Operation::capture(config, kind, previous, row) else {
            return;
        };
        let key = (entity.to_string(), incoming.identity.clone());
        match self.operations.get_mut(&key) {
            Some(existing) => {
                if !existing.fold(incoming) {
                    self.operations.remove(&key);
                }
            }
            None => {
                self.operations.insert(key, incoming);
            }
        }
        if self.state == UowState::Idle {
            self.state = UowState::Collecting;
        }
    }

    /// Transitions into the commit phase. Idempotent.
    pub fn enter_commit_phase(&mut self) {
        self.state = UowState::Committing;
    }

    /// Lifecycle hook: the host is about to flush.
    pub fn before_flush(&mut self) {
        self.enter_commit_phase();
    }

    /// Lifecycle hook: the host finished a flush.
    ///
    /// Further writes may still arrive before the commit, so the unit of
    /// work returns to collecting.
    pub fn after_flush(&mut self) {
        if self.state == UowState::Committing {
            self.state = UowState::Collecting;
        }
    }

    /// Lifecycle hook: the host is about to commit.
    pub fn before_commit(&mut self) {
        self.enter_commit_phase();
    }

    /// Lifecycle hook: the host committed.
    pub fn after_commit(&mut self) {
        self.reset();
    }

    /// Lifecycle hook: the host rolled back.
    ///
    /// Discards all operation records and the uncommitted transaction
    /// reference. Always safe: nothing has been materialized yet, and
    /// anything that has is covered by the host transaction's atomicity.
    pub fn after_rollback(&mut self) {
        self.reset();
    }

    /// Clears all pending state and returns to idle.
    pub fn reset(&mut self) {
        self.operations.clear();
        self.associations.clear();
        self.context.reset();
        self.state = UowState::Idle;
    }

    /// Materializes history rows for every surviving operation record.
    ///
    /// Runs in identity order. For each record: suppresses no-ops, lazily
    /// creates the shared transaction, closes the predecessor's open
    /// validity interval, then inserts the new version row. Association
    /// operations follow under the same transaction ID, and transaction
    /// metadata is persisted last — only if at least one row was
    /// produced.
    ///
    /// Returns the transaction ID used, or `None` when every record
    /// collapsed to a no-op.
    ///
    /// # Errors
    ///
    /// Any store error (e.g. a version conflict from a concurrent
    /// committer) is propagated unchanged; the caller must fail and roll
    /// back the host transaction. The core never retries.
    pub fn materialize(&mut self, store: &dyn VersionStore) -> CoreResult<Option<TransactionId>> {
        self.enter_commit_phase();

        let operations = std::mem::take(&mut self.operations);
        let associations = std::mem::take(&mut self.associations);
        let surviving: Vec<Operation> = operations
            .into_values()
            .filter(|op| !op.is_noop())
            .collect();

        if surviving.is_empty() && associations.is_empty() {
            return Ok(None);
        }

        let txid = self.context.get_or_create(store)?;
        tracing::debug!(
            transaction = txid.as_u64(),
            operations = surviving.len(),
            associations = associations.len(),
            "materializing history rows"
        );

        for op in surviving {
            let table = op.config.version_table();
            let kind = self.effective_kind(store, &table, &op)?;
            if op.config.strategy == Strategy::Validity {
                // Close before insert, so a concurrent committer blocks
                // on the row lock instead of deadlocking.
                let closed = store.close_open_interval(&table, &op.identity, txid)?;
                if closed > 1 {
                    return Err(CoreError::invalid_operation(format!(
                        "{closed} open intervals closed for one identity in '{table}'"
                    )));
                }
            }
            let values = build_values(&op, kind);
            tracing::trace!(table = %table, kind = %kind, "inserting version row");
            store.insert_version(
                &table,
                VersionRow {
                    identity: op.identity,
                    transaction_id: txid,
                    end_transaction_id: None,
                    kind,
                    values,
                },
            )?;
        }

        for assoc in associations {
            let table = DEFAULT_TABLE_FORMAT.replace("%s", &assoc.table);
            let identity: Identity = assoc.row.values().cloned().collect();
            store.insert_version(
                &table,
                VersionRow {
                    identity,
                    transaction_id: txid,
                    end_transaction_id: None,
                    kind: assoc.kind,
                    values: assoc.row,
                },
            )?;
        }

        self.context.persist_meta(store, txid)?;
        Ok(Some(txid))
    }

    /// Resolves the operation kind for a delete-then-insert record.
    ///
    /// A re-used identity materializes as UPDATE when prior history
    /// exists and as INSERT when the key has no history at all, so the
    /// first row of any identity's history always reads as a creation.
    fn effective_kind(
        &self,
        store: &dyn VersionStore,
        table: &str,
        op: &Operation,
    ) -> CoreResult<OperationKind> {
        if op.kind == OperationKind::Update
            && op.reused_identity
            && !store.has_versions(table, &op.identity)?
        {
            return Ok(OperationKind::Insert);
        }
        Ok(op.kind)
    }
}

fn build_values(op: &Operation, kind: OperationKind) -> Row {
    let config = &op.config;
    let mut values: Row = if kind == OperationKind::Delete && config.null_delete {
        op.snapshot
            .iter()
            .map(|(column, value)| {
                if config.is_primary_key_column(column) {
                    (column.clone(), value.clone())
                } else {
                    (column.clone(), Value::Null)
                }
            })
            .collect()
    } else {
        op.snapshot.clone()
    };
    if config.track_property_modifications {
        let flags: Vec<(String, Value)> = config
            .tracked_columns()
            .filter(|column| !config.is_primary_key_column(column))
            .map(|column| {
                let changed =
                    kind != OperationKind::Delete && op.modified.contains(column);
                (config.modified_flag_column(column), Value::Bool(changed))
            })
            .collect();
        values.extend(flags);
    }
    values
}
