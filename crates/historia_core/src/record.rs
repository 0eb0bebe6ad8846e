//! Operation records and the per-identity collapsing rules.
//!
//! A unit of work holds at most one [`Operation`] per entity identity.
//! When a second write arrives for the same identity, the existing record
//! is replaced or upgraded by [`Operation::fold`] rather than appended:
//!
//! - insert + update  -> insert (snapshot refreshed)
//! - insert + delete  -> dropped (the entity never became durably visible)
//! - update + update  -> update (final snapshot kept)
//! - update + delete  -> delete
//! - delete + insert  -> update (a new generation occupies the identity)

use crate::config::EntityConfig;
use crate::value::{Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Primary-key tuple identifying one entity, in configured column order.
pub type Identity = Vec<Value>;

/// Kind of write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Entity was created.
    Insert,
    /// Entity was modified.
    Update,
    /// Entity was removed.
    Delete,
}

impl OperationKind {
    /// Integer encoding stored in the operation-type column.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::Insert => 0,
            Self::Update => 1,
            Self::Delete => 2,
        }
    }

    /// Decodes the operation-type column value.
    #[must_use]
    pub const fn from_i16(v: i16) -> Option<Self> {
        match v {
            0 => Some(Self::Insert),
            1 => Some(Self::Update),
            2 => Some(Self::Delete),
            _ => None,
        }
    }

    /// Returns the lowercase name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One pending write to one entity identity.
///
/// Snapshots are filtered to tracked columns at capture time; excluded
/// columns never enter a record and never participate in comparisons.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Configuration of the entity this operation belongs to.
    pub config: Arc<EntityConfig>,
    /// Primary-key tuple.
    pub identity: Identity,
    /// Operation kind after collapsing.
    pub kind: OperationKind,
    /// Captured column values at the latest write.
    pub snapshot: Row,
    /// Pre-write column values, used for no-op detection. `None` for
    /// records that began as inserts.
    pub previous: Option<Row>,
    /// Tracked columns changed by the merged writes.
    pub modified: BTreeSet<String>,
    /// True if this record is a delete-then-insert on a re-used key.
    pub reused_identity: bool,
}

impl Operation {
    /// Captures a write as an operation record.
    ///
    /// Returns `None` if the row does not contain every primary-key
    /// column (a malformed identity, silently ignored per contract).
    pub fn capture(
        config: Arc<EntityConfig>,
        kind: OperationKind,
        previous: Option<&Row>,
        row: &Row,
    ) -> Option<Self> {
        let identity = extract_identity(&config, row)?;
        let snapshot = filter_tracked(&config, row);
        let previous = previous.map(|p| filter_tracked(&config, p));
        let modified = match kind {
            OperationKind::Insert => snapshot.keys().cloned().collect(),
            OperationKind::Update => changed_columns(previous.as_ref(), &snapshot),
            OperationKind::Delete => BTreeSet::new(),
        };
        Some(Self {
            config,
            identity,
            kind,
            snapshot,
            previous,
            modified,
            reused_identity: false,
        })
    }

    /// Folds a later write into this record per the collapsing table.
    ///
    /// Returns `false` if the record collapses to nothing and must be
    /// removed from the unit of work (insert followed by delete).
    #[must_use]
    pub fn fold(&mut self, incoming: Self) -> bool {
        use OperationKind::{Delete, Insert, Update};
        match (self.kind, incoming.kind) {
            // The entity never became durably visible.
            (Insert, Delete) => false,
            (Insert, Insert | Update) => {
                self.snapshot = incoming.snapshot;
                self.modified.extend(incoming.modified);
                true
            }
            (Update, Insert | Update) => {
                self.snapshot = incoming.snapshot;
                self.modified.extend(incoming.modified);
                true
            }
            (Update, Delete) => {
                self.kind = Delete;
                self.snapshot = incoming.snapshot;
                true
            }
            // Re-used primary key: a new generation occupies the identity.
            (Delete, Insert) => {
                self.kind = Update;
                self.snapshot = incoming.snapshot;
                self.modified.extend(incoming.modified);
                self.reused_identity = true;
                true
            }
            // Writes against an already-deleted identity carry no new state.
            (Delete, Update | Delete) => true,
        }
    }

    /// Returns true if the record would produce no change.
    ///
    /// An update whose snapshot equals the pre-write values on every
    /// tracked column is suppressed at materialize time.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        if self.kind != OperationKind::Update || self.reused_identity {
            return false;
        }
        match &self.previous {
            Some(previous) => previous == &self.snapshot,
            None => false,
        }
    }
}

/// A pending insert or delete on a many-to-many link table.
///
/// Association operations are captured from intercepted raw statements;
/// the link table itself is not a tracked entity.
#[derive(Debug, Clone)]
pub struct AssociationOp {
    /// Link table name.
    pub table: String,
    /// Operation kind; only inserts and deletes occur on link tables.
    pub kind: OperationKind,
    /// Full row of the link table statement.
    pub row: Row,
}

fn extract_identity(config: &EntityConfig, row: &Row) -> Option<Identity> {
    config
        .primary_key
        .iter()
        .map(|pk| row.get(pk).cloned())
        .collect()
}

fn filter_tracked(config: &EntityConfig, row: &Row) -> Row {
    row.iter()
        .filter(|(column, _)| config.is_tracked_column(column))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}

fn changed_columns(previous: Option<&Row>, snapshot: &Row) -> BTreeSet<String> {
    match previous {
        Some(previous) => snapshot
            .iter()
            .filter(|(column, value)| previous.get(column.as_str()) != Some(*value))
            .map(|(column, _)| column.clone())
            .collect(),
        None => snapshot.keys().cloned().collect(),
    }
}
