//! Per-table audit procedure and trigger generation.
//!
//! The generated procedure runs after every insert, update and delete on
//! the tracked table and reproduces the in-process collapsing rules at
//! statement level:
//!
//! - unchanged updates return early (row-difference test over tracked
//!   columns only);
//! - the history upsert is a conditional UPDATE followed by an INSERT
//!   only `IF NOT FOUND`, so repeated trigger invocations within one
//!   transaction never create duplicate rows;
//! - a delete that finds an insert row from the same transaction removes
//!   it instead, so an entity that never became durably visible leaves
//!   no history;
//! - under the validity strategy the predecessor's open interval is
//!   closed before the new row lands, serialized by row-level locking.

use crate::handoff::CURRENT_ID_PROCEDURE;
use historia_core::{EntityConfig, OperationKind, Strategy};

/// Where the generated procedure obtains its transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionIdSource {
    /// The engine's own identifier (`txid_current()`). Preferred:
    /// only the engine can guarantee id order matches commit order
    /// under concurrent commits.
    #[default]
    Native,
    /// An id pre-allocated into the transaction-scoped handoff table
    /// by an explicit call at transaction start. The procedure raises
    /// a hard error when the id is absent.
    Preallocated,
}

/// Modification-flag expression used in generated value lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagExpr {
    True,
    False,
    Diff,
}

/// Generates the audit procedure and trigger DDL for one tracked table.
#[derive(Debug, Clone)]
pub struct TriggerSet {
    config: EntityConfig,
    source: TransactionIdSource,
}

impl TriggerSet {
    /// Creates a generator for an entity configuration.
    #[must_use]
    pub fn new(config: &EntityConfig) -> Self {
        Self {
            config: config.clone(),
            source: TransactionIdSource::default(),
        }
    }

    /// Sets the transaction-id source.
    #[must_use]
    pub fn transaction_id_source(mut self, source: TransactionIdSource) -> Self {
        self.source = source;
        self
    }

    /// Name of the generated audit procedure.
    #[must_use]
    pub fn procedure_name(&self) -> String {
        format!("{}_audit", self.config.table)
    }

    /// Name of the generated trigger.
    #[must_use]
    pub fn trigger_name(&self) -> String {
        format!("{}_trigger", self.config.table)
    }

    /// Returns the creation DDL, in execution order.
    #[must_use]
    pub fn create_statements(&self) -> Vec<String> {
        tracing::debug!(table = %self.config.table, "generating audit trigger DDL");
        vec![self.procedure_sql(), self.trigger_sql()]
    }

    /// Returns the teardown DDL, in execution order.
    #[must_use]
    pub fn drop_statements(&self) -> Vec<String> {
        vec![
            format!(
                "DROP TRIGGER IF EXISTS {} ON {};",
                self.trigger_name(),
                self.config.table
            ),
            format!("DROP FUNCTION IF EXISTS {}();", self.procedure_name()),
        ]
    }

    /// The trigger definition invoking the audit procedure.
    #[must_use]
    pub fn trigger_sql(&self) -> String {
        format!(
            "\
CREATE TRIGGER {trigger}
    AFTER INSERT OR UPDATE OR DELETE ON {table}
    FOR EACH ROW EXECUTE PROCEDURE {procedure}();",
            trigger = self.trigger_name(),
            table = self.config.table,
            procedure = self.procedure_name(),
        )
    }

    /// The audit procedure body.
    #[must_use]
    pub fn procedure_sql(&self) -> String {
        format!(
            "\
CREATE OR REPLACE FUNCTION {procedure}() RETURNS TRIGGER AS $$
DECLARE
    _txid BIGINT;
BEGIN
    _txid := {txid_expr};
    IF (TG_OP = 'INSERT') THEN
{insert_branch}
    ELSIF (TG_OP = 'UPDATE') THEN
{update_branch}
    ELSIF (TG_OP = 'DELETE') THEN
{delete_branch}
    END IF;
    RETURN NULL;
END;
$$ LANGUAGE plpgsql;",
            procedure = self.procedure_name(),
            txid_expr = self.txid_expression(),
            insert_branch = self.insert_branch(),
            update_branch = self.update_branch(),
            delete_branch = self.delete_branch(),
        )
    }

    fn txid_expression(&self) -> String {
        match self.source {
            TransactionIdSource::Native => "txid_current()".to_string(),
            TransactionIdSource::Preallocated => format!("{CURRENT_ID_PROCEDURE}()"),
        }
    }

    fn tracked(&self) -> Vec<&str> {
        self.config.tracked_columns().collect()
    }

    fn non_key(&self) -> Vec<&str> {
        self.tracked()
            .into_iter()
            .filter(|c| !self.config.is_primary_key_column(c))
            .collect()
    }

    /// `id = NEW.id AND tenant = NEW.tenant`
    fn key_match(&self, record: &str) -> String {
        self.config
            .primary_key
            .iter()
            .map(|pk| format!("{pk} = {record}.{pk}"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Row-difference test over tracked columns only.
    fn noop_guard(&self) -> String {
        let new_row = self
            .tracked()
            .iter()
            .map(|c| format!("NEW.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let old_row = self
            .tracked()
            .iter()
            .map(|c| format!("OLD.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("ROW({new_row}) IS NOT DISTINCT FROM ROW({old_row})")
    }

    /// Closes the predecessor's open interval. Rows written by this
    /// transaction keep their open interval.
    fn close_interval(&self, record: &str) -> Option<String> {
        if self.config.strategy != Strategy::Validity {
            return None;
        }
        Some(format!(
            "\
        UPDATE {table}
            SET {end_col} = _txid
            WHERE {key} AND {end_col} IS NULL AND {txn_col} <> _txid;",
            table = self.config.version_table(),
            end_col = self.config.end_transaction_column,
            key = self.key_match(record),
            txn_col = self.config.transaction_column,
        ))
    }

    /// Column list for the history INSERT.
    fn insert_columns(&self) -> String {
        let mut columns: Vec<String> = self.tracked().iter().map(ToString::to_string).collect();
        columns.push(self.config.transaction_column.clone());
        if self.config.strategy == Strategy::Validity {
            columns.push(self.config.end_transaction_column.clone());
        }
        columns.push(self.config.operation_type_column.clone());
        if self.config.track_property_modifications {
            for column in self.non_key() {
                columns.push(self.config.modified_flag_column(column));
            }
        }
        columns.join(", ")
    }

    /// Value list matching [`Self::insert_columns`].
    fn insert_values(&self, record: &str, kind: OperationKind, flags: FlagExpr) -> String {
        let null_out = kind == OperationKind::Delete && self.config.null_delete;
        let mut values: Vec<String> = self
            .tracked()
            .iter()
            .map(|c| {
                if null_out && !self.config.is_primary_key_column(c) {
                    "NULL".to_string()
                } else {
                    format!("{record}.{c}")
                }
            })
            .collect();
        values.push("_txid".to_string());
        if self.config.strategy == Strategy::Validity {
            values.push("NULL".to_string());
        }
        values.push(kind.as_i16().to_string());
        if self.config.track_property_modifications {
            for column in self.non_key() {
                values.push(match flags {
                    FlagExpr::True => "true".to_string(),
                    FlagExpr::False => "false".to_string(),
                    FlagExpr::Diff => format!("(NEW.{column} IS DISTINCT FROM OLD.{column})"),
                });
            }
        }
        values.join(", ")
    }

    fn insert_branch(&self) -> String {
        let table = self.config.version_table();
        let op_col = &self.config.operation_type_column;
        let txn_col = &self.config.transaction_column;
        let key = self.key_match("NEW");
        let prior_history = self
            .config
            .primary_key
            .iter()
            .map(|pk| format!("v.{pk} = NEW.{pk}"))
            .collect::<Vec<_>>()
            .join(" AND ");

        // A row already present for this transaction can only be a
        // delete: re-using the key makes this an update, unless the key
        // has no history at all, in which case it stays an insert.
        let mut set_list: Vec<String> = self
            .non_key()
            .iter()
            .map(|c| format!("{c} = NEW.{c}"))
            .collect();
        set_list.push(format!(
            "{op_col} = CASE
                WHEN {op_col} = {delete} AND EXISTS (SELECT 1 FROM {table} v WHERE {prior_history} AND v.{txn_col} <> _txid) THEN {update}
                WHEN {op_col} = {delete} THEN {insert}
                ELSE {op_col}
            END",
            delete = OperationKind::Delete.as_i16(),
            update = OperationKind::Update.as_i16(),
            insert = OperationKind::Insert.as_i16(),
        ));
        if self.config.track_property_modifications {
            for column in self.non_key() {
                set_list.push(format!(
                    "{} = true",
                    self.config.modified_flag_column(column)
                ));
            }
        }

        let mut lines = Vec::new();
        if let Some(close) = self.close_interval("NEW") {
            lines.push(close);
        }
        lines.push(format!(
            "\
        UPDATE {table}
            SET {set_list}
            WHERE {key} AND {txn_col} = _txid;
        IF NOT FOUND THEN
            INSERT INTO {table} ({columns})
                VALUES ({values});
        END IF;
        RETURN NEW;",
            set_list = set_list.join(", "),
            columns = self.insert_columns(),
            values = self.insert_values("NEW", OperationKind::Insert, FlagExpr::True),
        ));
        lines.join("\n")
    }

    fn update_branch(&self) -> String {
        let table = self.config.version_table();
        let txn_col = &self.config.transaction_column;
        let key = self.key_match("NEW");

        // An existing same-transaction row keeps its classification:
        // insert followed by update remains an insert.
        let mut set_list: Vec<String> = self
            .non_key()
            .iter()
            .map(|c| format!("{c} = NEW.{c}"))
            .collect();
        if self.config.track_property_modifications {
            for column in self.non_key() {
                let flag = self.config.modified_flag_column(column);
                set_list.push(format!(
                    "{flag} = {flag} OR (NEW.{column} IS DISTINCT FROM OLD.{column})"
                ));
            }
        }

        let mut lines = vec![format!(
            "\
        IF ({guard}) THEN
            RETURN NEW;
        END IF;",
            guard = self.noop_guard(),
        )];
        if let Some(close) = self.close_interval("NEW") {
            lines.push(close);
        }
        lines.push(format!(
            "\
        UPDATE {table}
            SET {set_list}
            WHERE {key} AND {txn_col} = _txid;
        IF NOT FOUND THEN
            INSERT INTO {table} ({columns})
                VALUES ({values});
        END IF;
        RETURN NEW;",
            set_list = set_list.join(", "),
            columns = self.insert_columns(),
            values = self.insert_values("NEW", OperationKind::Update, FlagExpr::Diff),
        ));
        lines.join("\n")
    }

    fn delete_branch(&self) -> String {
        let table = self.config.version_table();
        let op_col = &self.config.operation_type_column;
        let txn_col = &self.config.transaction_column;
        let key = self.key_match("OLD");

        let mut set_list: Vec<String> = self
            .non_key()
            .iter()
            .map(|c| {
                if self.config.null_delete {
                    format!("{c} = NULL")
                } else {
                    format!("{c} = OLD.{c}")
                }
            })
            .collect();
        set_list.push(format!("{op_col} = {}", OperationKind::Delete.as_i16()));
        if self.config.track_property_modifications {
            for column in self.non_key() {
                set_list.push(format!(
                    "{} = false",
                    self.config.modified_flag_column(column)
                ));
            }
        }

        let mut lines = vec![format!(
            "\
        DELETE FROM {table}
            WHERE {key} AND {txn_col} = _txid AND {op_col} = {insert};
        IF FOUND THEN
            RETURN OLD;
        END IF;",
            insert = OperationKind::Insert.as_i16(),
        )];
        if let Some(close) = self.close_interval("OLD") {
            lines.push(close);
        }
        lines.push(format!(
            "\
        UPDATE {table}
            SET {set_list}
            WHERE {key} AND {txn_col} = _txid;
        IF NOT FOUND THEN
            INSERT INTO {table} ({columns})
                VALUES ({values});
        END IF;
        RETURN OLD;",
            set_list = set_list.join(", "),
            columns = self.insert_columns(),
            values = self.insert_values("OLD", OperationKind::Delete, FlagExpr::False),
        ));
        lines.join("\n")
    }
}
