//! Transaction-id handoff procedures.
//!
//! Engines without a usable built-in transaction identifier (or hosts
//! that allocate transaction rows themselves) pre-allocate an id at
//! transaction start and hand it to every trigger invocation through a
//! transaction-scoped temporary table. The temporary table is created
//! `ON COMMIT DROP`, so the id can never leak into another transaction.

/// Name of the transaction-scoped temporary table.
pub const HANDOFF_TABLE: &str = "_historia_transaction";

/// Name of the procedure that seeds the handoff table.
pub const BEGIN_PROCEDURE: &str = "historia_begin_transaction";

/// Name of the procedure triggers call to discover the id.
pub const CURRENT_ID_PROCEDURE: &str = "historia_current_transaction_id";

/// Generates the shared transaction-id handoff procedures.
///
/// These are created once per database, not per tracked table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionHandoff;

impl TransactionHandoff {
    /// Returns the creation DDL, in execution order.
    #[must_use]
    pub fn create_statements(&self) -> Vec<String> {
        vec![self.begin_procedure_sql(), self.current_id_procedure_sql()]
    }

    /// Returns the teardown DDL, in execution order.
    #[must_use]
    pub fn drop_statements(&self) -> Vec<String> {
        vec![
            format!("DROP FUNCTION IF EXISTS {CURRENT_ID_PROCEDURE}();"),
            format!("DROP FUNCTION IF EXISTS {BEGIN_PROCEDURE}(BIGINT);"),
        ]
    }

    /// Procedure called explicitly at transaction start to pre-allocate
    /// the id for every trigger in the transaction.
    #[must_use]
    pub fn begin_procedure_sql(&self) -> String {
        format!(
            "\
CREATE OR REPLACE FUNCTION {BEGIN_PROCEDURE}(_txid BIGINT) RETURNS VOID AS $$
BEGIN
    CREATE TEMPORARY TABLE IF NOT EXISTS {HANDOFF_TABLE} (id BIGINT NOT NULL) ON COMMIT DROP;
    DELETE FROM {HANDOFF_TABLE};
    INSERT INTO {HANDOFF_TABLE} (id) VALUES (_txid);
END;
$$ LANGUAGE plpgsql;"
        )
    }

    /// Procedure the audit triggers call to discover the pre-allocated
    /// id. Raises a hard error when no id was handed off: proceeding
    /// silently would break the one-transaction-one-id invariant.
    #[must_use]
    pub fn current_id_procedure_sql(&self) -> String {
        format!(
            "\
CREATE OR REPLACE FUNCTION {CURRENT_ID_PROCEDURE}() RETURNS BIGINT AS $$
DECLARE
    _txid BIGINT;
BEGIN
    BEGIN
        SELECT id INTO _txid FROM {HANDOFF_TABLE} LIMIT 1;
    EXCEPTION WHEN undefined_table THEN
        _txid := NULL;
    END;
    IF _txid IS NULL THEN
        RAISE EXCEPTION 'no transaction id pre-allocated; call {BEGIN_PROCEDURE}() at transaction start';
    END IF;
    RETURN _txid;
END;
$$ LANGUAGE plpgsql;"
        )
    }
}
