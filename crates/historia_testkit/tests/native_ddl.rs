//! Generated DDL for the fixture entities.

use historia_core::Strategy;
use historia_native::{TransactionHandoff, TransactionIdSource, TriggerSet};
use historia_testkit::prelude::*;

#[test]
fn fixture_entities_generate_complete_ddl() {
    for config in [
        article_config(Strategy::Validity),
        tag_config(Strategy::Subquery),
    ] {
        let set = TriggerSet::new(&config);
        let create = set.create_statements();
        assert_eq!(create.len(), 2);
        assert!(create[0].contains(&config.version_table()));
        assert!(create[1].contains(&config.table));

        let drop = set.drop_statements();
        assert!(drop[0].contains(&set.trigger_name()));
        assert!(drop[1].contains(&set.procedure_name()));
    }
}

#[test]
fn excluded_columns_never_reach_the_generated_ddl() {
    let config = article_config(Strategy::Validity);
    for sql in TriggerSet::new(&config).create_statements() {
        assert!(!sql.contains("search_vector"));
    }
}

#[test]
fn preallocated_triggers_pair_with_the_handoff_procedures() {
    let config = article_config(Strategy::Validity);
    let trigger_sql = TriggerSet::new(&config)
        .transaction_id_source(TransactionIdSource::Preallocated)
        .procedure_sql();
    let handoff = TransactionHandoff.create_statements();

    // The trigger calls exactly the procedure the handoff defines.
    assert!(trigger_sql.contains("historia_current_transaction_id()"));
    assert!(handoff
        .iter()
        .any(|sql| sql.contains("FUNCTION historia_current_transaction_id()")));
}
