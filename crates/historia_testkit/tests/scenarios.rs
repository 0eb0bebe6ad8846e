//! End-to-end versioning scenarios driven through the flush lifecycle.

use historia_core::{EntityConfig, MemoryStore, OperationKind, Registry, Row, UnitOfWork, Value};
use historia_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn simple_update_produces_two_versions() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "x");
    let first = harness.commit().unwrap().unwrap();

    harness.update_article(1, "x", "y");
    let second = harness.commit().unwrap().unwrap();

    let versions = harness.article_versions(1);
    assert_eq!(versions.len(), 2);

    assert_eq!(versions[0].kind, OperationKind::Insert);
    assert_eq!(versions[0].transaction_id, first);
    assert_eq!(versions[0].values.get("name"), Some(&Value::from("x")));

    assert_eq!(versions[1].kind, OperationKind::Update);
    assert_eq!(versions[1].transaction_id, second);
    assert_eq!(versions[1].values.get("name"), Some(&Value::from("y")));

    // The first interval is closed by the second transaction.
    assert_eq!(versions[0].end_transaction_id, Some(second));
    assert_eq!(versions[1].end_transaction_id, None);
}

#[test]
fn delete_version_nulls_non_key_columns() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "x");
    harness.commit().unwrap();
    harness.delete_article(1, "x");
    harness.commit().unwrap();

    let versions = harness.article_versions(1);
    assert_eq!(versions.len(), 2);

    let deleted = &versions[1];
    assert_eq!(deleted.kind, OperationKind::Delete);
    assert_eq!(deleted.values.get("id"), Some(&Value::Integer(1)));
    assert_eq!(deleted.values.get("name"), Some(&Value::Null));
    assert_eq!(deleted.values.get("content"), Some(&Value::Null));
}

#[test]
fn insert_and_delete_in_one_transaction_leave_nothing() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "ephemeral");
    harness.delete_article(1, "ephemeral");
    let txid = harness.commit().unwrap();

    assert!(txid.is_none());
    assert!(harness.article_versions(1).is_empty());
    assert_eq!(harness.store.transaction_count(), 0);
}

#[test]
fn changes_committed_together_share_one_transaction() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "a");
    harness.insert_article(2, "b");
    harness
        .uow
        .record_insert("tag", &Row::from([
            ("id".to_string(), Value::Integer(10)),
            ("name".to_string(), Value::from("rust")),
        ]));
    let txid = harness.commit().unwrap().unwrap();

    assert_eq!(harness.store.transaction_count(), 1);
    for row in harness
        .store
        .table("article_version")
        .iter()
        .chain(harness.store.table("tag_version").iter())
    {
        assert_eq!(row.transaction_id, txid);
    }
}

#[test]
fn association_history_shares_the_transaction() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "a");
    let link = link_row(1, 7);
    harness.uow.record_association_insert(ARTICLE_TAG_TABLE, &link);
    let txid = harness.commit().unwrap().unwrap();

    let rows = harness.store.table("article_tag_version");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, OperationKind::Insert);
    assert_eq!(rows[0].transaction_id, txid);
    assert_eq!(rows[0].values.get("tag_id"), Some(&Value::Integer(7)));
}

#[test]
fn delete_then_insert_with_prior_history_is_an_update() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "first generation");
    let first = harness.commit().unwrap().unwrap();

    harness.delete_article(1, "first generation");
    harness.insert_article(1, "second generation");
    let second = harness.commit().unwrap().unwrap();

    let versions = harness.article_versions(1);
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[1].kind, OperationKind::Update);
    assert_eq!(
        versions[1].values.get("name"),
        Some(&Value::from("second generation"))
    );
    // The first generation's interval hands over to the second.
    assert_eq!(versions[0].transaction_id, first);
    assert_eq!(versions[0].end_transaction_id, Some(second));
}

#[test]
fn delete_then_insert_without_history_is_an_insert() {
    let mut harness = VersioningHarness::new();

    // A pre-assigned key on a brand-new entity: delete arrives first,
    // insert re-uses the key, and no history exists at all.
    harness.delete_article(1, "ghost");
    harness.insert_article(1, "fresh");
    harness.commit().unwrap().unwrap();

    let versions = harness.article_versions(1);
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].kind, OperationKind::Insert);
    assert_eq!(versions[0].end_transaction_id, None);
}

#[test]
fn noop_update_commit_creates_no_transaction() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "same");
    harness.commit().unwrap();

    harness.update_article(1, "same", "same");
    let txid = harness.commit().unwrap();

    assert!(txid.is_none());
    assert_eq!(harness.article_versions(1).len(), 1);
    assert_eq!(harness.store.transaction_count(), 1);
}

#[test]
fn metadata_rides_along_with_the_commit() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "x");
    harness.uow.set_meta("user", "alice");
    harness
        .uow
        .set_meta("request", meta_json(&[("path", "/articles"), ("verb", "POST")]));
    let txid = harness.commit().unwrap().unwrap();

    let meta = harness.store.meta_for(txid);
    assert_eq!(meta.len(), 2);
    assert_eq!(meta[0].key, "user");
    assert_eq!(meta[0].value, "alice");
    assert!(meta[1].value.contains("/articles"));
}

#[test]
fn rollback_discards_pending_history() {
    let mut harness = VersioningHarness::new();

    harness.insert_article(1, "kept");
    harness.commit().unwrap();

    harness.update_article(1, "kept", "discarded");
    harness.rollback();
    harness.commit().unwrap();

    let versions = harness.article_versions(1);
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].values.get("name"), Some(&Value::from("kept")));
}

#[test]
fn modification_flags_mark_changed_columns() {
    let mut registry = Registry::new();
    registry
        .register(
            EntityConfig::new("article", "article")
                .primary_key(["id"])
                .columns(["id", "name", "content"])
                .track_property_modifications(true),
        )
        .unwrap();
    let store = MemoryStore::new();
    let mut uow = UnitOfWork::new(Arc::new(registry));

    let old = Row::from([
        ("id".to_string(), Value::Integer(1)),
        ("name".to_string(), Value::from("a")),
        ("content".to_string(), Value::from("body")),
    ]);
    let mut new = old.clone();
    new.insert("name".to_string(), Value::from("b"));

    uow.record_insert("article", &old);
    uow.materialize(&store).unwrap();
    uow.after_commit();

    uow.record_update("article", &old, &new);
    uow.materialize(&store).unwrap();
    uow.after_commit();

    let rows = store.table("article_version");
    // Insert marks every column as modified.
    assert_eq!(rows[0].values.get("name_mod"), Some(&Value::Bool(true)));
    assert_eq!(rows[0].values.get("content_mod"), Some(&Value::Bool(true)));
    // Update marks only the changed column.
    assert_eq!(rows[1].values.get("name_mod"), Some(&Value::Bool(true)));
    assert_eq!(rows[1].values.get("content_mod"), Some(&Value::Bool(false)));
}

#[test]
fn sessions_are_isolated_until_commit() {
    let mut first = VersioningHarness::new();
    let mut second = first.sibling();

    first.insert_article(1, "from first");
    second.insert_article(2, "from second");

    let t1 = first.commit().unwrap().unwrap();
    let t2 = second.commit().unwrap().unwrap();

    assert_ne!(t1, t2);
    assert!(t2 > t1, "transaction order follows commit order");
    assert_eq!(first.store.transaction_count(), 2);
}
