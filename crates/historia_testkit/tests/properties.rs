//! Property-based suites over random write scripts.

use historia_core::{fetcher_for, OperationKind, Strategy, Value, VersionFetcher};
use historia_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// For any identity, the validity intervals partition the
    /// transaction axis: contiguous, non-overlapping, at most one open.
    #[test]
    fn validity_intervals_partition_the_axis(script in script_strategy(32)) {
        let mut harness = VersioningHarness::new();
        run_script(&mut harness, &script).unwrap();

        for id in 1..=4i64 {
            let rows = harness.article_versions(id);
            let open = rows.iter().filter(|r| r.end_transaction_id.is_none()).count();
            prop_assert!(open <= 1, "identity {} has {} open intervals", id, open);

            for pair in rows.windows(2) {
                prop_assert_eq!(
                    pair[0].end_transaction_id,
                    Some(pair[1].transaction_id),
                    "intervals of identity {} are not contiguous",
                    id
                );
            }
            if let Some(last) = rows.last() {
                prop_assert!(last.end_transaction_id.is_none());
            }
        }
    }

    /// Both strategies report identical previous/next/index for every
    /// row produced by the same commit sequence.
    #[test]
    fn strategies_report_identical_ordering(script in script_strategy(32)) {
        let mut validity = VersioningHarness::with_strategy(Strategy::Validity);
        let mut subquery = VersioningHarness::with_strategy(Strategy::Subquery);
        run_script(&mut validity, &script).unwrap();
        run_script(&mut subquery, &script).unwrap();

        let validity_config = article_config(Strategy::Validity);
        let subquery_config = article_config(Strategy::Subquery);
        let validity_fetcher = fetcher_for(Strategy::Validity);
        let subquery_fetcher = fetcher_for(Strategy::Subquery);

        for id in 1..=4i64 {
            let rows_v = validity.article_versions(id);
            let rows_s = subquery.article_versions(id);
            prop_assert_eq!(rows_v.len(), rows_s.len());

            for (row_v, row_s) in rows_v.iter().zip(rows_s.iter()) {
                prop_assert_eq!(row_v.transaction_id, row_s.transaction_id);

                let prev_v = validity_fetcher
                    .previous(validity.store.as_ref(), &validity_config, row_v)
                    .unwrap()
                    .map(|r| r.transaction_id);
                let prev_s = subquery_fetcher
                    .previous(subquery.store.as_ref(), &subquery_config, row_s)
                    .unwrap()
                    .map(|r| r.transaction_id);
                prop_assert_eq!(prev_v, prev_s, "previous mismatch for identity {}", id);

                let next_v = validity_fetcher
                    .next(validity.store.as_ref(), &validity_config, row_v)
                    .unwrap()
                    .map(|r| r.transaction_id);
                let next_s = subquery_fetcher
                    .next(subquery.store.as_ref(), &subquery_config, row_s)
                    .unwrap()
                    .map(|r| r.transaction_id);
                prop_assert_eq!(next_v, next_s, "next mismatch for identity {}", id);

                let index_v = validity_fetcher
                    .index(validity.store.as_ref(), &validity_config, row_v)
                    .unwrap();
                let index_s = subquery_fetcher
                    .index(subquery.store.as_ref(), &subquery_config, row_s)
                    .unwrap();
                prop_assert_eq!(index_v, index_s, "index mismatch for identity {}", id);
            }
        }
    }

    /// Every version row belongs to a recorded transaction, and no
    /// transaction row exists without version rows.
    #[test]
    fn transactions_exist_exactly_when_rows_do(script in script_strategy(32)) {
        let mut harness = VersioningHarness::new();
        run_script(&mut harness, &script).unwrap();

        let recorded: std::collections::BTreeSet<_> = harness
            .store
            .transactions()
            .into_iter()
            .map(|t| t.id)
            .collect();
        let used: std::collections::BTreeSet<_> = harness
            .store
            .table("article_version")
            .into_iter()
            .map(|r| r.transaction_id)
            .collect();
        prop_assert_eq!(recorded, used);
    }

    /// The last committed version of each identity agrees with the
    /// model state after replaying the script.
    #[test]
    fn latest_versions_match_the_model(script in script_strategy(32)) {
        let mut harness = VersioningHarness::new();
        let live = run_script(&mut harness, &script).unwrap();

        for id in 1..=4i64 {
            let rows = harness.article_versions(id);
            match live.get(&id) {
                Some(name) => {
                    let last = rows.last().expect("live identity must have history");
                    prop_assert!(last.kind != OperationKind::Delete);
                    prop_assert_eq!(
                        last.values.get("name"),
                        Some(&Value::Text(name.clone()))
                    );
                }
                None => {
                    if let Some(last) = rows.last() {
                        prop_assert_eq!(last.kind, OperationKind::Delete);
                    }
                }
            }
        }
    }
}
