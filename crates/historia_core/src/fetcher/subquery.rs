//! On-demand ordering: neighbours computed from transaction IDs.

use crate::config::EntityConfig;
use crate::error::CoreResult;
use crate::fetcher::VersionFetcher;
use crate::store::{VersionRow, VersionStore};

/// Computes previous/next/index on read, not stored.
///
/// "Previous" is the row with the greatest transaction ID strictly below
/// the current row's; "next" the least strictly above; "index" the count
/// of rows below. No write-time cost; read cost grows with history depth
/// unless indexed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubqueryFetcher;

impl VersionFetcher for SubqueryFetcher {
    fn previous(
        &self,
        store: &dyn VersionStore,
        config: &EntityConfig,
        row: &VersionRow,
    ) -> CoreResult<Option<VersionRow>> {
        let versions = store.versions(&config.version_table(), &row.identity)?;
        Ok(versions
            .into_iter()
            .filter(|v| v.transaction_id < row.transaction_id)
            .max_by_key(|v| v.transaction_id))
    }

    fn next(
        &self,
        store: &dyn VersionStore,
        config: &EntityConfig,
        row: &VersionRow,
    ) -> CoreResult<Option<VersionRow>> {
        let versions = store.versions(&config.version_table(), &row.identity)?;
        Ok(versions
            .into_iter()
            .filter(|v| v.transaction_id > row.transaction_id)
            .min_by_key(|v| v.transaction_id))
    }

    fn index(
        &self,
        store: &dyn VersionStore,
        config: &EntityConfig,
        row: &VersionRow,
    ) -> CoreResult<usize> {
        let versions = store.versions(&config.version_table(), &row.identity)?;
        Ok(versions
            .iter()
            .filter(|v| v.transaction_id < row.transaction_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;
    use crate::record::OperationKind;
    use crate::store::MemoryStore;
    use crate::types::TransactionId;
    use crate::value::{Row, Value};

    fn config() -> EntityConfig {
        EntityConfig::new("article", "article")
            .primary_key(["id"])
            .columns(["id", "name"])
            .strategy(Strategy::Subquery)
    }

    fn insert(store: &MemoryStore, id: i64, txid: u64) -> VersionRow {
        let row = VersionRow {
            identity: vec![Value::Integer(id)],
            transaction_id: TransactionId::new(txid),
            end_transaction_id: None,
            kind: OperationKind::Update,
            values: Row::new(),
        };
        store.insert_version("article_version", row.clone()).unwrap();
        row
    }

    #[test]
    fn neighbours_follow_transaction_order() {
        let store = MemoryStore::new();
        let fetcher = SubqueryFetcher;
        let config = config();
        let first = insert(&store, 1, 1);
        let second = insert(&store, 1, 4);
        let third = insert(&store, 1, 9);

        assert_eq!(fetcher.previous(&store, &config, &first).unwrap(), None);
        assert_eq!(
            fetcher.previous(&store, &config, &second).unwrap(),
            Some(first.clone())
        );
        assert_eq!(
            fetcher.next(&store, &config, &second).unwrap(),
            Some(third.clone())
        );
        assert_eq!(fetcher.next(&store, &config, &third).unwrap(), None);
    }

    #[test]
    fn index_counts_smaller_transactions() {
        let store = MemoryStore::new();
        let fetcher = SubqueryFetcher;
        let config = config();
        let first = insert(&store, 1, 1);
        let second = insert(&store, 1, 4);

        assert_eq!(fetcher.index(&store, &config, &first).unwrap(), 0);
        assert_eq!(fetcher.index(&store, &config, &second).unwrap(), 1);
    }

    #[test]
    fn other_identities_are_invisible() {
        let store = MemoryStore::new();
        let fetcher = SubqueryFetcher;
        let config = config();
        let mine = insert(&store, 1, 5);
        insert(&store, 2, 1);

        assert_eq!(fetcher.previous(&store, &config, &mine).unwrap(), None);
        assert_eq!(fetcher.index(&store, &config, &mine).unwrap(), 0);
    }
}
