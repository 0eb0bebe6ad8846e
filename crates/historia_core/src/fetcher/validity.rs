//! Interval-backed ordering: neighbours read from validity columns.

use crate::config::EntityConfig;
use crate::error::CoreResult;
use crate::fetcher::VersionFetcher;
use crate::store::{VersionRow, VersionStore};

/// Reads previous/next directly from maintained validity intervals.
///
/// "Previous" is the row whose end-transaction ID equals this row's
/// transaction ID; "next" the row whose transaction ID equals this row's
/// end. Write-time cost is the one conditional interval-close UPDATE per
/// write; reads are direct lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidityFetcher;

impl VersionFetcher for ValidityFetcher {
    fn previous(
        &self,
        store: &dyn VersionStore,
        config: &EntityConfig,
        row: &VersionRow,
    ) -> CoreResult<Option<VersionRow>> {
        let versions = store.versions(&config.version_table(), &row.identity)?;
        Ok(versions
            .into_iter()
            .find(|v| v.end_transaction_id == Some(row.transaction_id)))
    }

    fn next(
        &self,
        store: &dyn VersionStore,
        config: &EntityConfig,
        row: &VersionRow,
    ) -> CoreResult<Option<VersionRow>> {
        let Some(end) = row.end_transaction_id else {
            return Ok(None);
        };
        let versions = store.versions(&config.version_table(), &row.identity)?;
        Ok(versions.into_iter().find(|v| v.transaction_id == end))
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
            .strategy(Strategy::Validity)
    }

    fn insert(store: &MemoryStore, txid: u64, end: Option<u64>) -> VersionRow {
        let row = VersionRow {
            identity: vec![Value::Integer(1)],
            transaction_id: TransactionId::new(txid),
            end_transaction_id: end.map(TransactionId::new),
            kind: OperationKind::Update,
            values: Row::new(),
        };
        store.insert_version("article_version", row.clone()).unwrap();
        row
    }

    #[test]
    fn previous_follows_the_interval_chain() {
        let store = MemoryStore::new();
        let fetcher = ValidityFetcher;
        let config = config();
        let first = insert(&store, 1, Some(4));
        let second = insert(&store, 4, None);

        assert_eq!(fetcher.previous(&store, &config, &first).unwrap(), None);
        assert_eq!(
            fetcher.previous(&store, &config, &second).unwrap(),
            Some(first.clone())
        );
    }

    #[test]
    fn next_follows_the_end_column() {
        let store = MemoryStore::new();
        let fetcher = ValidityFetcher;
        let config = config();
        let first = insert(&store, 1, Some(4));
        let second = insert(&store, 4, None);

        assert_eq!(
            fetcher.next(&store, &config, &first).unwrap(),
            Some(second.clone())
        );
        // The open interval has no successor.
        assert_eq!(fetcher.next(&store, &config, &second).unwrap(), None);
    }

    #[test]
    fn index_matches_position() {
        let store = MemoryStore::new();
        let fetcher = ValidityFetcher;
        let config = config();
        let first = insert(&store, 1, Some(4));
        let second = insert(&store, 4, None);

        assert_eq!(fetcher.index(&store, &config, &first).unwrap(), 0);
        assert_eq!(fetcher.index(&store, &config, &second).unwrap(), 1);
    }
}
