//! Entity-config fixtures and the scenario harness.
//!
//! Provides convenience builders for the registry/store pairs the
//! integration suites drive, and a harness bundling a unit of work with
//! its in-memory store.

use historia_core::{
    EntityConfig, MemoryStore, Registry, Row, Strategy, TransactionId, UnitOfWork, Value,
    VersionStore,
};
use std::sync::Arc;

/// Association link table between articles and tags.
pub const ARTICLE_TAG_TABLE: &str = "article_tag";

/// The standard `article` entity used across the test suites.
pub fn article_config(strategy: Strategy) -> EntityConfig {
    EntityConfig::new("article", "article")
        .primary_key(["id"])
        .columns(["id", "name", "content", "search_vector"])
        .exclude(["search_vector"])
        .strategy(strategy)
}

/// The standard `tag` entity used across the test suites.
pub fn tag_config(strategy: Strategy) -> EntityConfig {
    EntityConfig::new("tag", "tag")
        .primary_key(["id"])
        .columns(["id", "name"])
        .strategy(strategy)
}

/// Builds a registry with `article`, `tag` and their link table.
pub fn test_registry(strategy: Strategy) -> Arc<Registry> {
    let mut registry = Registry::new();
    registry
        .register(article_config(strategy))
        .expect("article config is valid");
    registry
        .register(tag_config(strategy))
        .expect("tag config is valid");
    registry.register_association_table(ARTICLE_TAG_TABLE);
    Arc::new(registry)
}

/// Builds an article row.
pub fn article_row(id: i64, name: &str) -> Row {
    Row::from([
        ("id".to_string(), Value::Integer(id)),
        ("name".to_string(), Value::Text(name.to_string())),
        (
            "content".to_string(),
            Value::Text(format!("content of {name}")),
        ),
    ])
}

/// Builds an article-tag link row.
pub fn link_row(article_id: i64, tag_id: i64) -> Row {
    Row::from([
        ("article_id".to_string(), Value::Integer(article_id)),
        ("tag_id".to_string(), Value::Integer(tag_id)),
    ])
}

/// Serializes structured transaction metadata the way hosts commonly do.
pub fn meta_json(pairs: &[(&str, &str)]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_json::Value::String((*v).to_string())))
        .collect();
    serde_json::Value::Object(map).to_string()
}

/// A unit of work bundled with its store and registry.
///
/// One harness models one connection; create several over a shared
/// store to exercise cross-session behavior.
pub struct VersioningHarness {
    /// The in-memory version store.
    pub store: Arc<MemoryStore>,
    /// The registry behind the unit of work.
    pub registry: Arc<Registry>,
    /// The unit of work under test.
    pub uow: UnitOfWork,
}

impl VersioningHarness {
    /// Creates a harness with the standard registry (validity strategy).
    #[must_use]
    pub fn new() -> Self {
        Self::with_strategy(Strategy::Validity)
    }

    /// Creates a harness with the standard registry and a strategy.
    #[must_use]
    pub fn with_strategy(strategy: Strategy) -> Self {
        let registry = test_registry(strategy);
        Self {
            store: Arc::new(MemoryStore::new()),
            registry: Arc::clone(&registry),
            uow: UnitOfWork::new(registry),
        }
    }

    /// Creates a second connection over the same store.
    #[must_use]
    pub fn sibling(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            uow: UnitOfWork::new(Arc::clone(&self.registry)),
        }
    }

    /// Records an article insert.
    pub fn insert_article(&mut self, id: i64, name: &str) {
        self.uow.record_insert("article", &article_row(id, name));
    }

    /// Records an article update.
    pub fn update_article(&mut self, id: i64, from: &str, to: &str) {
        self.uow
            .record_update("article", &article_row(id, from), &article_row(id, to));
    }

    /// Records an article delete.
    pub fn delete_article(&mut self, id: i64, name: &str) {
        self.uow.record_delete("article", &article_row(id, name));
    }

    /// Drives the flush lifecycle to completion.
    pub fn commit(&mut self) -> historia_core::CoreResult<Option<TransactionId>> {
        self.uow.before_flush();
        let txid = self.uow.materialize(self.store.as_ref())?;
        self.uow.after_flush();
        self.uow.before_commit();
        self.uow.after_commit();
        Ok(txid)
    }

    /// Discards everything pending.
    pub fn rollback(&mut self) {
        self.uow.after_rollback();
    }

    /// Returns the article version rows for one id, oldest first.
    #[must_use]
    pub fn article_versions(&self, id: i64) -> Vec<historia_core::VersionRow> {
        self.store
            .versions("article_version", &vec![Value::Integer(id)])
            .expect("memory store scan cannot fail")
    }
}

impl Default for VersioningHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for VersioningHarness {
    type Target = UnitOfWork;

    fn deref(&self) -> &Self::Target {
        &self.uow
    }
}

impl std::ops::DerefMut for VersioningHarness {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.uow
    }
}
