//! Entity configuration and the versioning registry.
//!
//! Each tracked entity gets one [`EntityConfig`] describing its identity
//! columns, tracked and excluded columns, ordering strategy and the names
//! of the bookkeeping columns on its version table. Configs are registered
//! into an injected [`Registry`]; nothing here is process-global, so
//! independent configurations can coexist (e.g. in tests).

use crate::error::{CoreError, CoreResult};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

/// Default format for deriving a version table name from a base table name.
pub const DEFAULT_TABLE_FORMAT: &str = "%s_version";

/// History ordering strategy for one entity.
///
/// Both strategies yield identical logical ordering; they differ in where
/// the ordering lives. `Subquery` computes neighbours on read, `Validity`
/// maintains an end-transaction column written at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Previous/next/index computed on demand from the version table.
    Subquery,
    /// Previous/next read from maintained validity intervals.
    #[default]
    Validity,
}

impl Strategy {
    /// Returns the canonical name of the strategy.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Subquery => "subquery",
            Self::Validity => "validity",
        }
    }
}

impl FromStr for Strategy {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "subquery" => Ok(Self::Subquery),
            "validity" => Ok(Self::Validity),
            other => Err(CoreError::unknown_strategy(other)),
        }
    }
}

/// Configuration for one tracked entity.
///
/// Immutable once registered. Built with a builder-style API:
///
/// ```rust,ignore
/// let config = EntityConfig::new("article", "article")
///     .primary_key(["id"])
///     .columns(["id", "name", "content"])
///     .exclude(["search_vector"])
///     .strategy(Strategy::Validity);
/// registry.register(config)?;
/// ```
#[derive(Debug, Clone)]
pub struct EntityConfig {
    /// Entity name, used as the identity's type component.
    pub name: String,
    /// Base table name.
    pub table: String,
    /// Format applied to the base table name to derive the version table.
    pub table_format: String,
    /// Primary key columns, in identity-tuple order.
    pub primary_key: Vec<String>,
    /// All columns of the base table.
    pub columns: Vec<String>,
    /// Columns excluded from tracking (auto-populated timestamps,
    /// full-text index columns and the like).
    pub excluded: BTreeSet<String>,
    /// History ordering strategy.
    pub strategy: Strategy,
    /// Name of the transaction-id column on the version table.
    pub transaction_column: String,
    /// Name of the end-transaction-id column (validity strategy only).
    pub end_transaction_column: String,
    /// Name of the operation-type column on the version table.
    pub operation_type_column: String,
    /// Whether per-column modification flags are maintained.
    pub track_property_modifications: bool,
    /// Suffix for modification-flag columns.
    pub modified_flag_suffix: String,
    /// Whether non-key columns collapse to NULL on delete versions.
    pub null_delete: bool,
}

impl EntityConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            table_format: DEFAULT_TABLE_FORMAT.to_string(),
            primary_key: Vec::new(),
            columns: Vec::new(),
            excluded: BTreeSet::new(),
            strategy: Strategy::default(),
            transaction_column: "transaction_id".to_string(),
            end_transaction_column: "end_transaction_id".to_string(),
            operation_type_column: "operation_type".to_string(),
            track_property_modifications: false,
            modified_flag_suffix: "_mod".to_string(),
            null_delete: true,
        }
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the full column list of the base table.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Excludes columns from tracking.
    #[must_use]
    pub fn exclude<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the ordering strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the version table name format.
    #[must_use]
    pub fn table_format(mut self, format: impl Into<String>) -> Self {
        self.table_format = format.into();
        self
    }

    /// Sets the transaction-id column name.
    #[must_use]
    pub fn transaction_column(mut self, name: impl Into<String>) -> Self {
        self.transaction_column = name.into();
        self
    }

    /// Sets the end-transaction-id column name.
    #[must_use]
    pub fn end_transaction_column(mut self, name: impl Into<String>) -> Self {
        self.end_transaction_column = name.into();
        self
    }

    /// Sets the operation-type column name.
    #[must_use]
    pub fn operation_type_column(mut self, name: impl Into<String>) -> Self {
        self.operation_type_column = name.into();
        self
    }

    /// Enables or disables per-column modification flags.
    #[must_use]
    pub fn track_property_modifications(mut self, value: bool) -> Self {
        self.track_property_modifications = value;
        self
    }

    /// Enables or disables the null-delete policy.
    #[must_use]
    pub fn null_delete(mut self, value: bool) -> Self {
        self.null_delete = value;
        self
    }

    /// Returns the version table name for this entity.
    #[must_use]
    pub fn version_table(&self) -> String {
        self.table_format.replace("%s", &self.table)
    }

    /// Returns the tracked columns: all columns minus exclusions.
    pub fn tracked_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| !self.excluded.contains(c.as_str()))
            .map(String::as_str)
    }

    /// Returns true if the column participates in tracking.
    #[must_use]
    pub fn is_tracked_column(&self, column: &str) -> bool {
        !self.excluded.contains(column) && self.columns.iter().any(|c| c == column)
    }

    /// Returns true if the column is part of the primary key.
    #[must_use]
    pub fn is_primary_key_column(&self, column: &str) -> bool {
        self.primary_key.iter().any(|c| c == column)
    }

    /// Returns the modification-flag column name for a tracked column.
    #[must_use]
    pub fn modified_flag_column(&self, column: &str) -> String {
        format!("{column}{}", self.modified_flag_suffix)
    }

    /// Validates the configuration.
    ///
    /// Called by [`Registry::register`]; all failures are fatal
    /// configuration errors.
    pub fn validate(&self) -> CoreResult<()> {
        if self.columns.is_empty() {
            return Err(CoreError::configuration(&self.name, "no columns declared"));
        }
        if self.primary_key.is_empty() {
            return Err(CoreError::configuration(
                &self.name,
                "no primary key columns",
            ));
        }
        for pk in &self.primary_key {
            if !self.columns.iter().any(|c| c == pk) {
                return Err(CoreError::configuration(
                    &self.name,
                    format!("primary key column '{pk}' not in column list"),
                ));
            }
            if self.excluded.contains(pk) {
                return Err(CoreError::configuration(
                    &self.name,
                    format!("primary key column '{pk}' cannot be excluded"),
                ));
            }
        }
        for reserved in [
            &self.transaction_column,
            &self.end_transaction_column,
            &self.operation_type_column,
        ] {
            if self.columns.iter().any(|c| c == reserved) {
                return Err(CoreError::configuration(
                    &self.name,
                    format!("column '{reserved}' collides with a bookkeeping column"),
                ));
            }
        }
        if !self.table_format.contains("%s") {
            return Err(CoreError::configuration(
                &self.name,
                "table format must contain '%s'",
            ));
        }
        Ok(())
    }
}

/// Registry of tracked entities and designated association tables.
///
/// Injected into each [`crate::unit_of_work::UnitOfWork`]; never a
/// process-wide singleton.
#[derive(Debug, Default)]
pub struct Registry {
    entities: BTreeMap<String, Arc<EntityConfig>>,
    association_tables: BTreeSet<String>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid or the
    /// entity name is already registered.
    pub fn register(&mut self, config: EntityConfig) -> CoreResult<Arc<EntityConfig>> {
        config.validate()?;
        if self.entities.contains_key(&config.name) {
            return Err(CoreError::configuration(
                &config.name,
                "entity already registered",
            ));
        }
        let config = Arc::new(config);
        self.entities.insert(config.name.clone(), Arc::clone(&config));
        Ok(config)
    }

    /// Designates a many-to-many link table for association tracking.
    pub fn register_association_table(&mut self, table: impl Into<String>) {
        self.association_tables.insert(table.into());
    }

    /// Looks up a registered entity by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<EntityConfig>> {
        self.entities.get(name).cloned()
    }

    /// Returns true if the entity name is tracked.
    #[must_use]
    pub fn is_tracked(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Returns true if the table is a designated association table.
    #[must_use]
    pub fn is_association_table(&self, table: &str) -> bool {
        self.association_tables.contains(table)
    }

    /// Returns the registered entity configs in name order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityConfig>> {
        self.entities.values()
    }

    /// Returns the number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
