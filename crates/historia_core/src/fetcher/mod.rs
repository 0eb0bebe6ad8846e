//! History ordering strategies.
//!
//! Given a version row, a fetcher computes its predecessor, successor and
//! ordinal position within the entity's history. Two interchangeable
//! strategies exist, selected per entity at configuration time; both must
//! yield identical logical ordering.

mod subquery;
mod validity;

pub use subquery::SubqueryFetcher;
pub use validity::ValidityFetcher;

use crate::config::{EntityConfig, Strategy};
use crate::error::CoreResult;
use crate::store::{VersionRow, VersionStore};

/// Computes a version row's neighbours and position.
pub trait VersionFetcher {
    /// Returns the row for the same identity that this row superseded.
    fn previous(
        &self,
        store: &dyn VersionStore,
        config: &EntityConfig,
        row: &VersionRow,
    ) -> CoreResult<Option<VersionRow>>;

    /// Returns the row for the same identity that superseded this row.
    fn next(
        &self,
        store: &dyn VersionStore,
        config: &EntityConfig,
        row: &VersionRow,
    ) -> CoreResult<Option<VersionRow>>;

    /// Returns the zero-based ordinal of this row within the identity's
    /// history.
    fn index(
        &self,
        store: &dyn VersionStore,
        config: &EntityConfig,
        row: &VersionRow,
    ) -> CoreResult<usize>;
}

/// Returns the fetcher for a strategy.
#[must_use]
pub fn fetcher_for(strategy: Strategy) -> &'static dyn VersionFetcher {
    match strategy {
        Strategy::Subquery => &SubqueryFetcher,
        Strategy::Validity => &ValidityFetcher,
    }
}
