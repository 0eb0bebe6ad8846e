//! # Historia Core
//!
//! Transactional versioning core for Historia.
//!
//! This crate provides:
//! - Operation records with per-identity collapsing
//! - A unit-of-work tracker driven by the host's flush lifecycle
//! - Lazy transaction creation with attached metadata
//! - History materialization with validity-interval maintenance
//! - Interchangeable `subquery` / `validity` ordering strategies
//!
//! The core is a library invoked by a persistence layer; it talks to
//! storage only through the [`VersionStore`] seam and performs no logging
//! of its own beyond commit-path tracing.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod fetcher;
mod record;
mod store;
mod transaction;
mod types;
mod unit_of_work;
mod value;

pub use config::{EntityConfig, Registry, Strategy, DEFAULT_TABLE_FORMAT};
pub use error::{CoreError, CoreResult};
pub use fetcher::{fetcher_for, SubqueryFetcher, ValidityFetcher, VersionFetcher};
pub use record::{AssociationOp, Identity, Operation, OperationKind};
pub use store::{MemoryStore, TransactionMetaRow, TransactionRow, VersionRow, VersionStore};
pub use transaction::{MetaValue, TransactionContext};
pub use types::TransactionId;
pub use unit_of_work::{UnitOfWork, UowState};
pub use value::{Row, Value};
