//! # Historia Native
//!
//! Database-resident realization of the Historia versioning guarantees.
//!
//! This crate generates, per tracked table, a PL/pgSQL audit procedure
//! and the trigger that invokes it after every insert, update and
//! delete. The generated logic reproduces the in-process core's
//! collapsing and interval-closing semantics entirely inside one
//! database transaction, so the same guarantees hold for writes that
//! bypass the unit of work (raw statements, concurrent connections).
//!
//! The generator is pure text-out: it never talks to a database. The
//! host executes the creation DDL at table-creation time and the
//! teardown DDL at table-drop time.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod handoff;
mod trigger;

pub use handoff::TransactionHandoff;
pub use trigger::{TransactionIdSource, TriggerSet};
