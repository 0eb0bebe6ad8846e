//! # Historia Testkit
//!
//! Test utilities for Historia.
//!
//! This crate provides:
//! - Entity-config fixtures and a scenario harness over the in-memory
//!   store
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use historia_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_harness() {
//!     let mut harness = VersioningHarness::new();
//!     harness.insert_article(1, "first");
//!     let txid = harness.commit().unwrap();
//!     // ... assertions against harness.store
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
