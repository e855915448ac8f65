//! Test support utilities for the catalog workspace.
//!
//! This crate provides:
//! - In-memory table engines and builders that record what they were asked to do
//! - Isolated catalog contexts backed by a temporary data directory
//! - Property-based generators for table names and definitions
//! - Assertion helpers for catalog state
//!
//! # Example Usage
//!
//! ```
//! use catalog::Catalog;
//! use testsupport::prelude::*;
//!
//! let ctx = TestCatalog::new().unwrap();
//! let db = ctx.open("default").unwrap();
//! ctx.create(&db, "hits", "Log").unwrap();
//! assert_tables(&db, &["hits"]);
//! ```

pub mod assertions;
pub mod context;
pub mod fixtures;
pub mod proptest_generators;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::context::*;
    pub use crate::fixtures::*;
}
