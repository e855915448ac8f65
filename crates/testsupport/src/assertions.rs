//! Assertion helpers for catalog state.

use std::path::Path;

use catalog::Catalog;
use common::{DbError, DbResult};

/// Assert that `catalog` holds exactly `expected` tables.
///
/// # Example
///
/// ```
/// use catalog::MemoryDatabase;
/// use testsupport::prelude::*;
///
/// let db = MemoryDatabase::new("tmp", "/tmp/data");
/// assert_tables(&db, &[]);
/// ```
pub fn assert_tables(catalog: &dyn Catalog, expected: &[&str]) {
    let mut expected: Vec<&str> = expected.to_vec();
    expected.sort_unstable();
    let snapshot = catalog.snapshot();
    pretty_assertions::assert_eq!(
        snapshot.names(),
        expected,
        "tables of database '{}'",
        catalog.name()
    );
}

/// Assert that an operation returns an error containing a specific substring.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
///
/// let result: Result<(), common::DbError> = Err(common::DbError::Engine("disk on fire".into()));
/// assert_error_contains(result, "disk on fire");
/// ```
pub fn assert_error_contains<T>(result: DbResult<T>, expected_msg: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}', but got Ok", expected_msg),
        Err(e) => {
            let error_string = e.to_string();
            assert!(
                error_string.contains(expected_msg),
                "Expected error to contain '{}', but got: {}",
                expected_msg,
                error_string
            );
        }
    }
}

/// Assert that an operation failed with `AlreadyExists`.
pub fn assert_already_exists<T>(result: DbResult<T>) {
    match result {
        Err(DbError::AlreadyExists { .. }) => {}
        Err(e) => panic!("Expected AlreadyExists, got: {e}"),
        Ok(_) => panic!("Expected AlreadyExists, got Ok"),
    }
}

/// Assert that an operation failed with `NotFound`.
pub fn assert_not_found<T>(result: DbResult<T>) {
    match result {
        Err(DbError::NotFound { .. }) => {}
        Err(e) => panic!("Expected NotFound, got: {e}"),
        Ok(_) => panic!("Expected NotFound, got Ok"),
    }
}

/// File names in `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
