//! Directory-backed table catalog.
//!
//! Every database keeps one metadata record per table in its own directory and
//! an in-memory [`TableRegistry`] of live table handles. [`OrdinaryDatabase`]
//! rebuilds the registry from the records when opened and keeps both sides in
//! step on every create, remove and rename.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use catalog::{Catalog, OrdinaryDatabase, TableBuilder, build_load_pool};
//! use common::Config;
//! use definition::JsonCodec;
//!
//! # fn example(builder: &dyn TableBuilder) -> common::DbResult<()> {
//! let config = Config::default();
//! let pool = build_load_pool(&config)?;
//! let db = OrdinaryDatabase::open("default", &config, Arc::new(JsonCodec), builder, Some(&pool))?;
//! for (name, _table) in &db.snapshot() {
//!     println!("{name}");
//! }
//! db.shutdown();
//! # Ok(())
//! # }
//! ```

mod loader;
mod memory;
mod ordinary;
pub mod registry;
pub mod store;
#[cfg(test)]
mod testing;

use std::{fmt, path::Path, sync::Arc};

use common::{Config, DbError, DbResult};
use definition::TableDefinition;
use rayon::{ThreadPool, ThreadPoolBuilder};

pub use loader::{INNER_TABLE_PREFIX, LoadStats, is_priority_table};
pub use memory::MemoryDatabase;
pub use ordinary::OrdinaryDatabase;
pub use registry::{Snapshot, TableRegistry};
pub use store::{EntryKind, MetadataEntry, MetadataStore};

/// A live table owned by a storage engine.
pub trait TableHandle: Send + Sync {
    /// Engine name, e.g. `MergeTree` or `View`.
    fn engine(&self) -> String;

    /// Move the table's storage under `data_path` as `database.table`.
    ///
    /// Engines that cannot move their data return `DbError::RenameUnsupported`.
    fn rename(&self, data_path: &Path, database: &str, table: &str) -> DbResult<()>;

    /// Release resources. Must not fail.
    fn shutdown(&self) {}
}

impl fmt::Debug for dyn TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandle").finish_non_exhaustive()
    }
}

/// Shared handle to a live table.
pub type TableRef = Arc<dyn TableHandle>;

/// Turns an attach-form definition into a live table.
pub trait TableBuilder: Send + Sync {
    fn build(&self, definition: &TableDefinition, database: &str) -> DbResult<TableRef>;
}

/// Database engine behind a [`Catalog`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    /// Metadata records in a directory, see [`OrdinaryDatabase`].
    Ordinary,
    /// Definitions kept in memory only, see [`MemoryDatabase`].
    Memory,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CatalogKind::Ordinary => "Ordinary",
            CatalogKind::Memory => "Memory",
        })
    }
}

/// Operations every database engine supports.
pub trait Catalog: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> CatalogKind;

    fn as_ordinary(&self) -> Option<&OrdinaryDatabase> {
        None
    }

    fn as_memory(&self) -> Option<&MemoryDatabase> {
        None
    }

    fn exists(&self, table: &str) -> bool;

    fn try_get(&self, table: &str) -> Option<TableRef>;

    fn get(&self, table: &str) -> DbResult<TableRef> {
        self.try_get(table)
            .ok_or_else(|| DbError::not_found(self.name(), table))
    }

    /// Point-in-time copy of the attached tables.
    fn snapshot(&self) -> Snapshot;

    fn is_empty(&self) -> bool;

    /// Register a table whose metadata already exists.
    fn attach(&self, table: &str, handle: TableRef) -> DbResult<()>;

    /// Unregister a table, leaving its metadata alone.
    fn detach(&self, table: &str) -> DbResult<TableRef>;

    /// Persist `definition` and register `handle` under `table`.
    fn create_table(
        &self,
        table: &str,
        handle: TableRef,
        definition: &TableDefinition,
        engine: &str,
    ) -> DbResult<()>;

    /// Unregister `table` and delete its metadata.
    fn remove_table(&self, table: &str) -> DbResult<TableRef>;

    /// Move `table` to `to` as `to_table`.
    fn rename_table(&self, table: &str, to: &dyn Catalog, to_table: &str) -> DbResult<()>;

    /// Database-qualified `CREATE` definition of `table`.
    fn create_query(&self, table: &str) -> DbResult<TableDefinition>;

    /// Shut down every table and empty the catalog.
    fn shutdown(&self);
}

/// Builds the worker pool used to load tables in parallel.
pub fn build_load_pool(config: &Config) -> DbResult<ThreadPool> {
    let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("catalog-load-{i}"));
    if let Some(threads) = config.load_threads {
        builder = builder.num_threads(threads);
    }
    builder
        .build()
        .map_err(|err| DbError::WorkerPool(err.to_string()))
}
