//! Isolated catalog environments.
//!
//! A [`TestCatalog`] owns a temporary data directory, a configuration pointing
//! at it, a recording table builder and a small worker pool. Databases opened
//! through it are independent of every other test and are cleaned up when the
//! context is dropped.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use catalog::{Catalog, OrdinaryDatabase, build_load_pool};
use common::{Config, DbResult, escape_for_file_name};
use definition::{JsonCodec, MetadataCodec, TableDefinition};
use rayon::ThreadPool;
use tempfile::TempDir;

use crate::fixtures::{MemoryTable, RecordingBuilder, table_definition};

/// A catalog environment with isolated temporary storage.
///
/// # Example
///
/// ```
/// use catalog::Catalog;
/// use testsupport::prelude::*;
///
/// let ctx = TestCatalog::new().unwrap();
/// let db = ctx.open("default").unwrap();
/// assert!(db.is_empty());
/// ```
pub struct TestCatalog {
    _temp_dir: TempDir,
    config: Config,
    builder: RecordingBuilder,
    pool: ThreadPool,
}

impl TestCatalog {
    /// Create a context with small load chunks so parallel loading kicks in
    /// with a handful of tables.
    pub fn new() -> DbResult<Self> {
        Self::with_builder(RecordingBuilder::new())
    }

    /// Create a context whose tables are built by `builder`.
    pub fn with_builder(builder: RecordingBuilder) -> DbResult<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config = Config::builder()
            .data_dir(temp_dir.path().to_path_buf())
            .load_chunk_size(2)
            .load_threads(4)
            .build();
        let pool = build_load_pool(&config)?;
        Ok(Self {
            _temp_dir: temp_dir,
            config,
            builder,
            pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn builder(&self) -> &RecordingBuilder {
        &self.builder
    }

    pub fn codec(&self) -> Arc<dyn MetadataCodec> {
        Arc::new(JsonCodec)
    }

    /// Open `database`, loading its tables on the worker pool.
    pub fn open(&self, database: &str) -> DbResult<OrdinaryDatabase> {
        OrdinaryDatabase::open(database, &self.config, self.codec(), &self.builder, Some(&self.pool))
    }

    /// Open `database`, loading its tables on the calling thread.
    pub fn open_serial(&self, database: &str) -> DbResult<OrdinaryDatabase> {
        OrdinaryDatabase::open(database, &self.config, self.codec(), &self.builder, None)
    }

    /// Create `table` in `db` with a fresh [`MemoryTable`].
    pub fn create(
        &self,
        db: &OrdinaryDatabase,
        table: &str,
        engine: &str,
    ) -> DbResult<Arc<MemoryTable>> {
        let handle = Arc::new(MemoryTable::new(engine));
        db.create_table(table, handle.clone(), &table_definition(table, engine), engine)?;
        Ok(handle)
    }

    /// Metadata directory of `database`, created if missing.
    pub fn metadata_dir(&self, database: &str) -> DbResult<PathBuf> {
        let dir = self.config.metadata_dir(database);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Write a record for `table` directly, bypassing the catalog.
    pub fn write_record(&self, database: &str, table: &str, definition: &TableDefinition) -> DbResult<PathBuf> {
        let text = JsonCodec.format(&definition.to_attach_form(&definition.engine.name))?;
        self.write_raw(database, &format!("{}.sql", escape_for_file_name(table)), &format!("{text}\n"))
    }

    /// Write an arbitrary file into the metadata directory of `database`.
    pub fn write_raw(&self, database: &str, file_name: &str, contents: &str) -> DbResult<PathBuf> {
        let path = self.metadata_dir(database)?.join(file_name);
        fs::write(&path, contents)?;
        Ok(path)
    }
}
