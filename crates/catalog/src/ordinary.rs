use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use common::{Config, DbError, DbResult};
use definition::{MetadataCodec, TableDefinition};
use rayon::ThreadPool;
use tracing::{info, warn};

use crate::{
    Catalog, CatalogKind, TableBuilder, TableHandle, TableRef,
    loader::{LoadStats, Loader},
    registry::{Snapshot, TableRegistry},
    store::MetadataStore,
};

/// Default database engine: one metadata record per table on disk.
///
/// Creation writes the record before the table becomes visible; removal hides
/// the table before its record is deleted. Renaming is a create in the target
/// followed by a remove in the source and is not atomic: after a crash between
/// the two steps both databases hold a record and both load the table on the
/// next start. If the target record cannot be written, the table's data is
/// moved back and the source stays as it was; should moving it back fail too,
/// the source still lists the table while its data sits under the target.
pub struct OrdinaryDatabase {
    name: String,
    data_path: PathBuf,
    store: MetadataStore,
    registry: TableRegistry,
    codec: Arc<dyn MetadataCodec>,
    stats: LoadStats,
}

impl OrdinaryDatabase {
    /// Open database `name`, loading every table recorded in its metadata
    /// directory.
    ///
    /// Fails if any table fails to load; in that case every table loaded so
    /// far is shut down again.
    pub fn open(
        name: &str,
        config: &Config,
        codec: Arc<dyn MetadataCodec>,
        builder: &dyn TableBuilder,
        pool: Option<&ThreadPool>,
    ) -> DbResult<Self> {
        let metadata_dir = config.metadata_dir(name);
        fs::create_dir_all(&metadata_dir)?;

        let store = MetadataStore::new(name, metadata_dir);
        let registry = TableRegistry::new(name);
        let loaded = Loader::new(name, &store, &registry, codec.as_ref(), builder, config).load(pool);
        let stats = match loaded {
            Ok(stats) => stats,
            Err(err) => {
                registry.shutdown_all();
                return Err(err);
            }
        };
        info!(database = name, loaded = stats.loaded, "database opened");

        Ok(Self {
            name: name.to_string(),
            data_path: config.data_path(name),
            store,
            registry,
            codec,
            stats,
        })
    }

    pub fn metadata_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Directory the tables of this database keep their data in.
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn load_stats(&self) -> LoadStats {
        self.stats
    }

    /// Write the record of `table` and publish `handle` under it.
    ///
    /// The caller holds the registry claim on `table`; it is released if the
    /// record cannot be written.
    fn create_reserved(
        &self,
        table: &str,
        handle: TableRef,
        definition: &TableDefinition,
        engine: &str,
    ) -> DbResult<()> {
        let mut attach = definition.to_attach_form(engine);
        attach.table = table.to_string();

        let written = self
            .codec
            .format(&attach)
            .and_then(|text| self.store.create(table, &text));
        if let Err(err) = written {
            self.registry.release(table);
            return Err(err);
        }

        if let Err(err) = self.registry.commit(table, handle) {
            if let Err(cleanup) = self.store.remove(table) {
                warn!(database = %self.name, table, "cannot remove orphaned metadata: {cleanup}");
            }
            return Err(err);
        }
        Ok(())
    }

    fn read_definition(&self, table: &str) -> DbResult<TableDefinition> {
        let text = self.store.read(table)?;
        let origin = self.store.record_path(table).display().to_string();
        self.codec.parse(&text, &origin)
    }
}

impl Catalog for OrdinaryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CatalogKind {
        CatalogKind::Ordinary
    }

    fn as_ordinary(&self) -> Option<&OrdinaryDatabase> {
        Some(self)
    }

    fn exists(&self, table: &str) -> bool {
        self.registry.exists(table)
    }

    fn try_get(&self, table: &str) -> Option<TableRef> {
        self.registry.try_get(table)
    }

    fn snapshot(&self) -> Snapshot {
        self.registry.snapshot()
    }

    fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    fn attach(&self, table: &str, handle: TableRef) -> DbResult<()> {
        self.registry.attach(table, handle)
    }

    fn detach(&self, table: &str) -> DbResult<TableRef> {
        self.registry.detach(table)
    }

    fn create_table(
        &self,
        table: &str,
        handle: TableRef,
        definition: &TableDefinition,
        engine: &str,
    ) -> DbResult<()> {
        // Claimed before the record is written, so a concurrent create or
        // attach of the same name fails instead of racing us.
        self.registry.reserve(table)?;
        self.create_reserved(table, handle, definition, engine)
    }

    fn remove_table(&self, table: &str) -> DbResult<TableRef> {
        let handle = self.registry.detach(table)?;

        if let Err(err) = self.store.remove(table) {
            if let Err(reattach) = self.registry.attach(table, handle.clone()) {
                warn!(database = %self.name, table, "cannot re-attach table: {reattach}");
            }
            return Err(err);
        }
        Ok(handle)
    }

    fn rename_table(&self, table: &str, to: &dyn Catalog, to_table: &str) -> DbResult<()> {
        let target = to.as_ordinary().ok_or_else(|| {
            DbError::UnsupportedOperation(format!(
                "moving tables between databases of different engines ({} to {}) is not supported",
                self.kind(),
                to.kind()
            ))
        })?;

        let handle = self
            .registry
            .try_get(table)
            .ok_or_else(|| DbError::not_found(&self.name, table))?;
        let mut definition = self.read_definition(table)?;
        definition.table = to_table.to_string();

        // Hold the target name until the record exists, so nothing can take
        // it while the data is being moved.
        target.registry.reserve(to_table)?;
        if target.store.is_claimed(to_table) {
            target.registry.release(to_table);
            return Err(DbError::already_exists(target.name(), to_table));
        }

        if let Err(err) = handle.rename(target.data_path(), target.name(), to_table) {
            target.registry.release(to_table);
            return Err(err);
        }

        let engine = handle.engine();
        if let Err(err) = target.create_reserved(to_table, handle.clone(), &definition, &engine) {
            if let Err(undo) = handle.rename(&self.data_path, &self.name, table) {
                warn!(database = %self.name, table, "cannot move table data back: {undo}");
            }
            return Err(err);
        }

        // Not atomic: a crash here leaves the table in both databases.
        self.remove_table(table)?;
        Ok(())
    }

    fn create_query(&self, table: &str) -> DbResult<TableDefinition> {
        Ok(self.read_definition(table)?.to_display_form(&self.name))
    }

    fn shutdown(&self) {
        self.registry.shutdown_all();
    }
}
