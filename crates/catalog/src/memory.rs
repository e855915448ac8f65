use std::path::{Path, PathBuf};

use ahash::RandomState;
use common::{DbError, DbResult};
use definition::TableDefinition;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::warn;

use crate::{
    Catalog, CatalogKind, TableHandle, TableRef,
    registry::{Snapshot, TableRegistry},
};

/// Database engine that keeps table definitions in memory only.
///
/// Nothing survives a restart; tables can only be moved to other memory
/// databases.
pub struct MemoryDatabase {
    name: String,
    data_path: PathBuf,
    registry: TableRegistry,
    definitions: Mutex<HashMap<String, TableDefinition, RandomState>>,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>, data_path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            registry: TableRegistry::new(name.clone()),
            name,
            data_path: data_path.into(),
            definitions: Mutex::new(HashMap::default()),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Publish `handle` under the already claimed name `table`.
    fn create_reserved(
        &self,
        table: &str,
        handle: TableRef,
        definition: &TableDefinition,
        engine: &str,
    ) -> DbResult<()> {
        let mut attach = definition.to_attach_form(engine);
        attach.table = table.to_string();

        self.definitions.lock().insert(table.to_string(), attach);
        if let Err(err) = self.registry.commit(table, handle) {
            self.definitions.lock().remove(table);
            return Err(err);
        }
        Ok(())
    }
}

impl Catalog for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> CatalogKind {
        CatalogKind::Memory
    }

    fn as_memory(&self) -> Option<&MemoryDatabase> {
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
        self.registry.reserve(table)?;
        self.create_reserved(table, handle, definition, engine)
    }

    fn remove_table(&self, table: &str) -> DbResult<TableRef> {
        let handle = self.registry.detach(table)?;
        self.definitions.lock().remove(table);
        Ok(handle)
    }

    fn rename_table(&self, table: &str, to: &dyn Catalog, to_table: &str) -> DbResult<()> {
        let target = to.as_memory().ok_or_else(|| {
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
        let mut definition = self
            .definitions
            .lock()
            .get(table)
            .cloned()
            .ok_or_else(|| DbError::not_found(&self.name, table))?;
        definition.table = to_table.to_string();

        target.registry.reserve(to_table)?;
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
        self.remove_table(table)?;
        Ok(())
    }

    fn create_query(&self, table: &str) -> DbResult<TableDefinition> {
        self.definitions
            .lock()
            .get(table)
            .map(|definition| definition.to_display_form(&self.name))
            .ok_or_else(|| DbError::not_found(&self.name, table))
    }

    fn shutdown(&self) {
        self.registry.shutdown_all();
        self.definitions.lock().clear();
    }
}
