//! Minimal table engine for the unit tests of this crate.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, ThreadId},
};

use common::{DbError, DbResult};
use definition::TableDefinition;
use parking_lot::Mutex;

use crate::{TableBuilder, TableHandle, TableRef};

pub(crate) struct StubTable {
    engine: String,
    renamable: bool,
    shut_down: AtomicBool,
    renames: Mutex<Vec<(PathBuf, String, String)>>,
}

impl StubTable {
    pub(crate) fn new(engine: &str) -> Self {
        Self {
            engine: engine.to_string(),
            renamable: true,
            shut_down: AtomicBool::new(false),
            renames: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn pinned(engine: &str) -> Self {
        Self {
            renamable: false,
            ..Self::new(engine)
        }
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub(crate) fn renames(&self) -> Vec<(PathBuf, String, String)> {
        self.renames.lock().clone()
    }
}

impl TableHandle for StubTable {
    fn engine(&self) -> String {
        self.engine.clone()
    }

    fn rename(&self, data_path: &Path, database: &str, table: &str) -> DbResult<()> {
        if !self.renamable {
            return Err(DbError::RenameUnsupported {
                table: table.to_string(),
                reason: "pinned".into(),
            });
        }
        self.renames
            .lock()
            .push((data_path.to_path_buf(), database.to_string(), table.to_string()));
        Ok(())
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Builds [`StubTable`]s; the engine `Broken` fails.
#[derive(Default)]
pub(crate) struct StubBuilder {
    built: Mutex<Vec<(String, ThreadId)>>,
}

impl StubBuilder {
    pub(crate) fn built(&self) -> Vec<(String, ThreadId)> {
        self.built.lock().clone()
    }
}

impl TableBuilder for StubBuilder {
    fn build(&self, definition: &TableDefinition, _database: &str) -> DbResult<TableRef> {
        if definition.engine.name == "Broken" {
            return Err(DbError::Engine(format!(
                "engine Broken cannot serve {}",
                definition.table
            )));
        }
        self.built
            .lock()
            .push((definition.table.clone(), thread::current().id()));
        Ok(Arc::new(StubTable::new(&definition.engine.name)))
    }
}
