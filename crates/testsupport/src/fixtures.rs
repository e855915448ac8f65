//! In-memory table engines and definition builders.
//!
//! [`MemoryTable`] stands in for a real storage engine and records the rename
//! and shutdown calls it receives. [`RecordingBuilder`] builds them from
//! definitions, remembers which thread built which table, and can be told to
//! fail for chosen engines or tables.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, ThreadId},
};

use catalog::{TableBuilder, TableHandle, TableRef};
use common::{DbError, DbResult};
use definition::{Column, Engine, SqlType, TableDefinition};
use parking_lot::Mutex;

/// A rename request received by a [`MemoryTable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenameCall {
    pub data_path: PathBuf,
    pub database: String,
    pub table: String,
}

/// Table handle without storage.
///
/// # Example
///
/// ```
/// use catalog::TableHandle;
/// use testsupport::prelude::*;
///
/// let table = MemoryTable::new("Log");
/// table.shutdown();
/// assert!(table.is_shut_down());
/// ```
#[derive(Debug)]
pub struct MemoryTable {
    engine: String,
    read_only: bool,
    shut_down: AtomicBool,
    renames: Mutex<Vec<RenameCall>>,
}

impl MemoryTable {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            read_only: false,
            shut_down: AtomicBool::new(false),
            renames: Mutex::new(Vec::new()),
        }
    }

    /// A table whose storage refuses to move.
    pub fn read_only(engine: impl Into<String>) -> Self {
        Self {
            read_only: true,
            ..Self::new(engine)
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn renames(&self) -> Vec<RenameCall> {
        self.renames.lock().clone()
    }
}

impl TableHandle for MemoryTable {
    fn engine(&self) -> String {
        self.engine.clone()
    }

    fn rename(&self, data_path: &Path, database: &str, table: &str) -> DbResult<()> {
        if self.read_only {
            return Err(DbError::RenameUnsupported {
                table: table.to_string(),
                reason: format!("{} table is read-only", self.engine),
            });
        }
        self.renames.lock().push(RenameCall {
            data_path: data_path.to_path_buf(),
            database: database.to_string(),
            table: table.to_string(),
        });
        Ok(())
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// A table built by [`RecordingBuilder`].
#[derive(Clone, Debug)]
pub struct BuiltTable {
    pub table: String,
    pub database: String,
    pub thread: ThreadId,
    pub handle: Arc<MemoryTable>,
}

/// Builds [`MemoryTable`]s and records every call.
#[derive(Default)]
pub struct RecordingBuilder {
    failing_engines: Vec<String>,
    failing_tables: Vec<String>,
    built: Mutex<Vec<BuiltTable>>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every table using `engine`.
    pub fn failing_engine(mut self, engine: impl Into<String>) -> Self {
        self.failing_engines.push(engine.into());
        self
    }

    /// Fail the table called `table`.
    pub fn failing_table(mut self, table: impl Into<String>) -> Self {
        self.failing_tables.push(table.into());
        self
    }

    /// Every successful build, in the order they happened.
    pub fn built(&self) -> Vec<BuiltTable> {
        self.built.lock().clone()
    }

    pub fn built_names(&self) -> Vec<String> {
        self.built.lock().iter().map(|b| b.table.clone()).collect()
    }

    /// Handle built for `table`, if any.
    pub fn handle(&self, table: &str) -> Option<Arc<MemoryTable>> {
        self.built
            .lock()
            .iter()
            .rev()
            .find(|b| b.table == table)
            .map(|b| b.handle.clone())
    }
}

impl TableBuilder for RecordingBuilder {
    fn build(&self, definition: &TableDefinition, database: &str) -> DbResult<TableRef> {
        if self.failing_engines.contains(&definition.engine.name)
            || self.failing_tables.contains(&definition.table)
        {
            return Err(DbError::Engine(format!(
                "cannot build {database}.{} with engine {}",
                definition.table, definition.engine.name
            )));
        }
        let handle = Arc::new(MemoryTable::new(definition.engine.name.clone()));
        self.built.lock().push(BuiltTable {
            table: definition.table.clone(),
            database: database.to_string(),
            thread: thread::current().id(),
            handle: handle.clone(),
        });
        Ok(handle)
    }
}

/// A plain table definition with two columns.
pub fn table_definition(table: &str, engine: &str) -> TableDefinition {
    TableDefinition::builder()
        .table(table)
        .columns(vec![
            Column::new("id", SqlType::UInt),
            Column::new("payload", SqlType::Text),
        ])
        .engine(Engine::new(engine))
        .build()
}

/// A `CREATE` statement as a user would issue it, including clauses that do
/// not belong in metadata records.
pub fn create_statement(database: &str, table: &str, engine: &str) -> TableDefinition {
    TableDefinition {
        database: Some(database.to_string()),
        if_not_exists: true,
        select: Some(format!("SELECT * FROM {database}.source")),
        ..table_definition(table, engine)
    }
}

/// A view over `source`.
pub fn view_definition(table: &str, source: &str) -> TableDefinition {
    TableDefinition::builder()
        .table(table)
        .engine(Engine::new("View"))
        .select(format!("SELECT id FROM {source} WHERE id > 10"))
        .build()
}
