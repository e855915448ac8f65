//! In-memory map of attached tables.
//!
//! One mutex guards the map. It is only held for map reads and writes, never
//! across file I/O or table construction, with the single exception of
//! [`TableRegistry::shutdown_all`] which calls each table's shutdown hook.

use ahash::RandomState;
use common::{DbError, DbResult};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;

use crate::{TableHandle, TableRef};

type Map<K, V> = HashMap<K, V, RandomState>;
type Set<K> = HashSet<K, RandomState>;

#[derive(Default)]
struct State {
    tables: Map<String, TableRef>,
    /// Names claimed by a create that has not finished yet.
    reserved: Set<String>,
}

/// Name to table handle mapping of one database.
pub struct TableRegistry {
    database: String,
    state: Mutex<State>,
}

impl TableRegistry {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state.lock().tables.contains_key(name)
    }

    pub fn try_get(&self, name: &str) -> Option<TableRef> {
        self.state.lock().tables.get(name).cloned()
    }

    /// Insert `table`; fails if `name` is attached or being created.
    pub fn attach(&self, name: &str, table: TableRef) -> DbResult<()> {
        let mut state = self.state.lock();
        if state.tables.contains_key(name) || state.reserved.contains(name) {
            return Err(DbError::already_exists(&self.database, name));
        }
        state.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Remove and return the handle of `name`.
    pub fn detach(&self, name: &str) -> DbResult<TableRef> {
        self.state
            .lock()
            .tables
            .remove(name)
            .ok_or_else(|| DbError::not_found(&self.database, name))
    }

    /// Claim `name` for a create in progress.
    ///
    /// Empty names are rejected: they have no record file the next bootstrap
    /// would find.
    pub fn reserve(&self, name: &str) -> DbResult<()> {
        if name.is_empty() {
            return Err(DbError::EmptyTableName {
                database: self.database.clone(),
            });
        }
        let mut state = self.state.lock();
        if state.tables.contains_key(name) || !state.reserved.insert(name.to_string()) {
            return Err(DbError::already_exists(&self.database, name));
        }
        Ok(())
    }

    /// Give up a claim taken with [`reserve`](Self::reserve).
    pub fn release(&self, name: &str) {
        self.state.lock().reserved.remove(name);
    }

    /// Replace the claim on `name` with `table`.
    ///
    /// Fails if the claim was dropped by [`shutdown_all`](Self::shutdown_all)
    /// in the meantime.
    pub fn commit(&self, name: &str, table: TableRef) -> DbResult<()> {
        let mut state = self.state.lock();
        if !state.reserved.remove(name) {
            return Err(DbError::CreateInterrupted {
                database: self.database.clone(),
                table: name.to_string(),
            });
        }
        state.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Copy of the current mapping, sorted by name.
    pub fn snapshot(&self) -> Snapshot {
        let mut entries: Vec<(String, TableRef)> = self
            .state
            .lock()
            .tables
            .iter()
            .map(|(name, table)| (name.clone(), table.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Snapshot { entries }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tables.len()
    }

    /// Shut down every attached table, clear the mapping and drop pending
    /// claims so in-flight creates cannot publish afterwards.
    pub fn shutdown_all(&self) {
        let mut state = self.state.lock();
        for table in state.tables.values() {
            table.shutdown();
        }
        state.tables.clear();
        state.reserved.clear();
    }
}

/// Point-in-time copy of a registry; can be iterated any number of times.
#[derive(Clone, Default)]
pub struct Snapshot {
    entries: Vec<(String, TableRef)>,
}

impl Snapshot {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableRef)> + '_ {
        self.entries
            .iter()
            .map(|(name, table)| (name.as_str(), table))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a str, &'a TableRef);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a TableRef)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, TableRef);
    type IntoIter = std::vec::IntoIter<(String, TableRef)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
