//! One metadata record per table inside a database directory.
//!
//! Records are named `<escaped table>.sql`. New records are staged as
//! `<escaped table>.sql.tmp`, synced, and renamed into place, so a record is
//! either absent or complete. Staged files left behind by a crash are removed
//! by the next [`MetadataStore::list`]. Files ending in `.sql.bak` are manual
//! backups and are ignored; hidden entries are skipped; anything else in the
//! directory is an error.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use common::{DbError, DbResult, escape_for_file_name, unescape_for_file_name};
use tracing::{debug, info, warn};

pub const RECORD_SUFFIX: &str = ".sql";
pub const STAGED_SUFFIX: &str = ".sql.tmp";
pub const BACKUP_SUFFIX: &str = ".sql.bak";

/// What a file in the metadata directory is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Record,
    Staged,
    Backup,
}

/// A classified file in the metadata directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataEntry {
    pub file_name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Decoded table name. Always present for records.
    pub table: Option<String>,
}

/// Metadata records of a single database.
#[derive(Clone, Debug)]
pub struct MetadataStore {
    database: String,
    dir: PathBuf,
}

impl MetadataStore {
    pub fn new(database: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, table: &str) -> PathBuf {
        self.dir
            .join(format!("{}{RECORD_SUFFIX}", escape_for_file_name(table)))
    }

    pub fn staged_path(&self, table: &str) -> PathBuf {
        self.dir
            .join(format!("{}{STAGED_SUFFIX}", escape_for_file_name(table)))
    }

    /// Classify every entry of the directory without touching it.
    pub fn scan(&self) -> DbResult<Vec<MetadataEntry>> {
        let read_err = |source| DbError::DirectoryRead {
            path: self.dir.clone(),
            source,
        };

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let os_name = entry.file_name();
            let Some(file_name) = os_name.to_str() else {
                return Err(self.invalid_name(&os_name.to_string_lossy()));
            };

            // .svn and friends
            if file_name.starts_with('.') {
                continue;
            }

            let (kind, stem) = if let Some(stem) = file_name.strip_suffix(BACKUP_SUFFIX) {
                (EntryKind::Backup, stem)
            } else if let Some(stem) = file_name.strip_suffix(STAGED_SUFFIX) {
                (EntryKind::Staged, stem)
            } else if let Some(stem) = file_name.strip_suffix(RECORD_SUFFIX) {
                (EntryKind::Record, stem)
            } else {
                return Err(self.invalid_name(file_name));
            };

            let table = unescape_for_file_name(stem);
            if kind == EntryKind::Record && table.is_none() {
                return Err(self.invalid_name(file_name));
            }

            entries.push(MetadataEntry {
                file_name: file_name.to_string(),
                path: entry.path(),
                kind,
                table,
            });
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    /// Names of all tables with a record, sorted by name.
    ///
    /// Staged files are deleted on the way.
    pub fn list(&self) -> DbResult<Vec<String>> {
        let mut tables = Vec::new();
        for entry in self.scan()? {
            match entry.kind {
                EntryKind::Record => tables.extend(entry.table),
                EntryKind::Staged => {
                    info!(database = %self.database, "Removing file {}", entry.path.display());
                    remove_if_exists(&entry.path)?;
                }
                EntryKind::Backup => debug!(file = %entry.file_name, "skipping backup"),
            }
        }
        tables.sort();
        Ok(tables)
    }

    /// True if `table` has a record or a staged write in progress.
    pub fn is_claimed(&self, table: &str) -> bool {
        self.record_path(table).exists() || self.staged_path(table).exists()
    }

    /// Read the whole record of `table`.
    pub fn read(&self, table: &str) -> DbResult<String> {
        let path = self.record_path(table);
        fs::read_to_string(&path).map_err(|err| self.not_found_or(table, path, err))
    }

    /// Durably write a new record for `table`.
    ///
    /// Fails with `AlreadyExists` if the record or a staged write for it exists.
    /// On failure no staged file is left behind.
    pub fn create(&self, table: &str, text: &str) -> DbResult<()> {
        let path = self.record_path(table);
        if path.exists() {
            return Err(DbError::already_exists(&self.database, table));
        }

        let staged = self.staged_path(table);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&staged) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(DbError::already_exists(&self.database, table));
            }
            Err(source) => {
                return Err(DbError::DurableWrite {
                    path: staged,
                    source,
                });
            }
        };

        let written = write_synced(&mut file, text);
        drop(file);
        if let Err(source) = written.and_then(|()| fs::rename(&staged, &path)) {
            discard(&staged);
            return Err(DbError::DurableWrite {
                path: staged,
                source,
            });
        }

        if let Err(source) = sync_dir(&self.dir) {
            discard(&path);
            return Err(DbError::DurableWrite { path, source });
        }
        debug!(database = %self.database, table, "metadata record created");
        Ok(())
    }

    /// Delete the record of `table`.
    pub fn remove(&self, table: &str) -> DbResult<()> {
        let path = self.record_path(table);
        fs::remove_file(&path).map_err(|err| self.not_found_or(table, path, err))
    }

    fn invalid_name(&self, name: &str) -> DbError {
        DbError::InvalidMetadataName {
            name: name.to_string(),
            dir: self.dir.clone(),
        }
    }

    fn not_found_or(&self, table: &str, path: PathBuf, err: io::Error) -> DbError {
        if err.kind() == io::ErrorKind::NotFound {
            DbError::MetadataNotFound {
                table: table.to_string(),
                path,
            }
        } else {
            DbError::Io(err)
        }
    }
}

fn write_synced(file: &mut File, text: &str) -> io::Result<()> {
    file.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.flush()?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

fn remove_if_exists(path: &Path) -> DbResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn discard(path: &Path) {
    if let Err(err) = remove_if_exists(path) {
        warn!("cannot remove {}: {err}", path.display());
    }
}
