
pub mod escape;
pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub use escape::{escape_for_file_name, unescape_for_file_name};

/// Canonical error type shared across catalog subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("table {database}.{table} already exists")]
    AlreadyExists { database: String, table: String },
    #[error("table {database}.{table} doesn't exist")]
    NotFound { database: String, table: String },
    #[error("empty table name in database {database}")]
    EmptyTableName { database: String },
    #[error("creation of table {database}.{table} was interrupted by shutdown")]
    CreateInterrupted { database: String, table: String },
    #[error("metadata for table '{table}' not found at {}", .path.display())]
    MetadataNotFound { table: String, path: PathBuf },
    #[error("incorrect file name '{name}' in metadata directory {}", .dir.display())]
    InvalidMetadataName { name: String, dir: PathBuf },
    #[error("cannot create table from metadata file {}: {source}", .path.display())]
    CannotBuildTable {
        path: PathBuf,
        source: Box<DbError>,
    },
    #[error("serialize: {0}")]
    Serialize(String),
    #[error("parse error {origin}: {message}")]
    Parse { origin: String, message: String },
    #[error("table '{table}' cannot be renamed: {reason}")]
    RenameUnsupported { table: String, reason: String },
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    #[error("cannot read metadata directory {}: {source}", .path.display())]
    DirectoryRead { path: PathBuf, source: io::Error },
    #[error("durable write of {} failed: {source}", .path.display())]
    DurableWrite { path: PathBuf, source: io::Error },
    #[error("{} table(s) failed to load in database '{database}': {}", .failures.len(), join_failures(.failures))]
    Bootstrap {
        database: String,
        failures: Vec<DbError>,
    },
    #[error("engine: {0}")]
    Engine(String),
    #[error("worker pool: {0}")]
    WorkerPool(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn join_failures(failures: &[DbError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DbError {
    pub fn already_exists(database: &str, table: &str) -> Self {
        Self::AlreadyExists {
            database: database.to_string(),
            table: table.to_string(),
        }
    }

    pub fn not_found(database: &str, table: &str) -> Self {
        Self::NotFound {
            database: database.to_string(),
            table: table.to_string(),
        }
    }

    /// Every leaf failure, flattening `Bootstrap` aggregates.
    pub fn failures(&self) -> Vec<&DbError> {
        match self {
            Self::Bootstrap { failures, .. } => failures.iter().flat_map(|f| f.failures()).collect(),
            other => vec![other],
        }
    }
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the catalog.
///
/// # Example
/// ```
/// use common::Config;
/// use std::{path::PathBuf, time::Duration};
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .load_chunk_size(50)
///     .progress_interval(Duration::from_secs(1))
///     .build();
/// assert_eq!(config.progress_every_tables, 256);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Root directory holding `metadata/` and `data/` for every database.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Number of tables one bootstrap job loads.
    #[builder(default = 100)]
    pub load_chunk_size: usize,
    /// Report bootstrap progress after this many tables.
    #[builder(default = 256)]
    pub progress_every_tables: usize,
    /// Report bootstrap progress at least this often.
    #[builder(default = Duration::from_secs(5))]
    pub progress_interval: Duration,
    /// Worker threads for bootstrap; `None` lets the pool pick.
    pub load_threads: Option<usize>,
}

impl Config {
    /// Directory with the metadata records of `database`.
    pub fn metadata_dir(&self, database: &str) -> PathBuf {
        database_dir(&self.data_dir.join("metadata"), database)
    }

    /// Directory with the table data of `database`.
    pub fn data_path(&self, database: &str) -> PathBuf {
        database_dir(&self.data_dir.join("data"), database)
    }
}

fn database_dir(root: &Path, database: &str) -> PathBuf {
    root.join(escape_for_file_name(database))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            load_chunk_size: 100,
            progress_every_tables: 256,
            progress_interval: Duration::from_secs(5),
            load_threads: None,
        }
    }
}
