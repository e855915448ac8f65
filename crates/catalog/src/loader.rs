//! Startup loading of every table recorded in a metadata directory.
//!
//! Inner tables of materialized views are loaded first, one by one on the
//! calling thread, because other tables may look them up while being built.
//! The remaining tables are split into chunks that run as independent jobs on
//! the worker pool (or serially when there is none). A failing table stops its
//! own chunk only; every chunk runs to completion before failures are
//! reported.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

use common::{Config, DbError, DbResult};
use definition::MetadataCodec;
use parking_lot::Mutex;
use rayon::{ThreadPool, prelude::*};
use tracing::{debug, error, info};

use crate::{TableBuilder, registry::TableRegistry, store::MetadataStore};

/// Name prefix of the tables backing materialized views.
pub const INNER_TABLE_PREFIX: &str = ".inner.";

/// Returns true for tables that must exist before any other table is built.
pub fn is_priority_table(name: &str) -> bool {
    name.starts_with(INNER_TABLE_PREFIX)
}

/// Outcome of a successful load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Tables attached to the registry.
    pub loaded: usize,
    /// Zero-length records that were deleted.
    pub removed_empty: usize,
}

pub(crate) struct Loader<'a> {
    database: &'a str,
    store: &'a MetadataStore,
    registry: &'a TableRegistry,
    codec: &'a dyn MetadataCodec,
    builder: &'a dyn TableBuilder,
    config: &'a Config,
    loaded: AtomicUsize,
    removed_empty: AtomicUsize,
}

impl<'a> Loader<'a> {
    pub(crate) fn new(
        database: &'a str,
        store: &'a MetadataStore,
        registry: &'a TableRegistry,
        codec: &'a dyn MetadataCodec,
        builder: &'a dyn TableBuilder,
        config: &'a Config,
    ) -> Self {
        Self {
            database,
            store,
            registry,
            codec,
            builder,
            config,
            loaded: AtomicUsize::new(0),
            removed_empty: AtomicUsize::new(0),
        }
    }

    /// Load every table of the store into the registry.
    pub(crate) fn load(&self, pool: Option<&ThreadPool>) -> DbResult<LoadStats> {
        let (first, rest): (Vec<String>, Vec<String>) = self
            .store
            .list()?
            .into_iter()
            .partition(|name| is_priority_table(name));

        info!(database = self.database, "Total {} tables.", rest.len());

        if !first.is_empty() {
            info!(
                database = self.database,
                "Loading inner tables for materialized views (total {} tables).",
                first.len()
            );
            for name in &first {
                self.load_table(name)?;
            }
        }

        let progress = Progress::new(
            self.database,
            rest.len(),
            self.config.progress_every_tables,
            self.config.progress_interval,
        );
        let chunks: Vec<&[String]> = rest.chunks(self.config.load_chunk_size.max(1)).collect();

        let results: Vec<DbResult<()>> = match pool {
            Some(pool) => pool.install(|| {
                chunks
                    .par_iter()
                    .with_max_len(1)
                    .map(|chunk| self.load_chunk(chunk, &progress))
                    .collect()
            }),
            None => chunks
                .iter()
                .map(|chunk| self.load_chunk(chunk, &progress))
                .collect(),
        };

        let mut failures: Vec<DbError> = results.into_iter().filter_map(Result::err).collect();
        match failures.len() {
            0 => Ok(LoadStats {
                loaded: self.loaded.load(Ordering::Relaxed),
                removed_empty: self.removed_empty.load(Ordering::Relaxed),
            }),
            1 => Err(failures.remove(0)),
            _ => Err(DbError::Bootstrap {
                database: self.database.to_string(),
                failures,
            }),
        }
    }

    fn load_chunk(&self, names: &[String], progress: &Progress) -> DbResult<()> {
        for name in names {
            progress.tick();
            self.load_table(name)?;
        }
        Ok(())
    }

    fn load_table(&self, name: &str) -> DbResult<()> {
        let path = self.store.record_path(name);
        let cannot_build = |source: DbError| DbError::CannotBuildTable {
            path: path.clone(),
            source: Box::new(source),
        };
        let text = self.store.read(name).map_err(|err| match err {
            err @ DbError::MetadataNotFound { .. } => err,
            err => cannot_build(err),
        })?;

        // Left behind by an unclean shutdown.
        if text.is_empty() {
            error!(database = self.database, "File {} is empty. Removing.", path.display());
            self.store.remove(name)?;
            self.removed_empty.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let origin = path.display().to_string();
        let table = self
            .codec
            .parse(&text, &origin)
            .and_then(|mut definition| {
                definition.attach = true;
                definition.database = Some(self.database.to_string());
                self.builder.build(&definition, self.database)
            })
            .map_err(cannot_build)?;

        self.registry.attach(name, table)?;
        self.loaded.fetch_add(1, Ordering::Relaxed);
        debug!(database = self.database, table = name, "table loaded");
        Ok(())
    }
}

/// Periodic percentage reports while a large database loads.
struct Progress<'a> {
    database: &'a str,
    total: usize,
    every: usize,
    interval: Duration,
    processed: AtomicUsize,
    last_report: Mutex<Instant>,
}

impl<'a> Progress<'a> {
    fn new(database: &'a str, total: usize, every: usize, interval: Duration) -> Self {
        Self {
            database,
            total,
            every,
            interval,
            processed: AtomicUsize::new(0),
            last_report: Mutex::new(Instant::now()),
        }
    }

    fn tick(&self) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        let by_count = self.every > 0 && processed % self.every == 0;

        let mut last_report = self.last_report.lock();
        if by_count || last_report.elapsed() >= self.interval {
            info!(
                database = self.database,
                "{:.2}%",
                processed as f64 * 100.0 / self.total.max(1) as f64
            );
            *last_report = Instant::now();
        }
    }
}
