use anyhow::{Context, Result};
use catalog::{EntryKind, MetadataEntry, MetadataStore};
use clap::{Parser, ValueEnum};
use common::pretty::{self, TableStyleKind};
use definition::{JsonCodec, MetadataCodec, TableDefinition};
use serde::Serialize;
use std::{fs, path::PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalog_viewer=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run() -> Result<()> {
    let args = Args::parse();

    let database = args.database.clone().unwrap_or_else(|| dir_name(&args.metadata_dir));
    let store = MetadataStore::new(database, &args.metadata_dir);
    let entries = store
        .scan()
        .with_context(|| format!("failed to scan metadata at {}", args.metadata_dir.display()))?;
    debug!(entries = entries.len(), "metadata directory scanned");

    let rows: Vec<RecordRow> = entries
        .into_iter()
        .filter(|entry| args.all || entry.kind == EntryKind::Record)
        .map(|entry| inspect(&JsonCodec, entry))
        .collect::<Result<_>>()?;

    if rows.is_empty() {
        println!("No metadata records found.");
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => println!("{}", render_records(&rows, args.style.into())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
    }
    Ok(())
}

fn dir_name(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(common::unescape_for_file_name)
        .unwrap_or_default()
}

#[derive(Parser, Debug)]
#[command(name = "catalog-viewer")]
#[command(about = "Inspect the metadata records of a database directory", long_about = None)]
struct Args {
    /// Metadata directory of one database
    metadata_dir: PathBuf,
    /// Database name used in messages (defaults to the directory name)
    #[arg(long)]
    database: Option<String>,
    /// Output format (table or json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    /// Style used for table rendering
    #[arg(long, value_enum, default_value_t = CliTableStyle::Modern)]
    style: CliTableStyle,
    /// Also list staged writes and backups
    #[arg(long)]
    all: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliTableStyle {
    Modern,
    Ascii,
    Plain,
}

impl From<CliTableStyle> for TableStyleKind {
    fn from(value: CliTableStyle) -> Self {
        match value {
            CliTableStyle::Modern => TableStyleKind::Modern,
            CliTableStyle::Ascii => TableStyleKind::Ascii,
            CliTableStyle::Plain => TableStyleKind::Plain,
        }
    }
}

const RECORD_HEADERS: [&str; 6] = ["File", "Kind", "Table", "Engine", "Size", "Status"];

#[derive(Debug, Serialize)]
struct RecordRow {
    file: String,
    kind: &'static str,
    table: Option<String>,
    engine: Option<String>,
    size: u64,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    definition: Option<TableDefinition>,
}

fn kind_name(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Record => "record",
        EntryKind::Staged => "staged",
        EntryKind::Backup => "backup",
    }
}

/// Read and decode one directory entry. Only records are parsed; a record
/// that fails to parse is reported in its row rather than aborting the run.
fn inspect(codec: &dyn MetadataCodec, entry: MetadataEntry) -> Result<RecordRow> {
    let size = fs::metadata(&entry.path)
        .with_context(|| format!("failed to stat {}", entry.path.display()))?
        .len();

    let mut row = RecordRow {
        file: entry.file_name,
        kind: kind_name(entry.kind),
        table: entry.table,
        engine: None,
        size,
        status: "-".into(),
        definition: None,
    };
    if entry.kind != EntryKind::Record {
        return Ok(row);
    }
    if size == 0 {
        row.status = "empty, removed on next open".into();
        return Ok(row);
    }

    let text = fs::read_to_string(&entry.path)
        .with_context(|| format!("failed to read {}", entry.path.display()))?;
    match codec.parse(&text, &entry.path.display().to_string()) {
        Ok(definition) => {
            row.engine = Some(definition.engine.name.clone());
            row.status = "ok".into();
            row.definition = Some(definition);
        }
        Err(err) => row.status = err.to_string(),
    }
    Ok(row)
}

fn render_records(rows: &[RecordRow], style: TableStyleKind) -> String {
    let cells = rows
        .iter()
        .map(|row| {
            vec![
                row.file.clone(),
                row.kind.to_string(),
                row.table.clone().unwrap_or_else(|| "-".into()),
                row.engine.clone().unwrap_or_else(|| "-".into()),
                pretty::format_size(row.size),
                row.status.clone(),
            ]
        })
        .collect();

    pretty::render_string_table(&RECORD_HEADERS, cells, style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn scan(dir: &std::path::Path) -> Vec<RecordRow> {
        MetadataStore::new("default", dir)
            .scan()
            .unwrap()
            .into_iter()
            .map(|entry| inspect(&JsonCodec, entry).unwrap())
            .collect()
    }

    #[test]
    fn record_rows_show_engine_and_parse_errors() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("hits.sql"),
            "{\"attach\": true, \"table\": \"hits\", \"engine\": {\"name\": \"Log\"}}\n",
        )
        .unwrap();
        fs::write(dir.path().join("broken.sql"), "ATTACH TABLE broken\n").unwrap();
        fs::write(dir.path().join("t3.sql"), "").unwrap();

        let rows = scan(dir.path());

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].file, "broken.sql");
        assert!(rows[0].status.contains("broken.sql"));
        assert_eq!(rows[1].engine.as_deref(), Some("Log"));
        assert_eq!(rows[1].status, "ok");
        assert_eq!(rows[2].status, "empty, removed on next open");
    }

    #[test]
    fn staged_entries_are_not_parsed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("t1.sql.tmp"), "partial").unwrap();

        let rows = scan(dir.path());
        assert_eq!(rows[0].kind, "staged");
        assert_eq!(rows[0].table.as_deref(), Some("t1"));
        assert_eq!(rows[0].status, "-");
        // scanning is read-only
        assert!(dir.path().join("t1.sql.tmp").exists());
    }

    #[test]
    fn rendered_table_lists_every_row() {
        let rows = vec![RecordRow {
            file: "hits.sql".into(),
            kind: "record",
            table: Some("hits".into()),
            engine: Some("Log".into()),
            size: 2048,
            status: "ok".into(),
            definition: None,
        }];

        let out = render_records(&rows, TableStyleKind::Ascii);
        assert!(out.contains("hits.sql"));
        assert!(out.contains("Engine"));
        assert!(out.contains("2.0 KiB"));
    }

    #[test]
    fn database_name_is_unescaped_from_directory() {
        assert_eq!(dir_name(std::path::Path::new("/data/metadata/my%20db")), "my db");
        assert_eq!(dir_name(std::path::Path::new("/data/metadata/bad-name")), "");
    }
}
