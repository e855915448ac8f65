//! Structured table definitions as stored in metadata records.
//!
//! A [`TableDefinition`] is the parsed form of a `CREATE TABLE` / `ATTACH TABLE`
//! statement. Records on disk always hold the *attach form*: the definition with
//! every creation-time-only clause removed, so replaying it at startup is
//! idempotent.


pub mod codec;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use codec::{JsonCodec, MetadataCodec};

/// Engines whose definition carries the stored `SELECT` query.
pub const VIEW_ENGINES: [&str; 2] = ["View", "MaterializedView"];

/// Returns true for view-like engines that keep their query in the record.
pub fn is_view_engine(engine: &str) -> bool {
    VIEW_ENGINES.contains(&engine)
}

/// Column types understood by the definition layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    Int,
    UInt,
    Float,
    Text,
    Bool,
    Date,
    DateTime,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Int => "INT",
            SqlType::UInt => "UINT",
            SqlType::Float => "FLOAT",
            SqlType::Text => "TEXT",
            SqlType::Bool => "BOOL",
            SqlType::Date => "DATE",
            SqlType::DateTime => "DATETIME",
        };
        f.write_str(name)
    }
}

/// Describes a logical column within a table definition.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: SqlType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Table engine clause: `ENGINE = name(params...)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Engine {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
}

impl Engine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params<I, S>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// Parsed `CREATE` / `ATTACH TABLE` statement.
///
/// # Example
/// ```
/// use definition::{Column, Engine, SqlType, TableDefinition};
///
/// let def = TableDefinition::builder()
///     .table("hits")
///     .columns(vec![Column::new("id", SqlType::UInt)])
///     .engine(Engine::new("Log"))
///     .if_not_exists(true)
///     .build();
///
/// let attach = def.to_attach_form("Log");
/// assert!(attach.attach);
/// assert!(!attach.if_not_exists);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, bon::Builder)]
pub struct TableDefinition {
    #[builder(default)]
    #[serde(default)]
    pub attach: bool,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[builder(into)]
    pub table: String,
    #[builder(default)]
    #[serde(default)]
    pub if_not_exists: bool,
    #[builder(default)]
    #[serde(default)]
    pub populate: bool,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_database: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_table: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub columns: Vec<Column>,
    pub engine: Engine,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
}

impl TableDefinition {
    /// Strips everything that only matters while the table is being created.
    ///
    /// The stored query survives only for view-like `engine`s.
    pub fn to_attach_form(&self, engine: &str) -> Self {
        let mut attach = self.clone();
        attach.attach = true;
        attach.database = None;
        attach.as_database = None;
        attach.as_table = None;
        attach.if_not_exists = false;
        attach.populate = false;
        if !is_view_engine(engine) {
            attach.select = None;
        }
        attach
    }

    /// Database-qualified `CREATE` form used for display.
    pub fn to_display_form(&self, database: &str) -> Self {
        let mut display = self.clone();
        display.attach = false;
        display.database = Some(database.to_string());
        display
    }

    /// Fully qualified name when the database is known.
    pub fn qualified_name(&self) -> String {
        match &self.database {
            Some(db) => format!("{}.{}", Ident(db), Ident(&self.table)),
            None => Ident(&self.table).to_string(),
        }
    }
}

impl fmt::Display for TableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.attach { "ATTACH" } else { "CREATE" })?;
        f.write_str(match self.engine.name.as_str() {
            "View" => " VIEW ",
            "MaterializedView" => " MATERIALIZED VIEW ",
            _ => " TABLE ",
        })?;
        if self.if_not_exists {
            f.write_str("IF NOT EXISTS ")?;
        }
        f.write_str(&self.qualified_name())?;

        if !self.columns.is_empty() {
            f.write_str(" (")?;
            for (idx, column) in self.columns.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{} {}", Ident(&column.name), column.ty)?;
            }
            f.write_str(")")?;
        }

        if !is_view_engine(&self.engine.name) {
            write!(f, " ENGINE = {}", self.engine.name)?;
            if !self.engine.params.is_empty() {
                write!(f, "({})", self.engine.params.join(", "))?;
            }
        }

        if let Some(as_table) = &self.as_table {
            f.write_str(" AS ")?;
            if let Some(as_db) = &self.as_database {
                write!(f, "{}.", Ident(as_db))?;
            }
            write!(f, "{}", Ident(as_table))?;
        }
        if self.populate {
            f.write_str(" POPULATE")?;
        }
        if let Some(select) = &self.select {
            write!(f, " AS {select}")?;
        }
        Ok(())
    }
}

/// Identifier that is back-quoted unless it is a plain word.
struct Ident<'a>(&'a str);

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plain = self
            .0
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && self.0.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            f.write_str(self.0)
        } else {
            write!(f, "`{}`", self.0.replace('`', "``"))
        }
    }
}
