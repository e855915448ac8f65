use crate::TableDefinition;
use common::{DbError, DbResult};

/// Converts table definitions to and from the text stored in metadata records.
pub trait MetadataCodec: Send + Sync {
    /// Parse a record. `origin` names the source (usually the file path) for
    /// error messages.
    fn parse(&self, text: &str, origin: &str) -> DbResult<TableDefinition>;

    /// Canonical text for `definition`, without the trailing newline.
    fn format(&self, definition: &TableDefinition) -> DbResult<String>;
}

/// Stores definitions as pretty-printed JSON documents.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl MetadataCodec for JsonCodec {
    fn parse(&self, text: &str, origin: &str) -> DbResult<TableDefinition> {
        let definition: TableDefinition =
            serde_json::from_str(text.trim_end()).map_err(|err| DbError::Parse {
                origin: format!("in file {origin}"),
                message: err.to_string(),
            })?;
        if definition.table.is_empty() {
            return Err(DbError::Parse {
                origin: format!("in file {origin}"),
                message: "table name is empty".into(),
            });
        }
        Ok(definition)
    }

    fn format(&self, definition: &TableDefinition) -> DbResult<String> {
        serde_json::to_string_pretty(definition)
            .map_err(|err| DbError::Serialize(format!("table definition: {err}")))
    }
}
