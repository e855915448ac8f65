//! Property-based test generators using proptest.

use definition::{Column, Engine, SqlType, TableDefinition};
use proptest::prelude::*;

/// Strategy for table names, including names that need escaping on disk and
/// inner tables of materialized views.
///
/// # Example
///
/// ```
/// use proptest::prelude::*;
/// use testsupport::proptest_generators::arb_table_name;
///
/// proptest! {
///     #[test]
///     fn names_are_not_empty(name in arb_table_name()) {
///         assert!(!name.is_empty());
///     }
/// }
/// ```
pub fn arb_table_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9_]{0,12}",
        "[a-z]{1,6}[ .%/-][a-z]{1,6}",
        "[a-z]{1,8}".prop_map(|name| format!(".inner.{name}")),
    ]
}

/// Strategy for a set of distinct table names.
pub fn arb_table_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(arb_table_name(), 0..max).prop_map(|set| set.into_iter().collect())
}

pub fn arb_sql_type() -> impl Strategy<Value = SqlType> {
    prop_oneof![
        Just(SqlType::Int),
        Just(SqlType::UInt),
        Just(SqlType::Float),
        Just(SqlType::Text),
        Just(SqlType::Bool),
        Just(SqlType::Date),
        Just(SqlType::DateTime),
    ]
}

/// Strategy for `CREATE` definitions of any engine, views included.
pub fn arb_definition(table: String) -> impl Strategy<Value = TableDefinition> {
    (
        prop::collection::vec(("[a-z]{1,8}", arb_sql_type()), 0..5),
        prop_oneof![
            Just("Memory"),
            Just("Log"),
            Just("MergeTree"),
            Just("View"),
            Just("MaterializedView"),
        ],
        any::<bool>(),
        proptest::option::of("SELECT [a-z]{1,8} FROM [a-z]{1,8}"),
    )
        .prop_map(move |(columns, engine, if_not_exists, select)| TableDefinition {
            attach: false,
            database: Some("source_db".into()),
            table: table.clone(),
            if_not_exists,
            populate: engine == "MaterializedView",
            as_database: None,
            as_table: None,
            columns: columns
                .into_iter()
                .map(|(name, ty)| Column::new(name, ty))
                .collect(),
            engine: Engine::new(engine),
            select,
        })
}
