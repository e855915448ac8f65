//! End-to-end catalog scenarios against a real temporary data directory.

use std::{fs, sync::Arc, thread};

use catalog::{Catalog, MemoryDatabase, TableHandle};
use common::DbError;
use definition::{JsonCodec, MetadataCodec};
use testsupport::prelude::*;

#[test]
fn test_inner_tables_load_before_everything_else() {
    let ctx = TestCatalog::new().unwrap();
    for name in ["t2", "mv1", ".inner.mv1", "t1"] {
        ctx.write_record("default", name, &table_definition(name, "Memory"))
            .unwrap();
    }

    let db = ctx.open("default").unwrap();

    assert_tables(&db, &[".inner.mv1", "mv1", "t1", "t2"]);
    let built = ctx.builder().built();
    assert_eq!(built[0].table, ".inner.mv1");
    assert_eq!(built[0].thread, thread::current().id());
    assert!(built.iter().all(|b| b.database == "default"));
}

#[test]
fn test_staged_files_are_discarded_on_open() {
    let ctx = TestCatalog::new().unwrap();
    ctx.write_record("default", "t1", &table_definition("t1", "Log"))
        .unwrap();
    let staged = ctx.write_raw("default", "t2.sql.tmp", "{\"table\": ").unwrap();

    let db = ctx.open("default").unwrap();

    assert_tables(&db, &["t1"]);
    assert!(!staged.exists());
    assert_eq!(dir_entries(db.metadata_dir()), vec!["t1.sql"]);
}

#[test]
fn test_empty_record_is_removed_on_open() {
    let ctx = TestCatalog::new().unwrap();
    ctx.write_record("default", "t1", &table_definition("t1", "Log"))
        .unwrap();
    let empty = ctx.write_raw("default", "t3.sql", "").unwrap();

    let db = ctx.open_serial("default").unwrap();

    assert_tables(&db, &["t1"]);
    assert!(!empty.exists());
    assert_eq!(db.load_stats().removed_empty, 1);
    assert_eq!(db.load_stats().loaded, 1);
}

#[test]
fn test_backups_and_hidden_entries_are_ignored() {
    let ctx = TestCatalog::new().unwrap();
    ctx.write_raw("default", "old.sql.bak", "anything").unwrap();
    ctx.write_raw("default", ".keep", "").unwrap();

    let db = ctx.open("default").unwrap();
    assert_tables(&db, &[]);
}

#[test]
fn test_foreign_file_fails_open() {
    let ctx = TestCatalog::new().unwrap();
    ctx.write_raw("default", "README", "hello").unwrap();

    assert_error_contains(ctx.open("default"), "README");
}

#[test]
fn test_reopen_gives_same_tables() {
    let ctx = TestCatalog::new().unwrap();
    let db = ctx.open("default").unwrap();
    for name in ["hits", "visits", "with space", ".inner.daily"] {
        ctx.create(&db, name, "Log").unwrap();
    }
    let before: Vec<String> = db
        .snapshot()
        .names()
        .into_iter()
        .map(String::from)
        .collect();
    db.shutdown();

    let first = ctx.open("default").unwrap();
    first.shutdown();
    let second = ctx.open("default").unwrap();

    let after: Vec<String> = second
        .snapshot()
        .names()
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_failed_open_shuts_down_loaded_tables() {
    let ctx = TestCatalog::with_builder(RecordingBuilder::new().failing_table("t2")).unwrap();
    for name in ["t1", "t2", "t3"] {
        ctx.write_record("default", name, &table_definition(name, "Log"))
            .unwrap();
    }

    let err = ctx.open("default").err().unwrap();

    assert!(err.to_string().contains("t2.sql"), "{err}");
    for name in ["t1", "t3"] {
        assert!(ctx.builder().handle(name).unwrap().is_shut_down(), "{name}");
    }
}

#[test]
fn test_every_failing_chunk_is_reported() {
    let ctx = TestCatalog::with_builder(RecordingBuilder::new().failing_engine("Broken")).unwrap();
    // chunks: [t0, t1] [t2, t3]
    for (name, engine) in [("t0", "Log"), ("t1", "Broken"), ("t2", "Log"), ("t3", "Broken")] {
        ctx.write_record("default", name, &table_definition(name, engine))
            .unwrap();
    }

    let err = ctx.open("default").err().unwrap();

    assert!(matches!(err, DbError::Bootstrap { .. }), "{err}");
    assert_eq!(err.failures().len(), 2);
    let mut built = ctx.builder().built_names();
    built.sort();
    assert_eq!(built, vec!["t0", "t2"]);
}

#[test]
fn test_duplicate_create_is_rejected_after_reopen() {
    let ctx = TestCatalog::new().unwrap();
    let db = ctx.open("default").unwrap();
    ctx.create(&db, "hits", "Log").unwrap();
    assert_already_exists(ctx.create(&db, "hits", "Log"));
    db.shutdown();

    let db = ctx.open("default").unwrap();
    assert_already_exists(ctx.create(&db, "hits", "Memory"));
    assert_eq!(db.get("hits").unwrap().engine(), "Log");
}

#[test]
fn test_concurrent_creates_of_distinct_names() {
    let ctx = TestCatalog::new().unwrap();
    let db = ctx.open("default").unwrap();

    thread::scope(|s| {
        for i in 0..8 {
            let (ctx, db) = (&ctx, &db);
            s.spawn(move || ctx.create(db, &format!("t{i}"), "Log").unwrap());
        }
    });

    assert_eq!(db.snapshot().len(), 8);
    assert_eq!(db.store().list().unwrap().len(), 8);
}

#[test]
fn test_removed_table_stays_removed() {
    let ctx = TestCatalog::new().unwrap();
    let db = ctx.open("default").unwrap();
    let handle = ctx.create(&db, "hits", "Log").unwrap();
    ctx.create(&db, "visits", "Log").unwrap();

    let removed = db.remove_table("hits").unwrap();
    assert_eq!(removed.engine(), handle.engine());
    assert_not_found(db.get("hits"));
    db.shutdown();

    let db = ctx.open("default").unwrap();
    assert_tables(&db, &["visits"]);
}

#[test]
fn test_record_holds_attach_form() {
    let ctx = TestCatalog::new().unwrap();
    let db = ctx.open("default").unwrap();
    let statement = create_statement("default", "hits", "Log");
    db.create_table("hits", Arc::new(MemoryTable::new("Log")), &statement, "Log")
        .unwrap();

    let text = db.store().read("hits").unwrap();
    let stored = JsonCodec.parse(&text, "hits.sql").unwrap();
    assert!(stored.attach);
    assert!(!stored.if_not_exists);
    assert_eq!(stored.database, None);
    assert_eq!(stored.select, None);
    assert_eq!(stored.columns, statement.columns);
}

#[test]
fn test_create_query_of_view_keeps_select() {
    let ctx = TestCatalog::new().unwrap();
    let db = ctx.open("default").unwrap();
    let view = view_definition("big_ids", "default.hits");
    db.create_table("big_ids", Arc::new(MemoryTable::new("View")), &view, "View")
        .unwrap();
    db.shutdown();

    let db = ctx.open("default").unwrap();
    let query = db.create_query("big_ids").unwrap();

    assert!(!query.attach);
    assert_eq!(query.database.as_deref(), Some("default"));
    assert_eq!(query.select, view.select);
    let reparsed = JsonCodec
        .parse(&JsonCodec.format(&query).unwrap(), "query")
        .unwrap();
    assert_eq!(reparsed, query);
}

#[test]
fn test_rename_moves_record_between_databases() {
    let ctx = TestCatalog::new().unwrap();
    let a = ctx.open("a").unwrap();
    let b = ctx.open("b").unwrap();
    let handle = ctx.create(&a, "hits", "Log").unwrap();

    a.rename_table("hits", &b, "events").unwrap();

    assert_tables(&a, &[]);
    assert_tables(&b, &["events"]);
    let calls = handle.renames();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].database, "b");
    assert_eq!(calls[0].table, "events");
    assert_eq!(calls[0].data_path, b.data_path());
    assert_eq!(b.create_query("events").unwrap().table, "events");

    a.shutdown();
    b.shutdown();
    assert_tables(&ctx.open("a").unwrap(), &[]);
    assert_tables(&ctx.open("b").unwrap(), &["events"]);
}

#[test]
fn test_refused_rename_leaves_both_databases_alone() {
    let ctx = TestCatalog::new().unwrap();
    let a = ctx.open("a").unwrap();
    let b = ctx.open("b").unwrap();
    a.create_table(
        "hits",
        Arc::new(MemoryTable::read_only("Log")),
        &table_definition("hits", "Log"),
        "Log",
    )
    .unwrap();

    let err = a.rename_table("hits", &b, "hits").unwrap_err();

    assert!(matches!(err, DbError::RenameUnsupported { .. }), "{err}");
    assert_tables(&a, &["hits"]);
    assert_tables(&b, &[]);
    assert_eq!(dir_entries(a.metadata_dir()), vec!["hits.sql"]);
    assert!(dir_entries(b.metadata_dir()).is_empty());
}

#[test]
fn test_rename_onto_staged_write_keeps_data_in_place() {
    let ctx = TestCatalog::new().unwrap();
    let a = ctx.open("a").unwrap();
    let b = ctx.open("b").unwrap();
    let handle = ctx.create(&a, "hits", "Log").unwrap();
    ctx.write_raw("b", "events.sql.tmp", "{\"table\": ").unwrap();

    assert_already_exists(a.rename_table("hits", &b, "events"));

    assert!(handle.renames().is_empty());
    assert_tables(&a, &["hits"]);
    assert_tables(&b, &[]);
}

#[test]
fn test_empty_table_name_is_rejected() {
    let ctx = TestCatalog::new().unwrap();
    let db = ctx.open("default").unwrap();

    assert!(matches!(
        ctx.create(&db, "", "Log").err().unwrap(),
        DbError::EmptyTableName { .. }
    ));
    assert!(dir_entries(db.metadata_dir()).is_empty());
    db.shutdown();

    assert_tables(&ctx.open("default").unwrap(), &[]);
}

#[test]
fn test_rename_into_memory_database_is_unsupported() {
    let ctx = TestCatalog::new().unwrap();
    let db = ctx.open("default").unwrap();
    ctx.create(&db, "hits", "Log").unwrap();
    let scratch = MemoryDatabase::new("scratch", ctx.config().data_path("scratch"));

    let err = db.rename_table("hits", &scratch, "hits").unwrap_err();

    assert!(matches!(err, DbError::UnsupportedOperation(_)), "{err}");
    assert_tables(&db, &["hits"]);
    assert_tables(&scratch, &[]);
}

#[test]
fn test_databases_with_unusual_names_are_isolated() {
    let ctx = TestCatalog::new().unwrap();
    let odd = ctx.open("my db/1").unwrap();
    let plain = ctx.open("plain").unwrap();
    ctx.create(&odd, "t", "Log").unwrap();

    assert_tables(&plain, &[]);
    assert!(odd.metadata_dir().ends_with("my%20db%2F1"));
    assert!(fs::metadata(odd.metadata_dir().join("t.sql")).is_ok());
}

mod proptest_tests {
    use proptest::prelude::*;
    use testsupport::{prelude::*, proptest_generators::*};

    use catalog::Catalog;
    use definition::{JsonCodec, MetadataCodec};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_created_tables_survive_reopen(names in arb_table_names(12)) {
            let ctx = TestCatalog::new().unwrap();
            let db = ctx.open("default").unwrap();
            for name in &names {
                ctx.create(&db, name, "Log").unwrap();
            }
            db.shutdown();

            let reopened = ctx.open("default").unwrap();
            let expected: Vec<&str> = names.iter().map(String::as_str).collect();
            assert_tables(&reopened, &expected);
        }

        #[test]
        fn prop_stored_definition_matches_attach_form(
            definition in arb_table_name().prop_flat_map(arb_definition)
        ) {
            let ctx = TestCatalog::new().unwrap();
            let db = ctx.open("default").unwrap();
            let engine = definition.engine.name.clone();
            db.create_table(
                &definition.table,
                std::sync::Arc::new(MemoryTable::new(engine.as_str())),
                &definition,
                &engine,
            )
            .unwrap();

            let text = db.store().read(&definition.table).unwrap();
            let stored = JsonCodec.parse(&text, "record").unwrap();
            prop_assert_eq!(stored, definition.to_attach_form(&engine));
        }
    }
}
