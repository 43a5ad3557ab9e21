//! End-to-end sync behavior: publishing, idempotence, failure isolation

mod common;

use common::{numbered_csv, TestFixture};
use repoquery::catalog::{Catalog, ColumnType};
use repoquery::fetcher::RepoSnapshot;
use repoquery::RepoqueryError;

#[test]
fn test_reads_fail_before_first_sync() {
    let fixture = TestFixture::new().unwrap();
    assert!(fixture.store.current_paths().is_err());

    let response = fixture
        .dispatcher()
        .dispatch("list_tables", &serde_json::json!({}));
    assert_eq!(response["ok"], false);
    assert_eq!(response["error"]["kind"], "internal");
}

#[test]
fn test_sync_publishes_consistent_generation() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_file("data/sales.csv", &numbered_csv(36))
        .unwrap();
    fixture.create_file("readme.md", "# dataset\n").unwrap();

    let report = fixture.sync().unwrap();
    assert_eq!(report.files_synced, 2);
    assert_eq!(report.tables_indexed, 1);
    assert_eq!(report.tables_failed, 0);

    // Catalog, manifest, and pointer all name the same generation
    let generation = fixture.store.current_paths().unwrap();
    assert_eq!(generation.id, report.generation);

    let catalog = Catalog::load(&generation.catalog_path).unwrap();
    assert_eq!(catalog.generation, generation.id);
    let snapshot = RepoSnapshot::load(&generation.manifest_path).unwrap();
    assert_eq!(snapshot.generation, generation.id);

    let sales = catalog.require("sales").unwrap();
    assert_eq!(sales.row_count, 36);
    assert_eq!(sales.source_path, "data/sales.csv");
}

#[test]
fn test_sync_is_idempotent() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_csv(
            "metrics.csv",
            &[
                vec!["day", "visits", "rate"],
                vec!["2023-01-01", "100", "0.5"],
                vec!["2023-01-02", "250", "1.25"],
            ],
        )
        .unwrap();

    let first = fixture.sync().unwrap();
    let first_catalog =
        Catalog::load(&fixture.store.current_paths().unwrap().catalog_path).unwrap();

    let second = fixture.sync().unwrap();
    let second_catalog =
        Catalog::load(&fixture.store.current_paths().unwrap().catalog_path).unwrap();

    // A new generation is published each time
    assert_ne!(first.generation, second.generation);
    assert_eq!(
        fixture.store.current_paths().unwrap().id,
        second.generation
    );

    // But the catalog content is identical modulo timestamps
    assert_eq!(first_catalog.tables.len(), second_catalog.tables.len());
    for (a, b) in first_catalog.tables.iter().zip(&second_catalog.tables) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.source_path, b.source_path);
        assert_eq!(a.row_count, b.row_count);
        assert_eq!(a.columns, b.columns);
    }
}

#[test]
fn test_schema_inference_end_to_end() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_csv(
            "typed.csv",
            &[
                vec!["count", "price", "flag", "day", "label", "empty"],
                vec!["1", "1", "true", "2023-01-01", "1", ""],
                vec!["2", "2.5", "no", "2023-02-01", "a", ""],
                vec!["3", "3", "YES", "2023-03-01", "3", ""],
            ],
        )
        .unwrap();

    fixture.sync().unwrap();
    let catalog = Catalog::load(&fixture.store.current_paths().unwrap().catalog_path).unwrap();
    let table = catalog.require("typed").unwrap();

    let types: Vec<(&str, ColumnType)> = table
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.column_type))
        .collect();
    assert_eq!(
        types,
        vec![
            ("count", ColumnType::Integer),
            ("price", ColumnType::Float),
            ("flag", ColumnType::Boolean),
            ("day", ColumnType::Date),
            ("label", ColumnType::Text),
            ("empty", ColumnType::Unknown),
        ]
    );
}

#[test]
fn test_partial_failure_isolation() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_file("good_a.csv", &numbered_csv(3)).unwrap();
    fixture.create_file("good_b.csv", &numbered_csv(5)).unwrap();
    fixture.create_file("good_c.csv", &numbered_csv(7)).unwrap();
    // Mismatched column count on the second data row
    fixture
        .create_file("broken.csv", "a,b\n1,2\n3,4,5,6\n")
        .unwrap();

    let report = fixture.sync().unwrap();
    assert_eq!(report.tables_indexed, 3);
    assert_eq!(report.tables_failed, 1);
    assert_eq!(report.failures[0].source, "broken.csv");
    assert_eq!(report.failures[0].table, "broken");
    assert!(!report.failures[0].cause.is_empty());

    let catalog = Catalog::load(&fixture.store.current_paths().unwrap().catalog_path).unwrap();
    let names: Vec<&str> = catalog.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["good_a", "good_b", "good_c"]);
}

#[test]
fn test_table_name_collisions_are_deterministic() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_file("a/sales.csv", &numbered_csv(1)).unwrap();
    fixture.create_file("b/sales.csv", &numbered_csv(2)).unwrap();

    fixture.sync().unwrap();
    let catalog = Catalog::load(&fixture.store.current_paths().unwrap().catalog_path).unwrap();
    let names: Vec<&str> = catalog.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["sales", "sales_2"]);

    // Manifest order is path order, so "a/" claims the bare name
    assert_eq!(catalog.require("sales").unwrap().source_path, "a/sales.csv");
    assert_eq!(catalog.require("sales").unwrap().row_count, 1);
    assert_eq!(
        catalog.require("sales_2").unwrap().source_path,
        "b/sales.csv"
    );
}

#[test]
fn test_failed_fetch_leaves_previous_generation() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_file("sales.csv", &numbered_csv(4)).unwrap();
    let report = fixture.sync().unwrap();

    // Point the source at a directory that does not exist
    let bad_source =
        repoquery::fetcher::Source::LocalDir(fixture.root().join("does-not-exist"));
    let result = repoquery::sync::run_sync(&fixture.store, &bad_source, &fixture.settings);
    assert!(matches!(result, Err(RepoqueryError::RepoNotFound { .. })));

    // The earlier generation is still the published one
    assert_eq!(fixture.store.current_paths().unwrap().id, report.generation);
    // And the lock was released, so another sync can run
    assert!(fixture.sync().is_ok());
}

#[test]
fn test_concurrent_sync_rejected() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_file("sales.csv", &numbered_csv(2)).unwrap();

    let _lock = fixture.store.acquire_sync_lock().unwrap();
    assert!(matches!(
        fixture.sync(),
        Err(RepoqueryError::SyncInProgress)
    ));
}
