//! Integration tests for the catalog and schema file loading

use std::fs;
use std::sync::Arc;

use tempfile::{tempdir, NamedTempFile};
use tupledb::catalog::{load_schema, Catalog};
use tupledb::common::{DbError, StorageConfig};
use tupledb::storage::HeapFile;
use tupledb::tuple::{DataType, Schema};

fn int_schema() -> Arc<Schema> {
    Schema::builder().column("a", DataType::Integer).build_arc().unwrap()
}

#[test]
fn test_table_id_is_stable_across_catalogs() {
    let temp = NamedTempFile::new().unwrap();

    let first = Catalog::new();
    let id1 = first.add_table(Arc::new(HeapFile::open(temp.path(), int_schema(), 4096).unwrap()), "t", "a");
    let second = Catalog::new();
    let id2 = second.add_table(Arc::new(HeapFile::open(temp.path(), int_schema(), 4096).unwrap()), "t", "a");

    assert_eq!(id1, id2);
}

#[test]
fn test_distinct_files_get_distinct_ids() {
    let a = NamedTempFile::new().unwrap();
    let b = NamedTempFile::new().unwrap();
    let catalog = Catalog::new();

    let id_a = catalog.add_table(Arc::new(HeapFile::open(a.path(), int_schema(), 4096).unwrap()), "a", "");
    let id_b = catalog.add_table(Arc::new(HeapFile::open(b.path(), int_schema(), 4096).unwrap()), "b", "");

    assert_ne!(id_a, id_b);
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.table_ids(), vec![id_a, id_b]);
    assert_eq!(catalog.table_id("b").unwrap(), id_b);
}

#[test]
fn test_name_collision_latest_wins() {
    let a = NamedTempFile::new().unwrap();
    let b = NamedTempFile::new().unwrap();
    let catalog = Catalog::new();

    let old = catalog.add_table(Arc::new(HeapFile::open(a.path(), int_schema(), 4096).unwrap()), "dup", "");
    let new = catalog.add_table(Arc::new(HeapFile::open(b.path(), int_schema(), 4096).unwrap()), "dup", "");

    assert_eq!(catalog.table_id("dup").unwrap(), new);
    assert_eq!(catalog.table_name(old).unwrap(), "dup");
}

#[test]
fn test_re_adding_same_file_replaces_entry() {
    let temp = NamedTempFile::new().unwrap();
    let catalog = Catalog::new();

    let id = catalog.add_table(Arc::new(HeapFile::open(temp.path(), int_schema(), 4096).unwrap()), "old", "");
    catalog.add_table(Arc::new(HeapFile::open(temp.path(), int_schema(), 4096).unwrap()), "new", "a");

    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog.table_name(id).unwrap(), "new");
    assert_eq!(catalog.primary_key(id).unwrap(), "a");
    assert!(matches!(catalog.table_id("old"), Err(DbError::NotFound(_))));
}

#[test]
fn test_lookups_on_unknown_table() {
    let catalog = Catalog::new();
    assert!(catalog.is_empty());
    assert!(matches!(catalog.table_id("nope"), Err(DbError::NotFound(_))));
    assert!(matches!(catalog.schema(tupledb::TableId(1)), Err(DbError::NotFound(_))));
}

#[test]
fn test_load_schema_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.txt");
    fs::write(&path, "users (id int pk, name string)\n\norders (id int, user int, total int)\n").unwrap();

    let catalog = Catalog::new();
    let ids = load_schema(&catalog, &path, &StorageConfig::default()).unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(catalog.table_ids(), ids);

    let users = catalog.table_id("users").unwrap();
    assert_eq!(users, ids[0]);
    assert_eq!(catalog.primary_key(users).unwrap(), "id");
    let schema = catalog.schema(users).unwrap();
    assert_eq!(schema.index_of("name").unwrap(), 1);
    assert_eq!(schema.field_type(1).unwrap(), DataType::FixedString(128));

    assert_eq!(catalog.schema(ids[1]).unwrap().column_count(), 3);
    assert!(dir.path().join("users.dat").exists());
    assert!(dir.path().join("orders.dat").exists());
}

#[test]
fn test_load_schema_reports_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.txt");
    fs::write(&path, "good (a int)\nbad (a float)\n").unwrap();

    let catalog = Catalog::new();
    let err = load_schema(&catalog, &path, &StorageConfig::default()).unwrap_err();
    assert!(matches!(err, DbError::SchemaFile { line: 2, .. }));
}
