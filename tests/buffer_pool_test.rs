//! Integration tests for the buffer pool and its page locks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;
use tupledb::buffer::BufferPool;
use tupledb::catalog::Catalog;
use tupledb::common::{DbError, PageId, Permissions, StorageConfig, TableId, TransactionId};
use tupledb::storage::HeapFile;
use tupledb::tuple::{DataType, Schema, Tuple, TupleBuilder};

struct Fixture {
    pool: BufferPool,
    file: Arc<HeapFile>,
    table_id: TableId,
    schema: Arc<Schema>,
    _temp: NamedTempFile,
}

impl Fixture {
    fn pid(&self, page_no: u32) -> PageId {
        PageId::new(self.table_id, page_no)
    }

    fn row(&self, id: i32) -> Tuple {
        TupleBuilder::new(self.schema.clone()).int(id).build().unwrap()
    }
}

/// Single-int tuples on 64-byte pages: 15 slots per page.
fn setup(config: StorageConfig, pages: u32) -> Fixture {
    let temp = NamedTempFile::new().unwrap();
    let schema = Schema::builder()
        .column("v", DataType::Integer)
        .build_arc()
        .unwrap();
    let config = config.with_page_size(64);
    let file = Arc::new(HeapFile::open(temp.path(), schema.clone(), config.page_size).unwrap());
    for _ in 0..pages {
        file.allocate_page().unwrap();
    }
    let catalog = Arc::new(Catalog::new());
    let table_id = catalog.add_table(file.clone(), "t", "v");
    Fixture {
        pool: BufferPool::new(catalog, &config),
        file,
        table_id,
        schema,
        _temp: temp,
    }
}

#[test]
fn test_shared_locks_coexist() {
    let fx = setup(StorageConfig::default(), 1);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());

    let g1 = fx.pool.get_page(t1, fx.pid(0), Permissions::ReadOnly).unwrap();
    let g2 = fx.pool.get_page(t2, fx.pid(0), Permissions::ReadOnly).unwrap();
    assert_eq!(g1.page_id(), g2.page_id());
    drop((g1, g2));

    assert!(fx.pool.holds_lock(t1, fx.pid(0)));
    assert!(fx.pool.holds_lock(t2, fx.pid(0)));
}

#[test]
fn test_exclusive_blocks_until_commit() {
    let config = StorageConfig::default().with_lock_timeout(Duration::from_secs(5));
    let fx = setup(config, 1);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());
    let committed = AtomicBool::new(false);

    drop(fx.pool.get_page(t1, fx.pid(0), Permissions::ReadWrite).unwrap());

    thread::scope(|s| {
        let reader = s.spawn(|| {
            let guard = fx.pool.get_page(t2, fx.pid(0), Permissions::ReadOnly);
            (guard.is_ok(), committed.load(Ordering::SeqCst))
        });

        thread::sleep(Duration::from_millis(100));
        committed.store(true, Ordering::SeqCst);
        fx.pool.commit_transaction(t1).unwrap();

        let (granted, saw_commit) = reader.join().unwrap();
        assert!(granted);
        assert!(saw_commit);
    });
}

#[test]
fn test_lock_wait_times_out() {
    let config = StorageConfig::default().with_lock_timeout(Duration::from_millis(50));
    let fx = setup(config, 1);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());

    drop(fx.pool.get_page(t1, fx.pid(0), Permissions::ReadOnly).unwrap());
    let start = Instant::now();
    let result = fx.pool.get_page(t2, fx.pid(0), Permissions::ReadWrite);
    assert!(matches!(result, Err(DbError::TransactionAborted(t)) if t == t2));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn test_deadlock_aborts_requester() {
    let config = StorageConfig::default().with_lock_timeout(Duration::from_secs(10));
    let fx = setup(config, 2);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());

    drop(fx.pool.get_page(t1, fx.pid(0), Permissions::ReadOnly).unwrap());
    drop(fx.pool.get_page(t2, fx.pid(1), Permissions::ReadOnly).unwrap());

    thread::scope(|s| {
        let waiter = s.spawn(|| fx.pool.get_page(t1, fx.pid(1), Permissions::ReadWrite).is_ok());
        thread::sleep(Duration::from_millis(100));

        let start = Instant::now();
        let result = fx.pool.get_page(t2, fx.pid(0), Permissions::ReadWrite);
        assert!(matches!(result, Err(DbError::TransactionAborted(t)) if t == t2));
        assert!(start.elapsed() < Duration::from_secs(5));

        fx.pool.abort_transaction(t2).unwrap();
        assert!(waiter.join().unwrap());
    });
}

#[test]
fn test_abort_restores_page() {
    let fx = setup(StorageConfig::default(), 0);

    let setup_tid = TransactionId::new();
    for i in 0..3 {
        fx.pool.insert_tuple(setup_tid, fx.table_id, &mut fx.row(i)).unwrap();
    }
    fx.pool.commit_transaction(setup_tid).unwrap();
    let on_disk = fx.file.read_page(fx.pid(0)).unwrap().to_bytes();

    let tid = TransactionId::new();
    fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(100)).unwrap();
    let mut victim = fx
        .pool
        .get_page(tid, fx.pid(0), Permissions::ReadOnly)
        .unwrap()
        .tuple(0)
        .unwrap()
        .clone();
    fx.pool.delete_tuple(tid, &mut victim).unwrap();
    fx.pool.abort_transaction(tid).unwrap();
    assert!(fx.pool.pages_locked_by(tid).is_empty());

    let reader = TransactionId::new();
    let page = fx.pool.get_page(reader, fx.pid(0), Permissions::ReadOnly).unwrap();
    assert_eq!(page.to_bytes(), on_disk);
    assert!(!page.is_dirty());
    assert_eq!(fx.file.read_page(fx.pid(0)).unwrap().to_bytes(), on_disk);
}

#[test]
fn test_commit_persists_across_reopen() {
    let fx = setup(StorageConfig::default(), 0);
    let tid = TransactionId::new();
    for i in 0..20 {
        fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(i)).unwrap();
    }
    // nothing reaches disk before commit
    assert!(fx.file.read_page(fx.pid(0)).unwrap().tuples().next().is_none());
    fx.pool.commit_transaction(tid).unwrap();

    let reopened = HeapFile::open(fx.file.path(), fx.schema.clone(), 64).unwrap();
    assert_eq!(reopened.num_pages(), 2);
    let values: Vec<i32> = (0..2)
        .flat_map(|n| {
            let page = reopened.read_page(fx.pid(n)).unwrap();
            page.tuples()
                .map(|t| t.value(0).unwrap().as_int().unwrap())
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(values, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_full_pages_are_skipped_on_insert() {
    let fx = setup(StorageConfig::default(), 0);
    let tid = TransactionId::new();
    for i in 0..15 {
        let rid = fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(i)).unwrap();
        assert_eq!(rid.page_id, fx.pid(0));
    }
    fx.pool.commit_transaction(tid).unwrap();

    let tid = TransactionId::new();
    let rid = fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(15)).unwrap();
    assert_eq!(rid.page_id, fx.pid(1));
    assert_eq!(rid.slot, 0);
    // the full page was only peeked at
    assert!(!fx.pool.holds_lock(tid, fx.pid(0)));
    assert!(fx.pool.holds_lock(tid, fx.pid(1)));
}

#[test]
fn test_clean_pages_are_evicted() {
    let fx = setup(StorageConfig::default().with_pool_size(2), 4);
    let tid = TransactionId::new();

    for n in 0..4 {
        drop(fx.pool.get_page(tid, fx.pid(n), Permissions::ReadOnly).unwrap());
        assert!(fx.pool.resident_pages() <= 2);
    }
    assert!(fx.pool.is_resident(fx.pid(3)));
    assert_eq!(fx.pool.pages_locked_by(tid).len(), 4);
}

#[test]
fn test_dirty_pages_are_never_evicted() {
    let fx = setup(StorageConfig::default().with_pool_size(2), 0);
    let tid = TransactionId::new();

    // two pages of dirty tuples fill the pool
    for i in 0..30 {
        fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(i)).unwrap();
    }
    let result = fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(30));
    assert!(matches!(result, Err(DbError::BufferPoolFull)));
    assert!(fx.pool.is_resident(fx.pid(0)));
    assert!(fx.pool.is_resident(fx.pid(1)));

    fx.pool.abort_transaction(tid).unwrap();
}

#[test]
fn test_flush_all_writes_dirty_pages() {
    let fx = setup(StorageConfig::default(), 0);
    let tid = TransactionId::new();
    fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(7)).unwrap();

    fx.pool.flush_all_pages().unwrap();
    let page = fx.file.read_page(fx.pid(0)).unwrap();
    assert_eq!(page.tuple(0).unwrap().value(0).unwrap().as_int(), Some(7));
    assert!(!fx.pool.get_page(tid, fx.pid(0), Permissions::ReadOnly).unwrap().is_dirty());
}

#[test]
fn test_exclusive_waits_for_shared_holder() {
    let config = StorageConfig::default().with_lock_timeout(Duration::from_secs(5));
    let fx = setup(config, 1);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());
    let granted = AtomicBool::new(false);

    drop(fx.pool.get_page(t1, fx.pid(0), Permissions::ReadOnly).unwrap());

    thread::scope(|s| {
        let writer = s.spawn(|| {
            let result = fx.pool.get_page(t2, fx.pid(0), Permissions::ReadWrite);
            granted.store(true, Ordering::SeqCst);
            result.is_ok()
        });

        thread::sleep(Duration::from_millis(100));
        assert!(!granted.load(Ordering::SeqCst));
        fx.pool.commit_transaction(t1).unwrap();

        assert!(writer.join().unwrap());
        assert!(granted.load(Ordering::SeqCst));
    });
    assert!(fx.pool.holds_lock(t2, fx.pid(0)));
}

#[test]
fn test_delete_under_own_guard_aborts() {
    let config = StorageConfig::default().with_lock_timeout(Duration::from_millis(50));
    let fx = setup(config, 0);
    let setup_tid = TransactionId::new();
    fx.pool.insert_tuple(setup_tid, fx.table_id, &mut fx.row(1)).unwrap();
    fx.pool.commit_transaction(setup_tid).unwrap();

    let tid = TransactionId::new();
    let guard = fx.pool.get_page(tid, fx.pid(0), Permissions::ReadOnly).unwrap();
    let mut victim = guard.tuple(0).unwrap().clone();

    let start = Instant::now();
    let result = fx.pool.delete_tuple(tid, &mut victim);
    assert!(matches!(result, Err(DbError::TransactionAborted(t)) if t == tid));
    assert!(start.elapsed() < Duration::from_secs(5));

    drop(guard);
    fx.pool.abort_transaction(tid).unwrap();
    let reader = TransactionId::new();
    let page = fx.pool.get_page(reader, fx.pid(0), Permissions::ReadOnly).unwrap();
    assert_eq!(page.tuples().count(), 1);
}

#[test]
fn test_commit_under_own_guard() {
    let config = StorageConfig::default().with_lock_timeout(Duration::from_secs(10));
    let fx = setup(config, 0);
    let tid = TransactionId::new();
    fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(42)).unwrap();

    let guard = fx.pool.get_page(tid, fx.pid(0), Permissions::ReadOnly).unwrap();
    let start = Instant::now();
    fx.pool.commit_transaction(tid).unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    // the guard keeps the page as it was when taken
    assert_eq!(guard.tuple(0).unwrap().value(0).unwrap().as_int(), Some(42));
    drop(guard);

    let on_disk = fx.file.read_page(fx.pid(0)).unwrap();
    assert_eq!(on_disk.tuple(0).unwrap().value(0).unwrap().as_int(), Some(42));
    let reader = TransactionId::new();
    assert!(!fx.pool.get_page(reader, fx.pid(0), Permissions::ReadOnly).unwrap().is_dirty());
}

#[test]
fn test_abort_under_own_guard() {
    let config = StorageConfig::default().with_lock_timeout(Duration::from_secs(10));
    let fx = setup(config, 1);
    let tid = TransactionId::new();
    fx.pool.insert_tuple(tid, fx.table_id, &mut fx.row(9)).unwrap();

    let guard = fx.pool.get_page(tid, fx.pid(0), Permissions::ReadOnly).unwrap();
    let start = Instant::now();
    fx.pool.abort_transaction(tid).unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(fx.pool.pages_locked_by(tid).is_empty());
    drop(guard);

    let reader = TransactionId::new();
    let page = fx.pool.get_page(reader, fx.pid(0), Permissions::ReadOnly).unwrap();
    assert!(page.tuples().next().is_none());
    assert!(!page.is_dirty());
}

#[test]
fn test_commit_ignores_other_readers_guards() {
    let config = StorageConfig::default().with_lock_timeout(Duration::from_secs(10));
    let fx = setup(config, 1);
    let (t1, t2) = (TransactionId::new(), TransactionId::new());

    drop(fx.pool.get_page(t1, fx.pid(0), Permissions::ReadOnly).unwrap());
    let held = fx.pool.get_page(t2, fx.pid(0), Permissions::ReadOnly).unwrap();

    let start = Instant::now();
    fx.pool.commit_transaction(t1).unwrap();
    fx.pool.abort_transaction(t1).unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!fx.pool.holds_lock(t1, fx.pid(0)));

    drop(held);
    fx.pool.commit_transaction(t2).unwrap();
}
