//! TupleDB - a single-node relational storage engine
//!
//! Tables live in heap files of fixed-size slotted pages. All page access goes
//! through a buffer pool that enforces strict two-phase locking at page
//! granularity, keeps uncommitted changes in memory and restores them from
//! before-images on abort.
//!
//! # Architecture
//!
//! - **Tuples** (`tuple`): Column types, schemas, values and rows
//!   - `DataType`/`Value`: Fixed-width integer and string fields
//!   - `Schema`: Ordered column list, compared by types only
//!   - `Tuple`: One row bound to a schema, with its location once stored
//!
//! - **Storage Layer** (`storage`): On-disk page organization
//!   - `HeapPage`: Slotted page with an occupancy bitmap header
//!   - `HeapFile`: One table's pages in a single file, plus a scan iterator
//!
//! - **Catalog** (`catalog`): Table registry keyed by `TableId`, and a schema file loader
//!
//! - **Buffer Pool** (`buffer`): Page cache and concurrency control
//!   - `BufferPool`: Fetches, caches, flushes and evicts pages
//!   - `LockManager`: Shared/exclusive page locks with deadlock detection
//!   - `LruKReplacer`: LRU-K page replacement policy
//!
//! - **Transactions** (`transaction`): Commit/abort handle over a buffer pool
//!
//! - **Execution** (`execution`): Scan, filter, aggregate and delete operators
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tupledb::buffer::BufferPool;
//! use tupledb::catalog::Catalog;
//! use tupledb::common::StorageConfig;
//! use tupledb::storage::HeapFile;
//! use tupledb::transaction::Transaction;
//! use tupledb::tuple::{DataType, Schema, TupleBuilder};
//!
//! let config = StorageConfig::default();
//! let schema = Schema::builder()
//!     .column("id", DataType::Integer)
//!     .column("name", DataType::FixedString(16))
//!     .build_arc()
//!     .unwrap();
//!
//! // Register a table backed by a heap file
//! let file = HeapFile::open("users.dat", schema.clone(), config.page_size).unwrap();
//! let catalog = Arc::new(Catalog::new());
//! let table_id = catalog.add_table(Arc::new(file), "users", "id");
//!
//! let pool = BufferPool::new(catalog, &config);
//! let txn = Transaction::begin(&pool);
//! let mut row = TupleBuilder::new(schema).int(1).string("alice").build().unwrap();
//! pool.insert_tuple(txn.id(), table_id, &mut row).unwrap();
//! txn.commit().unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod execution;
pub mod storage;
pub mod transaction;
pub mod tuple;

// Re-export commonly used types at the crate root
pub use common::{DbError, PageId, Permissions, RecordId, Result, TableId, TransactionId};
