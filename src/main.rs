use std::sync::Arc;

use tupledb::buffer::BufferPool;
use tupledb::catalog::Catalog;
use tupledb::common::StorageConfig;
use tupledb::execution::{collect, Aggregate, AggregateOp, Filter, OpIterator, Predicate, SeqScan};
use tupledb::storage::HeapFile;
use tupledb::transaction::Transaction;
use tupledb::tuple::{CompareOp, DataType, Schema, TupleBuilder, Value};

fn main() {
    println!("TupleDB - a relational storage engine in Rust");
    println!("=============================================\n");

    let db_path = std::env::temp_dir().join("tupledb_demo.dat");
    std::fs::remove_file(&db_path).ok();

    let config = StorageConfig::default().with_pool_size(8);
    let schema = Schema::builder()
        .column("id", DataType::Integer)
        .column("dept", DataType::FixedString(8))
        .column("salary", DataType::Integer)
        .build_arc()
        .expect("Failed to build schema");
    println!("Schema: {}", schema);

    let file = HeapFile::open(&db_path, schema.clone(), config.page_size).expect("Failed to open heap file");
    let catalog = Arc::new(Catalog::new());
    let table_id = catalog.add_table(Arc::new(file), "staff", "id");
    let pool = BufferPool::new(catalog.clone(), &config);
    println!("Created buffer pool with {} pages\n", pool.pool_size());

    // Load some rows
    let txn = Transaction::begin(&pool);
    for i in 0..300 {
        let dept = ["eng", "ops", "sales"][i as usize % 3];
        let mut row = TupleBuilder::new(schema.clone())
            .int(i)
            .string(dept)
            .int(1000 + i * 10)
            .build()
            .expect("Failed to build tuple");
        pool.insert_tuple(txn.id(), table_id, &mut row)
            .expect("Failed to insert tuple");
    }
    txn.commit().expect("Failed to commit");

    let store = catalog.store(table_id).expect("Table not found");
    println!("Inserted 300 rows across {} pages", store.num_pages());
    println!("  - Page writes: {}", store.num_writes());

    // Average salary of ids >= 150, grouped by department
    {
        let txn = Transaction::begin(&pool);
        let scan = SeqScan::new(&pool, txn.id(), table_id, "s").expect("Failed to create scan");
        let filter = Filter::new(Predicate::new(0, CompareOp::GreaterThanOrEq, Value::Integer(150)), Box::new(scan));
        let mut agg = Aggregate::new(Box::new(filter), 2, Some(1), AggregateOp::Avg).expect("Failed to create aggregate");

        agg.open().expect("Failed to open plan");
        println!("\n{}", agg.schema());
        for row in collect(&mut agg).expect("Query failed") {
            println!("  {}", row);
        }
        agg.close();
        txn.commit().expect("Failed to commit");
    }

    println!("\nResident pages: {}", pool.resident_pages());
    println!("  - Page reads: {}", store.num_reads());

    drop(pool);
    drop(store);
    drop(catalog);
    std::fs::remove_file(&db_path).ok();
    println!("\nDemo completed successfully!");
}
