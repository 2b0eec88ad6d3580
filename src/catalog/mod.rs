//! Table registry shared by the buffer pool and the operator layer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::common::{DbError, Result, TableId};
use crate::storage::HeapFile;
use crate::tuple::Schema;

mod loader;

pub use loader::load_schema;

/// One registered table.
#[derive(Clone)]
pub struct CatalogEntry {
    store: Arc<HeapFile>,
    name: String,
    primary_key: String,
    /// Registration order, used to break name collisions
    seq: u64,
}

impl CatalogEntry {
    pub fn store(&self) -> &Arc<HeapFile> {
        &self.store
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }
}

/// Maps table ids to their backing store, display name and primary key.
///
/// Safe for concurrent lookups and registrations. Tables are never removed
/// individually; `clear` resets the whole registry.
#[derive(Default)]
pub struct Catalog {
    tables: DashMap<TableId, CatalogEntry>,
    next_seq: AtomicU64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `store` under `name`. Re-adding a store with the same id replaces the old entry.
    pub fn add_table(&self, store: Arc<HeapFile>, name: impl Into<String>, primary_key: impl Into<String>) -> TableId {
        let table_id = store.table_id();
        let entry = CatalogEntry {
            store,
            name: name.into(),
            primary_key: primary_key.into(),
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
        };
        self.tables.insert(table_id, entry);
        table_id
    }

    /// Looks up a table by name. When several tables share a name, the latest registration wins.
    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.tables
            .iter()
            .filter(|e| e.value().name == name)
            .max_by_key(|e| e.value().seq)
            .map(|e| *e.key())
            .ok_or_else(|| DbError::NotFound(format!("table '{}'", name)))
    }

    pub fn schema(&self, table_id: TableId) -> Result<Arc<Schema>> {
        self.entry(table_id).map(|e| e.store.schema().clone())
    }

    pub fn store(&self, table_id: TableId) -> Result<Arc<HeapFile>> {
        self.entry(table_id).map(|e| e.store)
    }

    pub fn primary_key(&self, table_id: TableId) -> Result<String> {
        self.entry(table_id).map(|e| e.primary_key)
    }

    pub fn table_name(&self, table_id: TableId) -> Result<String> {
        self.entry(table_id).map(|e| e.name)
    }

    /// Returns the ids of all registered tables, oldest registration first.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<(u64, TableId)> = self
            .tables
            .iter()
            .map(|e| (e.value().seq, *e.key()))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Removes every table.
    pub fn clear(&self) {
        self.tables.clear();
    }

    fn entry(&self, table_id: TableId) -> Result<CatalogEntry> {
        self.tables
            .get(&table_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| DbError::NotFound(format!("table {}", table_id)))
    }
}
