use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{Result, TableId, TransactionId};
use crate::storage::HeapFileIterator;
use crate::tuple::{Schema, Tuple};

use super::OpIterator;

/// Reads every tuple of one table in storage order.
///
/// Output columns are named `alias.column` so scans of the same table can be
/// told apart once joined or merged.
pub struct SeqScan<'a> {
    iter: HeapFileIterator<'a>,
    alias: String,
    schema: Arc<Schema>,
}

impl<'a> SeqScan<'a> {
    pub fn new(pool: &'a BufferPool, tid: TransactionId, table_id: TableId, alias: &str) -> Result<Self> {
        let store = pool.catalog().store(table_id)?;
        let schema = Arc::new(store.schema().with_prefix(alias));
        Ok(Self {
            iter: store.iter(tid, pool),
            alias: alias.to_string(),
            schema,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl OpIterator for SeqScan<'_> {
    fn open(&mut self) -> Result<()> {
        self.iter.open()
    }

    fn has_next(&mut self) -> Result<bool> {
        self.iter.has_next()
    }

    fn next(&mut self) -> Result<Tuple> {
        let mut tuple = self.iter.next()?;
        tuple.reset_schema(self.schema.clone())?;
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<()> {
        self.iter.rewind()
    }

    fn close(&mut self) {
        self.iter.close();
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
