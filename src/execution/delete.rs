use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{DbError, Result, TransactionId};
use crate::tuple::{Column, DataType, Schema, Tuple, Value};

use super::OpIterator;

/// Removes every tuple its child produces and reports how many were removed.
///
/// The deletions run on the first call to `has_next`; the operator then
/// yields a single one-column tuple holding the count.
pub struct Delete<'a> {
    pool: &'a BufferPool,
    tid: TransactionId,
    child: Box<dyn OpIterator + 'a>,
    schema: Arc<Schema>,
    result: Option<Tuple>,
    emitted: bool,
}

impl<'a> Delete<'a> {
    pub fn new(pool: &'a BufferPool, tid: TransactionId, child: Box<dyn OpIterator + 'a>) -> Result<Self> {
        let schema = Arc::new(Schema::new(vec![Column::new("deleted", DataType::Integer)])?);
        Ok(Self {
            pool,
            tid,
            child,
            schema,
            result: None,
            emitted: false,
        })
    }

    fn run(&mut self) -> Result<Tuple> {
        let mut count = 0;
        while self.child.has_next()? {
            let mut tuple = self.child.next()?;
            self.pool.delete_tuple(self.tid, &mut tuple)?;
            count += 1;
        }
        Tuple::new(self.schema.clone(), vec![Value::Integer(count)])
    }
}

impl OpIterator for Delete<'_> {
    fn open(&mut self) -> Result<()> {
        self.result = None;
        self.emitted = false;
        self.child.open()
    }

    fn has_next(&mut self) -> Result<bool> {
        if self.result.is_none() {
            self.result = Some(self.run()?);
        }
        Ok(!self.emitted)
    }

    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(DbError::IllegalState("delete has already reported".into()));
        }
        self.emitted = true;
        self.result
            .clone()
            .ok_or_else(|| DbError::IllegalState("delete has not run".into()))
    }

    /// Replays the count without deleting again.
    fn rewind(&mut self) -> Result<()> {
        self.emitted = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
