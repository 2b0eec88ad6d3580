use std::sync::Arc;

use crate::common::{DbError, Result};
use crate::tuple::{Schema, Tuple};

use super::{OpIterator, Predicate};

/// Passes through the child tuples that satisfy a predicate.
pub struct Filter<'a> {
    predicate: Predicate,
    child: Box<dyn OpIterator + 'a>,
    pending: Option<Tuple>,
}

impl<'a> Filter<'a> {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator + 'a>) -> Self {
        Self {
            predicate,
            child,
            pending: None,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl OpIterator for Filter<'_> {
    fn open(&mut self) -> Result<()> {
        self.pending = None;
        self.child.open()
    }

    fn has_next(&mut self) -> Result<bool> {
        while self.pending.is_none() && self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.filter(&tuple)? {
                self.pending = Some(tuple);
            }
        }
        Ok(self.pending.is_some())
    }

    fn next(&mut self) -> Result<Tuple> {
        if !self.has_next()? {
            return Err(DbError::IllegalState("filter has no more tuples".into()));
        }
        self.pending
            .take()
            .ok_or_else(|| DbError::IllegalState("filter has no more tuples".into()))
    }

    fn rewind(&mut self) -> Result<()> {
        self.pending = None;
        self.child.rewind()
    }

    fn close(&mut self) {
        self.pending = None;
        self.child.close();
    }

    fn schema(&self) -> &Arc<Schema> {
        self.child.schema()
    }
}
