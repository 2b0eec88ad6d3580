//! Pull-based operators over heap files.
//!
//! Every operator implements [`OpIterator`]; operators own their children as
//! boxed trait objects so plans can be assembled at runtime.

use std::sync::Arc;

use crate::common::Result;
use crate::tuple::{Schema, Tuple};

mod aggregate;
mod delete;
mod filter;
mod predicate;
mod seq_scan;

pub use aggregate::{Aggregate, AggregateOp};
pub use delete::Delete;
pub use filter::Filter;
pub use predicate::Predicate;
pub use seq_scan::SeqScan;

/// The iterator contract shared by all operators.
///
/// `next` fails with `IllegalState` when no tuple is pending, so callers
/// check `has_next` first. `rewind` restarts from the first tuple.
pub trait OpIterator {
    fn open(&mut self) -> Result<()>;
    fn has_next(&mut self) -> Result<bool>;
    fn next(&mut self) -> Result<Tuple>;
    fn rewind(&mut self) -> Result<()>;
    fn close(&mut self);
    fn schema(&self) -> &Arc<Schema>;
}

/// Drains an opened operator into a vector.
pub fn collect(op: &mut dyn OpIterator) -> Result<Vec<Tuple>> {
    let mut out = Vec::new();
    while op.has_next()? {
        out.push(op.next()?);
    }
    Ok(out)
}
