use crate::buffer::BufferPool;
use crate::common::{Result, TransactionId};

/// A running transaction bound to a buffer pool.
///
/// Commit or abort consumes the handle. A handle dropped while still running
/// is aborted.
pub struct Transaction<'a> {
    tid: TransactionId,
    pool: &'a BufferPool,
    finished: bool,
}

impl<'a> Transaction<'a> {
    /// Starts a transaction with a fresh id.
    pub fn begin(pool: &'a BufferPool) -> Self {
        Self {
            tid: TransactionId::new(),
            pool,
            finished: false,
        }
    }

    /// Returns its own transaction id
    pub fn id(&self) -> TransactionId {
        self.tid
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.pool.commit_transaction(self.tid)
    }

    pub fn abort(mut self) -> Result<()> {
        self.finished = true;
        self.pool.abort_transaction(self.tid)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.pool.abort_transaction(self.tid);
        }
    }
}
