use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::common::{DbError, LockMode, PageId, Result, TransactionId};

/// Holders of one page lock: any number of sharers, or one exclusive owner.
#[derive(Debug, Default)]
struct PageLock {
    sharing: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl PageLock {
    /// Returns the transactions whose locks prevent `tid` from taking `mode`.
    fn conflicting_holders(&self, tid: TransactionId, mode: LockMode) -> HashSet<TransactionId> {
        let mut holders = HashSet::new();
        if let Some(owner) = self.exclusive {
            if owner != tid {
                holders.insert(owner);
            }
        }
        if mode == LockMode::Exclusive {
            holders.extend(self.sharing.iter().copied().filter(|&t| t != tid));
        }
        holders
    }

    fn grant(&mut self, tid: TransactionId, mode: LockMode) {
        match mode {
            LockMode::Shared => {
                if self.exclusive != Some(tid) {
                    self.sharing.insert(tid);
                }
            }
            LockMode::Exclusive => {
                self.sharing.remove(&tid);
                self.exclusive = Some(tid);
            }
        }
    }

    fn release(&mut self, tid: TransactionId) {
        self.sharing.remove(&tid);
        if self.exclusive == Some(tid) {
            self.exclusive = None;
        }
    }

    fn mode_of(&self, tid: TransactionId) -> Option<LockMode> {
        if self.exclusive == Some(tid) {
            Some(LockMode::Exclusive)
        } else if self.sharing.contains(&tid) {
            Some(LockMode::Shared)
        } else {
            None
        }
    }

    fn is_free(&self) -> bool {
        self.exclusive.is_none() && self.sharing.is_empty()
    }
}

#[derive(Debug, Default)]
struct LockTable {
    locks: HashMap<PageId, PageLock>,
    /// Pages each transaction holds a lock on
    held: HashMap<TransactionId, HashSet<PageId>>,
    /// Edges of the waits-for graph, one entry per blocked transaction
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl LockTable {
    /// Returns true if following waits-for edges from `start` leads back to it.
    fn has_cycle_from(&self, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<TransactionId> = self
            .waits_for
            .get(&start)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();

        while let Some(tid) = stack.pop() {
            if tid == start {
                return true;
            }
            if !visited.insert(tid) {
                continue;
            }
            if let Some(next) = self.waits_for.get(&tid) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    fn release(&mut self, tid: TransactionId, page_id: PageId) {
        if let Some(lock) = self.locks.get_mut(&page_id) {
            lock.release(tid);
            if lock.is_free() {
                self.locks.remove(&page_id);
            }
        }
        if let Some(pages) = self.held.get_mut(&tid) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&tid);
            }
        }
    }
}

/// Page-granular shared/exclusive locks for strict two-phase locking.
///
/// A blocked request waits on a condition variable until the conflicting
/// holders release. The request fails with `TransactionAborted` when its wait
/// exceeds the timeout or when waiting would close a cycle in the waits-for graph.
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Acquires `mode` on `page_id` for `tid`, blocking while another transaction conflicts.
    /// A sole sharer asking for `Exclusive` is upgraded in place.
    pub fn acquire(&self, tid: TransactionId, page_id: PageId, mode: LockMode) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let mut table = self.table.lock();
        let mut timed_out = false;

        loop {
            let blockers = table
                .locks
                .get(&page_id)
                .map(|l| l.conflicting_holders(tid, mode))
                .unwrap_or_default();

            if blockers.is_empty() {
                table.waits_for.remove(&tid);
                table.locks.entry(page_id).or_default().grant(tid, mode);
                table.held.entry(tid).or_default().insert(page_id);
                return Ok(());
            }

            table.waits_for.insert(tid, blockers);
            if timed_out || table.has_cycle_from(tid) {
                table.waits_for.remove(&tid);
                return Err(DbError::TransactionAborted(tid));
            }

            timed_out = self.released.wait_until(&mut table, deadline).timed_out();
        }
    }

    /// Releases one lock early. Used for pages a transaction only peeked at.
    pub fn release(&self, tid: TransactionId, page_id: PageId) {
        self.table.lock().release(tid, page_id);
        self.released.notify_all();
    }

    /// Releases every lock held by `tid` and returns the pages they covered.
    pub fn release_all(&self, tid: TransactionId) -> Vec<PageId> {
        let mut table = self.table.lock();
        let pages: Vec<PageId> = table
            .held
            .get(&tid)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        for &page_id in &pages {
            table.release(tid, page_id);
        }
        table.waits_for.remove(&tid);
        drop(table);

        self.released.notify_all();
        pages
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(tid, page_id).is_some()
    }

    /// Returns the mode `tid` holds on `page_id`, if any.
    pub fn lock_mode(&self, tid: TransactionId, page_id: PageId) -> Option<LockMode> {
        self.table.lock().locks.get(&page_id).and_then(|l| l.mode_of(tid))
    }

    /// Returns true if any transaction holds a lock on `page_id`.
    pub fn is_locked(&self, page_id: PageId) -> bool {
        self.table.lock().locks.contains_key(&page_id)
    }

    /// Returns the pages `tid` holds locks on.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<PageId> = table
            .held
            .get(&tid)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        pages.sort_unstable();
        pages
    }
}
