use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};

use crate::catalog::Catalog;
use crate::common::{DbError, PageId, Permissions, RecordId, Result, StorageConfig, TableId, TransactionId};
use crate::storage::page::HeapPage;
use crate::tuple::Tuple;

use super::{LockManager, LruKReplacer, PageGuard, PageWriteGuard};

type PageTable = HashMap<PageId, Arc<RwLock<HeapPage>>>;

/// BufferPool caches decoded pages in memory and is the only path through
/// which pages are read or mutated.
///
/// Every access is charged against a page lock held by the requesting
/// transaction until it commits or aborts. Dirty pages never leave the pool
/// before commit; when the pool is full a clean, unlatched page is evicted
/// using the LRU-K policy.
///
/// Page latches are only ever waited on for the lock timeout. Commit and abort
/// install a fresh copy of each page they finish instead of latching it for
/// writing, so an outstanding `PageGuard` keeps its snapshot and never stalls them.
pub struct BufferPool {
    /// Maximum number of resident pages
    pool_size: usize,
    /// Table registry used to locate each page's heap file
    catalog: Arc<Catalog>,
    /// Resident pages
    pages: Mutex<PageTable>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
    /// Transactional page locks
    lock_manager: LockManager,
    /// Upper bound on any wait for a page latch
    latch_timeout: Duration,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: &StorageConfig) -> Self {
        Self {
            pool_size: config.pool_size,
            catalog,
            pages: Mutex::new(HashMap::new()),
            replacer: LruKReplacer::new(config.lru_k),
            lock_manager: LockManager::new(config.lock_timeout),
            latch_timeout: config.lock_timeout,
        }
    }

    /// Fetches a page for `tid`, locking it shared for `ReadOnly` and exclusive for `ReadWrite`.
    ///
    /// Blocks while another transaction holds a conflicting lock. Fails with
    /// `TransactionAborted` if the wait times out or would deadlock, and with
    /// `BufferPoolFull` if the page must be loaded but nothing can be evicted.
    /// The latch wait is bounded by the same timeout.
    pub fn get_page(&self, tid: TransactionId, page_id: PageId, perm: Permissions) -> Result<PageGuard> {
        self.lock_manager.acquire(tid, page_id, perm.into())?;
        let guard = self
            .fetch(page_id)?
            .try_read_arc_for(self.latch_timeout)
            .ok_or(DbError::TransactionAborted(tid))?;
        Ok(PageGuard::new(page_id, guard))
    }

    /// Fetches a page for in-place mutation under an exclusive lock.
    ///
    /// Fails with `TransactionAborted` if a guard on the page is still alive
    /// after the lock timeout, including one held by `tid` itself.
    pub(crate) fn get_page_mut(&self, tid: TransactionId, page_id: PageId) -> Result<PageWriteGuard> {
        self.lock_manager
            .acquire(tid, page_id, Permissions::ReadWrite.into())?;
        let guard = self
            .fetch(page_id)?
            .try_write_arc_for(self.latch_timeout)
            .ok_or(DbError::TransactionAborted(tid))?;
        Ok(PageWriteGuard::new(guard))
    }

    /// Inserts `tuple` into the first page of the table with a free slot,
    /// appending a new page when every existing one is full.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: &mut Tuple) -> Result<RecordId> {
        let store = self.catalog.store(table_id)?;
        if **tuple.schema() != **store.schema() {
            return Err(DbError::SchemaMismatch);
        }

        for page_no in 0..store.num_pages() {
            let page_id = PageId::new(table_id, page_no);
            let held_before = self.lock_manager.holds_lock(tid, page_id);

            let has_room = self
                .get_page(tid, page_id, Permissions::ReadOnly)?
                .num_empty_slots()
                > 0;
            if !has_room {
                if !held_before {
                    self.lock_manager.release(tid, page_id);
                }
                continue;
            }

            let mut page = self.get_page_mut(tid, page_id)?;
            match page.insert_tuple(tuple) {
                Ok(rid) => {
                    page.mark_dirty(true, tid);
                    return Ok(rid);
                }
                Err(DbError::PageFull(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        let page_id = store.allocate_page()?;
        let mut page = self.get_page_mut(tid, page_id)?;
        let rid = page.insert_tuple(tuple)?;
        page.mark_dirty(true, tid);
        Ok(rid)
    }

    /// Removes `tuple` from the page named by its record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &mut Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(DbError::TupleNotOnPage)?;
        let mut page = self.get_page_mut(tid, rid.page_id)?;
        page.delete_tuple(tuple)?;
        page.mark_dirty(true, tid);
        Ok(())
    }

    /// Writes a resident dirty page to its heap file and refreshes its
    /// before-image. Locks are untouched.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        match self.resident(page_id) {
            Some(page) => self.write_back(page_id, &page),
            None => Ok(()),
        }
    }

    /// Writes every dirty resident page, including uncommitted changes.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<_> = self
            .pages
            .lock()
            .iter()
            .map(|(&page_id, page)| (page_id, page.clone()))
            .collect();
        for (page_id, page) in pages {
            self.write_back(page_id, &page)?;
        }
        Ok(())
    }

    /// Drops a page from the pool without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        self.pages.lock().remove(&page_id);
        self.replacer.remove(page_id);
    }

    /// Flushes every page `tid` dirtied, then releases all of its locks.
    /// Locks are released even if a flush fails.
    ///
    /// Each flushed page is replaced by a clean copy whose before-image is the
    /// committed state. Pages `tid` only read are left alone.
    pub fn commit_transaction(&self, tid: TransactionId) -> Result<()> {
        let result = self.lock_manager.pages_locked_by(tid).into_iter().try_for_each(|page_id| {
            let current = match self.resident(page_id) {
                Some(page) => page,
                None => return Ok(()),
            };
            let page = self.latch_read(page_id, &current)?;
            if page.dirtied_by() != Some(tid) {
                return Ok(());
            }
            self.catalog.store(page_id.table_id)?.write_page(&page)?;

            let mut clean = page.clone();
            clean.set_before_image();
            clean.mark_dirty(false, tid);
            self.replace(page_id, &current, clean);
            Ok(())
        });
        self.lock_manager.release_all(tid);
        result
    }

    /// Restores every page `tid` dirtied to its before-image, then releases all of its locks.
    pub fn abort_transaction(&self, tid: TransactionId) -> Result<()> {
        let result = self.lock_manager.pages_locked_by(tid).into_iter().try_for_each(|page_id| {
            let current = match self.resident(page_id) {
                Some(page) => page,
                None => return Ok(()),
            };
            let page = self.latch_read(page_id, &current)?;
            if page.dirtied_by() == Some(tid) {
                let restored = page.before_image()?;
                self.replace(page_id, &current, restored);
            }
            Ok(())
        });
        self.lock_manager.release_all(tid);
        result
    }

    /// Releases one lock before the transaction ends. Breaks strict 2PL; use with care.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release(tid, page_id);
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    /// Returns the pages `tid` currently holds locks on.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.lock_manager.pages_locked_by(tid)
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.pages.lock().contains_key(&page_id)
    }

    /// Returns the number of resident pages.
    pub fn resident_pages(&self) -> usize {
        self.pages.lock().len()
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    fn resident(&self, page_id: PageId) -> Option<Arc<RwLock<HeapPage>>> {
        self.pages.lock().get(&page_id).cloned()
    }

    /// Returns the resident page, loading it from its heap file on a miss.
    fn fetch(&self, page_id: PageId) -> Result<Arc<RwLock<HeapPage>>> {
        let mut pages = self.pages.lock();
        if let Some(page) = pages.get(&page_id) {
            self.replacer.record_access(page_id);
            return Ok(page.clone());
        }

        if pages.len() >= self.pool_size {
            self.evict(&mut pages)?;
        }

        let page = self.catalog.store(page_id.table_id)?.read_page(page_id)?;
        let page = Arc::new(RwLock::new(page));
        pages.insert(page_id, page.clone());
        self.replacer.record_access(page_id);
        Ok(page)
    }

    /// Evicts one clean, unlatched page, preferring pages no transaction has locked.
    fn evict(&self, pages: &mut PageTable) -> Result<()> {
        let victim = self
            .replacer
            .evict_where(|pid| !self.lock_manager.is_locked(pid) && is_evictable(pages, pid))
            .or_else(|| self.replacer.evict_where(|pid| is_evictable(pages, pid)));

        match victim {
            Some(page_id) => {
                pages.remove(&page_id);
                Ok(())
            }
            None => Err(DbError::BufferPoolFull),
        }
    }

    fn latch_read<'p>(&self, page_id: PageId, page: &'p RwLock<HeapPage>) -> Result<RwLockReadGuard<'p, HeapPage>> {
        page.try_read_for(self.latch_timeout)
            .ok_or(DbError::PageLatched(page_id))
    }

    /// Installs `page` as the resident copy, unless `current` was evicted or replaced meanwhile.
    fn replace(&self, page_id: PageId, current: &Arc<RwLock<HeapPage>>, page: HeapPage) {
        let mut pages = self.pages.lock();
        if pages.get(&page_id).map_or(false, |p| Arc::ptr_eq(p, current)) {
            pages.insert(page_id, Arc::new(RwLock::new(page)));
        }
    }

    /// Writes a dirty page in place. Clean pages are never write-latched.
    fn write_back(&self, page_id: PageId, page: &RwLock<HeapPage>) -> Result<()> {
        if !self.latch_read(page_id, page)?.is_dirty() {
            return Ok(());
        }
        let mut page = page
            .try_write_for(self.latch_timeout)
            .ok_or(DbError::PageLatched(page_id))?;
        if let Some(tid) = page.dirtied_by() {
            self.catalog.store(page_id.table_id)?.write_page(&page)?;
            page.set_before_image();
            page.mark_dirty(false, tid);
        }
        Ok(())
    }
}

/// A page may leave the pool when it is clean and nobody holds a guard on it.
fn is_evictable(pages: &PageTable, page_id: PageId) -> bool {
    match pages.get(&page_id) {
        Some(page) => {
            Arc::strong_count(page) == 1 && page.try_read().map_or(false, |p| !p.is_dirty())
        }
        None => true,
    }
}
