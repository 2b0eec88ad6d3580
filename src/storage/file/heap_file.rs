use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPool;
use crate::common::{DbError, PageId, Permissions, Result, TableId, TransactionId};
use crate::storage::page::{slot_capacity, HeapPage, MAX_SLOTS};
use crate::tuple::{Schema, Tuple};

/// HeapFile stores the pages of one table as consecutive fixed-size blocks in a single file.
/// Page `n` lives at byte offset `n * page_size`; the file carries no header.
pub struct HeapFile {
    /// The table's backing file
    file: Mutex<File>,
    /// Canonical path of the backing file
    path: PathBuf,
    /// Identity derived from the canonical path
    table_id: TableId,
    /// Shape of every tuple in this table
    schema: Arc<Schema>,
    page_size: usize,
    /// Number of whole pages in the file
    num_pages: AtomicU32,
    /// Number of page reads performed
    num_reads: AtomicU64,
    /// Number of page writes performed
    num_writes: AtomicU64,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating it if it doesn't exist.
    ///
    /// Fails with `InvalidConfig` when a page of `page_size` bytes holds no
    /// tuple, or more tuples than a record id can address.
    pub fn open<P: AsRef<Path>>(path: P, schema: Arc<Schema>, page_size: usize) -> Result<Self> {
        let slots = slot_capacity(page_size, schema.byte_size());
        if slots == 0 || slots > MAX_SLOTS {
            return Err(DbError::InvalidConfig(format!(
                "page size {} holds {} tuples of {} bytes, expected 1 to {}",
                page_size,
                slots,
                schema.byte_size(),
                MAX_SLOTS
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let path = path.as_ref().canonicalize()?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / page_size as u64) as u32;

        Ok(Self {
            file: Mutex::new(file),
            table_id: Self::table_id_for(&path),
            path,
            schema,
            page_size,
            num_pages: AtomicU32::new(num_pages),
            num_reads: AtomicU64::new(0),
            num_writes: AtomicU64::new(0),
        })
    }

    /// Hashes a canonical path into a table id. Stable across runs.
    pub fn table_id_for(canonical: &Path) -> TableId {
        TableId(crc32fast::hash(canonical.to_string_lossy().as_bytes()))
    }

    /// Reads and decodes one page.
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        self.check_table(page_id)?;
        let invalid = |reason: String| DbError::InvalidPage { page_id, reason };

        let mut data = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            let len = file.metadata()?.len();
            let end = page_id.offset(self.page_size) + self.page_size as u64;
            if end > len {
                return Err(invalid(format!(
                    "page ends at byte {} but the file has {} bytes",
                    end, len
                )));
            }
            file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
            file.read_exact(&mut data).map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => invalid("short read".to_string()),
                _ => DbError::Io(e),
            })?;
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        HeapPage::from_bytes(page_id, self.schema.clone(), &data)
    }

    /// Writes one page at its offset. Writing page `num_pages()` appends it.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.page_id();
        self.check_table(page_id)?;
        if page.page_size() != self.page_size {
            return Err(DbError::InvalidPage {
                page_id,
                reason: format!("page size {} != {}", page.page_size(), self.page_size),
            });
        }

        let data = page.to_bytes();
        let mut file = self.file.lock();
        let num_pages = self.num_pages.load(Ordering::SeqCst);
        if page_id.page_no > num_pages {
            return Err(DbError::InvalidPage {
                page_id,
                reason: format!("file has only {} pages", num_pages),
            });
        }
        file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        file.write_all(&data)?;
        file.flush()?;

        if page_id.page_no == num_pages {
            self.num_pages.store(num_pages + 1, Ordering::SeqCst);
        }
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Appends a zeroed page and returns its id.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut file = self.file.lock();
        let page_no = self.num_pages.load(Ordering::SeqCst);
        let page_id = PageId::new(self.table_id, page_no);

        file.seek(SeekFrom::Start(page_id.offset(self.page_size)))?;
        file.write_all(&HeapPage::empty_page_data(self.page_size))?;
        file.flush()?;

        self.num_pages.store(page_no + 1, Ordering::SeqCst);
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(page_id)
    }

    /// Returns an iterator over every live tuple, fetching pages through `pool`.
    pub fn iter<'a>(self: &Arc<Self>, tid: TransactionId, pool: &'a BufferPool) -> HeapFileIterator<'a> {
        HeapFileIterator::new(self.clone(), tid, pool)
    }

    fn check_table(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id != self.table_id {
            return Err(DbError::InvalidPage {
                page_id,
                reason: format!("page does not belong to {}", self.table_id),
            });
        }
        Ok(())
    }

    /// Returns the number of pages in the file.
    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::SeqCst)
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u64 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::Relaxed)
    }
}

impl Drop for HeapFile {
    fn drop(&mut self) {
        let file = self.file.get_mut();
        let _ = file.sync_all();
    }
}

/// Scans every live tuple of a heap file in (page, slot) order.
///
/// Pages are fetched one at a time through the buffer pool with read-only
/// permission, so the scan sees cached and locked state rather than raw disk bytes.
pub struct HeapFileIterator<'a> {
    file: Arc<HeapFile>,
    tid: TransactionId,
    pool: &'a BufferPool,
    open: bool,
    next_page: u32,
    pending: VecDeque<Tuple>,
}

impl<'a> HeapFileIterator<'a> {
    pub fn new(file: Arc<HeapFile>, tid: TransactionId, pool: &'a BufferPool) -> Self {
        Self {
            file,
            tid,
            pool,
            open: false,
            next_page: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn open(&mut self) -> Result<()> {
        self.open = true;
        self.next_page = 0;
        self.pending.clear();
        Ok(())
    }

    /// Returns whether another tuple is available, loading pages as needed.
    pub fn has_next(&mut self) -> Result<bool> {
        if !self.open {
            return Ok(false);
        }
        while self.pending.is_empty() {
            if self.next_page >= self.file.num_pages() {
                return Ok(false);
            }
            let page_id = PageId::new(self.file.table_id(), self.next_page);
            let page = self.pool.get_page(self.tid, page_id, Permissions::ReadOnly)?;
            self.pending.extend(page.tuples().cloned());
            self.next_page += 1;
        }
        Ok(true)
    }

    pub fn next(&mut self) -> Result<Tuple> {
        if !self.open {
            return Err(DbError::IllegalState("heap file iterator is not open".into()));
        }
        if !self.has_next()? {
            return Err(DbError::IllegalState("heap file iterator is exhausted".into()));
        }
        self.pending
            .pop_front()
            .ok_or_else(|| DbError::IllegalState("heap file iterator is exhausted".into()))
    }

    /// Restarts the scan from page 0.
    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.open = false;
        self.pending.clear();
    }
}
