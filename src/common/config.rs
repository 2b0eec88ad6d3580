use std::time::Duration;

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity (number of resident pages)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 50;

/// Maximum length of string columns declared without an explicit length
pub const DEFAULT_STRING_LENGTH: u16 = 128;

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

/// How long a transaction may wait for a page lock before it is aborted
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Runtime knobs shared by heap files and the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Size of every page in bytes
    pub page_size: usize,
    /// Maximum number of resident pages
    pub pool_size: usize,
    /// K value for the LRU-K replacer
    pub lru_k: usize,
    /// Upper bound on a single lock wait
    pub lock_timeout: Duration,
}

impl StorageConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_lru_k(mut self, k: usize) -> Self {
        self.lru_k = k;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_size: DEFAULT_BUFFER_POOL_SIZE,
            lru_k: DEFAULT_LRUK_K,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}
