use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Timestamp};

/// Tracks access history for a single resident page
#[derive(Debug)]
struct AccessHistory {
    /// Last k access timestamps (most recent at back)
    history: VecDeque<Timestamp>,
}

impl AccessHistory {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Returns the backward k-distance, or None (+inf) with fewer than k accesses.
    fn k_distance(&self, current_timestamp: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            Some(current_timestamp - self.history[self.history.len() - k])
        }
    }

    fn earliest_timestamp(&self) -> Option<Timestamp> {
        self.history.front().copied()
    }
}

/// LRU-K Replacement Policy
///
/// Picks the page whose backward k-distance is the largest among the
/// candidates. Backward k-distance is the time since the kth most recent access.
///
/// A page with fewer than k recorded accesses has +inf backward k-distance.
/// Ties among +inf pages go to the one with the earliest recorded access.
///
/// The caller decides which pages are evictable at eviction time.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Current timestamp (monotonically increasing)
    current_timestamp: AtomicU64,
    /// Access information for each tracked page
    pages: Mutex<HashMap<PageId, AccessHistory>>,
}

impl LruKReplacer {
    pub fn new(k: usize) -> Self {
        Self {
            k: k.max(1),
            current_timestamp: AtomicU64::new(0),
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Removes and returns the tracked page with the largest backward
    /// k-distance among those for which `evictable` returns true.
    pub fn evict_where<F>(&self, mut evictable: F) -> Option<PageId>
    where
        F: FnMut(PageId) -> bool,
    {
        let mut pages = self.pages.lock();
        let current_ts = self.current_timestamp.load(Ordering::Relaxed);

        let mut victim: Option<PageId> = None;
        let mut victim_k_dist: Option<Timestamp> = None;
        let mut victim_earliest_ts: Option<Timestamp> = None;

        for (&page_id, info) in pages.iter() {
            if !evictable(page_id) {
                continue;
            }

            let k_dist = info.k_distance(current_ts, self.k);
            let earliest_ts = info.earliest_timestamp();

            let should_replace = match (victim_k_dist, k_dist) {
                (None, Some(_)) => false,
                (Some(_), None) => true,
                (None, None) => match (victim_earliest_ts, earliest_ts) {
                    (Some(v_ts), Some(c_ts)) => c_ts < v_ts,
                    (None, Some(_)) => true,
                    _ => false,
                },
                (Some(v_dist), Some(c_dist)) => c_dist > v_dist,
            };

            if victim.is_none() || should_replace {
                victim = Some(page_id);
                victim_k_dist = k_dist;
                victim_earliest_ts = earliest_ts;
            }
        }

        if let Some(page_id) = victim {
            pages.remove(&page_id);
        }
        victim
    }

    /// Records that the given page was accessed at the current timestamp.
    pub fn record_access(&self, page_id: PageId) {
        let timestamp = self.current_timestamp.fetch_add(1, Ordering::Relaxed);
        self.pages
            .lock()
            .entry(page_id)
            .or_insert_with(AccessHistory::new)
            .record_access(timestamp, self.k);
    }

    /// Stops tracking a page.
    pub fn remove(&self, page_id: PageId) {
        self.pages.lock().remove(&page_id);
    }

    /// Returns the number of tracked pages.
    pub fn size(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
