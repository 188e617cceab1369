//! Cache of populated (decompressed) pages.
//!
//! Every handle returned by the pool carries its own lease. An entry stays
//! resident while it holds leases; once an entry that has been leased at
//! least once drops to zero leases it is evicted and its release callback
//! runs. Preloaded entries start without leases and stay until they are
//! leased and released, or until their cluster leaves the cluster pool
//! ([`PagePool::evict_unleased`]).

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use kvcol_format::{ClusterId, ClusterIndex, ColumnId, GlobalIndex, Page};
use rustc_hash::FxHashSet;

/// Called once with the page when its pool entry is dropped.
pub type PageDeleter = Box<dyn FnOnce(&Page) + Send>;

/// A leased page. Release it through the pool that handed it out.
#[derive(Clone, Debug)]
pub struct PageRef {
    page: Arc<Page>,
    lease: u64,
}

impl PageRef {
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }
}

impl Deref for PageRef {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.page
    }
}

struct PoolEntry {
    page: Arc<Page>,
    leases: FxHashSet<u64>,
    ever_leased: bool,
    deleter: Option<PageDeleter>,
}

impl PoolEntry {
    fn same_window(&self, page: &Page) -> bool {
        self.page.column_id() == page.column_id()
            && self.page.cluster_info() == page.cluster_info()
            && self.page.global_range_first() == page.global_range_first()
    }
}

impl Drop for PoolEntry {
    fn drop(&mut self) {
        if let Some(deleter) = self.deleter.take() {
            deleter(&self.page);
        }
    }
}

#[derive(Default)]
struct PoolState {
    entries: Vec<PoolEntry>,
    next_lease: u64,
}

impl PoolState {
    fn lease(&mut self, at: usize) -> PageRef {
        let lease = self.next_lease;
        self.next_lease += 1;
        let entry = &mut self.entries[at];
        entry.leases.insert(lease);
        entry.ever_leased = true;
        PageRef {
            page: Arc::clone(&entry.page),
            lease,
        }
    }

    fn find(&self, pred: impl Fn(&Page) -> bool) -> Option<usize> {
        self.entries.iter().position(|e| pred(&e.page))
    }
}

/// Thread-safe page cache; registration may come from several workers.
#[derive(Default)]
pub struct PagePool {
    state: Mutex<PoolState>,
}

impl PagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a page and leases it to the caller. If a page with the same
    /// window is already resident, that page is leased instead and `page`
    /// is dropped along with its callback unrun.
    pub fn register(&self, page: Page, deleter: Option<PageDeleter>) -> PageRef {
        let mut state = self.state.lock().expect("PagePool lock poisoned");
        let at = match state.entries.iter().position(|e| e.same_window(&page)) {
            Some(at) => at,
            None => {
                state.entries.push(PoolEntry {
                    page: Arc::new(page),
                    leases: FxHashSet::default(),
                    ever_leased: false,
                    deleter,
                });
                state.entries.len() - 1
            }
        };
        state.lease(at)
    }

    /// Inserts a page without leasing it. Returns `false` if a page with the
    /// same window is already resident.
    pub fn preload(&self, page: Page, deleter: Option<PageDeleter>) -> bool {
        let mut state = self.state.lock().expect("PagePool lock poisoned");
        if state.entries.iter().any(|e| e.same_window(&page)) {
            return false;
        }
        state.entries.push(PoolEntry {
            page: Arc::new(page),
            leases: FxHashSet::default(),
            ever_leased: false,
            deleter,
        });
        true
    }

    pub fn get_by_global_index(&self, column_id: ColumnId, index: GlobalIndex) -> Option<PageRef> {
        let mut state = self.state.lock().expect("PagePool lock poisoned");
        let at = state.find(|p| p.column_id() == column_id && p.contains(index))?;
        Some(state.lease(at))
    }

    pub fn get_by_cluster_index(&self, column_id: ColumnId, at: ClusterIndex) -> Option<PageRef> {
        let mut state = self.state.lock().expect("PagePool lock poisoned");
        let idx = state.find(|p| p.column_id() == column_id && p.contains_cluster_index(at))?;
        Some(state.lease(idx))
    }

    /// Returns a lease. Unknown or already returned leases are ignored.
    pub fn release(&self, page: &PageRef) {
        let evicted = {
            let mut state = self.state.lock().expect("PagePool lock poisoned");
            let Some(at) = state
                .entries
                .iter()
                .position(|e| e.leases.contains(&page.lease))
            else {
                return;
            };
            let entry = &mut state.entries[at];
            entry.leases.remove(&page.lease);
            if entry.ever_leased && entry.leases.is_empty() {
                Some(state.entries.swap_remove(at))
            } else {
                None
            }
        };
        // Release callbacks run outside the lock.
        drop(evicted);
    }

    /// Drops every page of `cluster_id` that holds no lease and returns how
    /// many were dropped. Leased pages stay until their last release.
    pub fn evict_unleased(&self, cluster_id: ClusterId) -> usize {
        let evicted: Vec<PoolEntry> = {
            let mut state = self.state.lock().expect("PagePool lock poisoned");
            let (evicted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.entries)
                .into_iter()
                .partition(|e| {
                    e.page.cluster_info().cluster_id == cluster_id && e.leases.is_empty()
                });
            state.entries = kept;
            evicted
        };
        let n = evicted.len();
        // Release callbacks run outside the lock.
        drop(evicted);
        n
    }

    /// Resident pages.
    pub fn len(&self) -> usize {
        self.state.lock().expect("PagePool lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool").field("len", &self.len()).finish()
    }
}
