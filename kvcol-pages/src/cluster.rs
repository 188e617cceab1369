//! Loaded clusters: one arena of sealed pages plus a page map.

use std::collections::BTreeSet;

use kvcol_format::{ClusterId, ColumnId};
use rustc_hash::FxHashMap;

/// Locates a sealed page inside the cluster that loaded it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OnDiskPageKey {
    pub column_id: ColumnId,
    /// Ordinal of the page within its column in this cluster.
    pub page_no: u64,
}

impl OnDiskPageKey {
    pub const fn new(column_id: ColumnId, page_no: u64) -> Self {
        Self { column_id, page_no }
    }
}

#[derive(Clone, Copy, Debug)]
struct ArenaSlice {
    offset: usize,
    len: usize,
}

/// Sealed pages of some columns of one cluster.
///
/// All pages live in one contiguous arena; the page map records where each
/// page sits. The arena and the map are dropped together.
#[derive(Debug)]
pub struct Cluster {
    id: ClusterId,
    arena: Vec<u8>,
    page_map: FxHashMap<OnDiskPageKey, ArenaSlice>,
    columns: BTreeSet<ColumnId>,
}

/// Builds a [`Cluster`]'s page map while its arena is laid out.
#[derive(Debug, Default)]
pub struct PageMapBuilder {
    page_map: FxHashMap<OnDiskPageKey, ArenaSlice>,
    size: usize,
}

impl PageMapBuilder {
    /// Reserves the next `len` arena bytes for `key`; returns the offset.
    pub fn push(&mut self, key: OnDiskPageKey, len: usize) -> usize {
        let offset = self.size;
        self.page_map.insert(key, ArenaSlice { offset, len });
        self.size += len;
        offset
    }

    /// Arena size needed so far.
    pub fn size(&self) -> usize {
        self.size
    }

    /// # Panics
    ///
    /// If the arena is not exactly the size the map was laid out for.
    pub fn finish(self, id: ClusterId, arena: Vec<u8>, columns: BTreeSet<ColumnId>) -> Cluster {
        assert_eq!(
            arena.len(),
            self.size,
            "cluster {id}: arena does not match its page map"
        );
        Cluster {
            id,
            arena,
            page_map: self.page_map,
            columns,
        }
    }
}

impl Cluster {
    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn contains_column(&self, column_id: ColumnId) -> bool {
        self.columns.contains(&column_id)
    }

    pub fn contains_columns<'a>(&self, columns: impl IntoIterator<Item = &'a ColumnId>) -> bool {
        columns.into_iter().all(|c| self.columns.contains(c))
    }

    pub fn available_columns(&self) -> &BTreeSet<ColumnId> {
        &self.columns
    }

    /// Sealed bytes of a page, if this cluster loaded it.
    pub fn on_disk_page(&self, key: OnDiskPageKey) -> Option<&[u8]> {
        let slice = self.page_map.get(&key)?;
        self.arena.get(slice.offset..slice.offset + slice.len)
    }

    pub fn n_pages(&self) -> usize {
        self.page_map.len()
    }

    pub fn arena_size(&self) -> usize {
        self.arena.len()
    }
}
