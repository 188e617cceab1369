//! In-memory pages and their sealed (compressed) form.

use kvcol_result::{Error, Result};

use crate::compression::{Compression, unzip, zip};
use crate::element::ElementKind;
use crate::ids::{ClusterId, ClusterIndex, ColumnId, GlobalIndex};

/// The cluster a populated page belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClusterInfo {
    pub cluster_id: ClusterId,
    /// Global index of the cluster's first element in this column.
    pub index_offset: GlobalIndex,
}

/// A contiguous run of elements of one column.
///
/// Pages built for writing only carry their buffer. Pages populated by a
/// source also carry a window: the global index of their first element and
/// the cluster they came from.
#[derive(Clone, Debug)]
pub struct Page {
    column_id: ColumnId,
    buffer: Vec<u8>,
    element_size: usize,
    n_elements: u32,
    range_first: GlobalIndex,
    cluster_info: ClusterInfo,
}

impl Page {
    /// Zero-filled page holding `n_elements` elements.
    pub fn new(column_id: ColumnId, element_size: usize, n_elements: u32) -> Self {
        Self::from_buffer(
            column_id,
            vec![0u8; element_size * n_elements as usize],
            element_size,
            n_elements,
        )
    }

    /// # Panics
    ///
    /// If the buffer length is not `element_size * n_elements`.
    pub fn from_buffer(
        column_id: ColumnId,
        buffer: Vec<u8>,
        element_size: usize,
        n_elements: u32,
    ) -> Self {
        assert_eq!(
            buffer.len(),
            element_size * n_elements as usize,
            "page buffer does not match its element count"
        );
        Self {
            column_id,
            buffer,
            element_size,
            n_elements,
            range_first: 0,
            cluster_info: ClusterInfo::default(),
        }
    }

    pub fn set_window(&mut self, range_first: GlobalIndex, cluster_info: ClusterInfo) {
        self.range_first = range_first;
        self.cluster_info = cluster_info;
    }

    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn n_elements(&self) -> u32 {
        self.n_elements
    }

    pub fn global_range_first(&self) -> GlobalIndex {
        self.range_first
    }

    /// Cluster-relative index of the first element.
    pub fn cluster_range_first(&self) -> u64 {
        self.range_first - self.cluster_info.index_offset
    }

    pub fn cluster_info(&self) -> ClusterInfo {
        self.cluster_info
    }

    pub fn contains(&self, index: GlobalIndex) -> bool {
        index >= self.range_first && index < self.range_first + u64::from(self.n_elements)
    }

    pub fn contains_cluster_index(&self, at: ClusterIndex) -> bool {
        let first = self.cluster_range_first();
        at.cluster_id == self.cluster_info.cluster_id
            && at.index >= first
            && at.index < first + u64::from(self.n_elements)
    }

    /// Bytes of the element at `index` (global).
    pub fn element(&self, index: GlobalIndex) -> Option<&[u8]> {
        if !self.contains(index) {
            return None;
        }
        let at = (index - self.range_first) as usize * self.element_size;
        self.buffer.get(at..at + self.element_size)
    }
}

/// Compressed, storage-ready page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SealedPage {
    pub buffer: Vec<u8>,
    pub n_elements: u32,
}

impl SealedPage {
    pub fn size(&self) -> usize {
        self.buffer.len()
    }
}

pub fn seal_page(
    page: &Page,
    element: ElementKind,
    compression: Compression,
) -> Result<SealedPage> {
    let expected = element.size() * page.n_elements() as usize;
    if page.element_size() != element.size() || page.buffer().len() != expected {
        return Err(Error::InvalidArgumentError(format!(
            "page of column {} holds {} bytes, {:?} x {} needs {expected}",
            page.column_id(),
            page.buffer().len(),
            element,
            page.n_elements()
        )));
    }
    Ok(SealedPage {
        buffer: zip(page.buffer(), compression)?,
        n_elements: page.n_elements(),
    })
}

/// Decompresses a sealed page to exactly `n_elements * element.size()` bytes.
pub fn unseal_page(sealed: &[u8], n_elements: u32, element: ElementKind) -> Result<Vec<u8>> {
    unzip(sealed, element.size() * n_elements as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_answers_both_index_forms() {
        let mut page = Page::new(3, 4, 10);
        page.set_window(
            105,
            ClusterInfo {
                cluster_id: 2,
                index_offset: 100,
            },
        );
        assert!(page.contains(105));
        assert!(page.contains(114));
        assert!(!page.contains(115));
        assert_eq!(page.cluster_range_first(), 5);
        assert!(page.contains_cluster_index(ClusterIndex::new(2, 5)));
        assert!(!page.contains_cluster_index(ClusterIndex::new(1, 5)));
        assert!(!page.contains_cluster_index(ClusterIndex::new(2, 15)));
    }

    #[test]
    fn seal_then_unseal() {
        let mut page = Page::new(0, 8, 20);
        for (i, chunk) in page.buffer_mut().chunks_mut(8).enumerate() {
            chunk.copy_from_slice(&(i as u64).to_le_bytes());
        }
        let sealed = seal_page(&page, ElementKind::U64, Compression::default()).unwrap();
        assert_eq!(sealed.n_elements, 20);
        let raw = unseal_page(&sealed.buffer, 20, ElementKind::U64).unwrap();
        assert_eq!(raw, page.buffer());
    }

    #[test]
    fn seal_rejects_mismatched_element_kind() {
        let page = Page::new(0, 4, 2);
        assert!(seal_page(&page, ElementKind::U64, Compression::None).is_err());
    }
}
