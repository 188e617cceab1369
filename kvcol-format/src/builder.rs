//! Write-side descriptor bookkeeping.

use rustc_hash::FxHashMap;

use kvcol_result::{Error, Result};

use crate::descriptor::{
    ClusterDescriptor, ClusterGroupDescriptor, ColumnDescriptor, ColumnRange, DatasetDescriptor,
    PageInfo, PageRange,
};
use crate::element::ElementKind;
use crate::ids::{ClusterGroupId, ClusterId, ColumnId, GlobalIndex};
use crate::key_mapping::PageMapping;
use crate::locator::PageLocator;

/// Accumulates pages into the open cluster, seals clusters and groups them.
#[derive(Debug)]
pub struct DescriptorBuilder {
    descriptor: DatasetDescriptor,
    /// Pages committed to the open cluster, per column.
    open_pages: FxHashMap<ColumnId, Vec<PageInfo>>,
    /// Next global element index, per column.
    column_offsets: FxHashMap<ColumnId, GlobalIndex>,
    next_entry: u64,
    ungrouped: Vec<ClusterId>,
}

impl DescriptorBuilder {
    pub fn new(name: impl Into<String>, page_mapping: PageMapping) -> Self {
        Self {
            descriptor: DatasetDescriptor::new(name, page_mapping),
            open_pages: FxHashMap::default(),
            column_offsets: FxHashMap::default(),
            next_entry: 0,
            ungrouped: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    pub fn add_column(&mut self, name: impl Into<String>, kind: ElementKind) -> ColumnId {
        let id = self.descriptor.columns().len() as ColumnId;
        self.descriptor.add_column(ColumnDescriptor {
            id,
            name: name.into(),
            kind,
        });
        self.column_offsets.insert(id, 0);
        id
    }

    /// Id the next committed cluster will get.
    pub fn current_cluster_id(&self) -> ClusterId {
        self.descriptor.n_clusters() as ClusterId
    }

    pub fn add_page(&mut self, column_id: ColumnId, info: PageInfo) -> Result<()> {
        if self.descriptor.column(column_id).is_none() {
            return Err(Error::InvalidArgumentError(format!(
                "unknown column {column_id}"
            )));
        }
        self.open_pages.entry(column_id).or_default().push(info);
        Ok(())
    }

    /// Seals the open cluster and returns its id.
    pub fn commit_cluster(&mut self, n_entries: u64) -> ClusterId {
        let id = self.current_cluster_id();
        let mut cluster = ClusterDescriptor::new(id, self.next_entry, n_entries);
        for column in self.descriptor.columns() {
            let page_infos = self.open_pages.remove(&column.id).unwrap_or_default();
            let pages = PageRange {
                column_id: column.id,
                page_infos,
            };
            let offset = self.column_offsets.entry(column.id).or_insert(0);
            let range = ColumnRange {
                column_id: column.id,
                first_element_index: *offset,
                n_elements: pages.n_elements(),
            };
            *offset += range.n_elements;
            cluster.add_column(range, pages);
        }
        self.next_entry += n_entries;
        self.descriptor.add_cluster(cluster);
        self.ungrouped.push(id);
        id
    }

    /// Clusters committed since the last cluster group.
    pub fn ungrouped_clusters(&self) -> impl Iterator<Item = &ClusterDescriptor> {
        self.ungrouped
            .iter()
            .filter_map(|id| self.descriptor.cluster(*id))
    }

    /// Id the next cluster group will get.
    pub fn next_cluster_group_id(&self) -> ClusterGroupId {
        self.descriptor.cluster_groups().len() as ClusterGroupId
    }

    /// Groups the ungrouped clusters under the page list stored at `locator`.
    pub fn commit_cluster_group(
        &mut self,
        page_list_locator: PageLocator,
        page_list_length: u32,
    ) -> ClusterGroupId {
        let id = self.next_cluster_group_id();
        self.descriptor.add_cluster_group(ClusterGroupDescriptor {
            id,
            cluster_ids: std::mem::take(&mut self.ungrouped),
            page_list_locator,
            page_list_length,
        });
        id
    }
}
