//! In-memory description of a dataset: its columns, clusters and the pages
//! each cluster holds per column.

use std::collections::BTreeMap;

use bitcode::{Decode, Encode};

use crate::element::ElementKind;
use crate::ids::{ClusterGroupId, ClusterId, ColumnId, GlobalIndex};
use crate::key_mapping::PageMapping;
use crate::locator::PageLocator;

#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub name: String,
    pub kind: ElementKind,
}

/// Elements of one column inside one cluster, in global coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct ColumnRange {
    pub column_id: ColumnId,
    pub first_element_index: GlobalIndex,
    pub n_elements: u64,
}

impl ColumnRange {
    pub fn contains(&self, index: GlobalIndex) -> bool {
        index >= self.first_element_index && index < self.first_element_index + self.n_elements
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct PageInfo {
    pub n_elements: u32,
    pub locator: PageLocator,
}

/// A page found by [`PageRange::find`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageLookup {
    pub info: PageInfo,
    /// Ordinal of the page within its column in this cluster.
    pub page_no: u64,
    /// Cluster-relative index of the page's first element.
    pub first_in_page: u64,
}

/// Ordered pages of one column inside one cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct PageRange {
    pub column_id: ColumnId,
    pub page_infos: Vec<PageInfo>,
}

impl PageRange {
    pub fn n_elements(&self) -> u64 {
        self.page_infos
            .iter()
            .map(|info| u64::from(info.n_elements))
            .sum()
    }

    pub fn bytes_on_storage(&self) -> u64 {
        self.page_infos
            .iter()
            .map(|info| u64::from(info.locator.bytes_on_storage))
            .sum()
    }

    /// Finds the page holding the element at `index_in_cluster`.
    pub fn find(&self, index_in_cluster: u64) -> Option<PageLookup> {
        let mut first_in_page = 0u64;
        for (page_no, info) in self.page_infos.iter().enumerate() {
            let next = first_in_page + u64::from(info.n_elements);
            if index_in_cluster < next {
                return Some(PageLookup {
                    info: *info,
                    page_no: page_no as u64,
                    first_in_page,
                });
            }
            first_in_page = next;
        }
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterDescriptor {
    pub id: ClusterId,
    pub first_entry_index: u64,
    pub n_entries: u64,
    pub(crate) column_ranges: BTreeMap<ColumnId, ColumnRange>,
    pub(crate) page_ranges: BTreeMap<ColumnId, PageRange>,
}

impl ClusterDescriptor {
    pub fn new(id: ClusterId, first_entry_index: u64, n_entries: u64) -> Self {
        Self {
            id,
            first_entry_index,
            n_entries,
            column_ranges: BTreeMap::new(),
            page_ranges: BTreeMap::new(),
        }
    }

    pub fn add_column(&mut self, range: ColumnRange, pages: PageRange) {
        debug_assert_eq!(range.column_id, pages.column_id);
        debug_assert_eq!(range.n_elements, pages.n_elements());
        self.column_ranges.insert(range.column_id, range);
        self.page_ranges.insert(pages.column_id, pages);
    }

    pub fn has_column(&self, column_id: ColumnId) -> bool {
        self.column_ranges.contains_key(&column_id)
    }

    pub fn column_range(&self, column_id: ColumnId) -> Option<&ColumnRange> {
        self.column_ranges.get(&column_id)
    }

    pub fn page_range(&self, column_id: ColumnId) -> Option<&PageRange> {
        self.page_ranges.get(&column_id)
    }

    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.column_ranges.keys().copied()
    }

    pub fn n_pages(&self) -> usize {
        self.page_ranges.values().map(|r| r.page_infos.len()).sum()
    }
}

/// Clusters whose page lists were persisted together.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ClusterGroupDescriptor {
    pub id: ClusterGroupId,
    pub cluster_ids: Vec<ClusterId>,
    pub page_list_locator: PageLocator,
    /// Uncompressed length of the page list.
    pub page_list_length: u32,
}

/// Columns a writer declares before creating a dataset.
#[derive(Clone, Debug, Default)]
pub struct DatasetModel {
    columns: Vec<(String, ElementKind)>,
}

impl DatasetModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column(mut self, name: impl Into<String>, kind: ElementKind) -> Self {
        self.columns.push((name.into(), kind));
        self
    }

    pub fn columns(&self) -> &[(String, ElementKind)] {
        &self.columns
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetDescriptor {
    name: String,
    page_mapping: PageMapping,
    columns: Vec<ColumnDescriptor>,
    clusters: BTreeMap<ClusterId, ClusterDescriptor>,
    cluster_groups: Vec<ClusterGroupDescriptor>,
}

impl DatasetDescriptor {
    pub fn new(name: impl Into<String>, page_mapping: PageMapping) -> Self {
        Self {
            name: name.into(),
            page_mapping,
            columns: Vec::new(),
            clusters: BTreeMap::new(),
            cluster_groups: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_mapping(&self) -> PageMapping {
        self.page_mapping
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, column_id: ColumnId) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn cluster(&self, cluster_id: ClusterId) -> Option<&ClusterDescriptor> {
        self.clusters.get(&cluster_id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterDescriptor> {
        self.clusters.values()
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn n_entries(&self) -> u64 {
        self.clusters.values().map(|c| c.n_entries).sum()
    }

    pub fn cluster_groups(&self) -> &[ClusterGroupDescriptor] {
        &self.cluster_groups
    }

    /// Cluster whose range of `column_id` holds the element at `index`.
    pub fn find_cluster_id(&self, column_id: ColumnId, index: GlobalIndex) -> Option<ClusterId> {
        self.clusters
            .values()
            .find(|c| c.column_range(column_id).is_some_and(|r| r.contains(index)))
            .map(|c| c.id)
    }

    /// The cluster following `cluster_id` in id order.
    pub fn next_cluster_id(&self, cluster_id: ClusterId) -> Option<ClusterId> {
        self.clusters
            .range(cluster_id + 1..)
            .next()
            .map(|(id, _)| *id)
    }

    /// Elements of `column_id` across all clusters.
    pub fn n_elements(&self, column_id: ColumnId) -> u64 {
        self.clusters
            .values()
            .filter_map(|c| c.column_range(column_id))
            .map(|r| r.n_elements)
            .sum()
    }

    pub(crate) fn add_column(&mut self, column: ColumnDescriptor) {
        self.columns.push(column);
    }

    pub(crate) fn add_cluster(&mut self, cluster: ClusterDescriptor) {
        self.clusters.insert(cluster.id, cluster);
    }

    pub(crate) fn add_cluster_group(&mut self, group: ClusterGroupDescriptor) {
        self.cluster_groups.push(group);
    }
}
