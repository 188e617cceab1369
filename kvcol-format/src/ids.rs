//! Identifier types shared by the descriptor, the sink and the source.

use std::collections::BTreeSet;

pub type ColumnId = u64;
pub type ClusterId = u64;
pub type ClusterGroupId = u64;

/// Index of an element inside one column, counted over the whole dataset.
pub type GlobalIndex = u64;

/// Address of an element relative to the start of its cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterIndex {
    pub cluster_id: ClusterId,
    pub index: u64,
}

impl ClusterIndex {
    pub const fn new(cluster_id: ClusterId, index: u64) -> Self {
        Self { cluster_id, index }
    }
}

/// A cluster together with the columns a load should fetch for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterKey {
    pub cluster_id: ClusterId,
    pub columns: BTreeSet<ColumnId>,
}

impl ClusterKey {
    pub fn new(cluster_id: ClusterId, columns: impl IntoIterator<Item = ColumnId>) -> Self {
        Self {
            cluster_id,
            columns: columns.into_iter().collect(),
        }
    }
}
