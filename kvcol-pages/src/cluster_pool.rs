//! Bounded set of resident clusters, most recently used first.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use kvcol_format::{ClusterId, ColumnId};

use crate::cluster::Cluster;

#[derive(Debug)]
pub struct ClusterPool {
    capacity: usize,
    clusters: VecDeque<Arc<Cluster>>,
}

impl ClusterPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            clusters: VecDeque::new(),
        }
    }

    /// A resident cluster holding every column of `columns`. Marks it most
    /// recently used.
    pub fn get(
        &mut self,
        cluster_id: ClusterId,
        columns: &BTreeSet<ColumnId>,
    ) -> Option<Arc<Cluster>> {
        let at = self
            .clusters
            .iter()
            .position(|c| c.id() == cluster_id && c.contains_columns(columns))?;
        let cluster = self.clusters.remove(at)?;
        self.clusters.push_front(Arc::clone(&cluster));
        Some(cluster)
    }

    pub fn contains(&self, cluster_id: ClusterId, columns: &BTreeSet<ColumnId>) -> bool {
        self.clusters
            .iter()
            .any(|c| c.id() == cluster_id && c.contains_columns(columns))
    }

    /// Inserts as most recently used, replacing an older load of the same
    /// cluster and evicting the least recently used beyond capacity.
    /// Returns the ids of evicted clusters.
    pub fn insert(&mut self, cluster: Arc<Cluster>) -> Vec<ClusterId> {
        self.clusters.retain(|c| c.id() != cluster.id());
        self.clusters.push_front(cluster);
        let mut evicted = Vec::new();
        while self.clusters.len() > self.capacity {
            if let Some(cluster) = self.clusters.pop_back() {
                tracing::trace!(cluster_id = cluster.id(), "evicting cluster");
                evicted.push(cluster.id());
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{OnDiskPageKey, PageMapBuilder};

    fn cluster(id: ClusterId, columns: &[ColumnId]) -> Arc<Cluster> {
        let mut map = PageMapBuilder::default();
        for &c in columns {
            map.push(OnDiskPageKey::new(c, 0), 1);
        }
        let size = map.size();
        Arc::new(map.finish(id, vec![0; size], columns.iter().copied().collect()))
    }

    #[test]
    fn evicts_least_recently_used() {
        let cols: BTreeSet<ColumnId> = [0].into_iter().collect();
        let mut pool = ClusterPool::new(2);
        assert!(pool.insert(cluster(0, &[0])).is_empty());
        assert!(pool.insert(cluster(1, &[0])).is_empty());
        assert!(pool.get(0, &cols).is_some());
        assert_eq!(pool.insert(cluster(2, &[0])), vec![1]);

        assert_eq!(pool.len(), 2);
        assert!(pool.contains(0, &cols));
        assert!(!pool.contains(1, &cols));
        assert!(pool.contains(2, &cols));
    }

    #[test]
    fn requires_all_columns_and_replaces_reloads() {
        let mut pool = ClusterPool::new(2);
        pool.insert(cluster(5, &[0]));
        let both: BTreeSet<ColumnId> = [0, 1].into_iter().collect();
        assert!(pool.get(5, &both).is_none());

        assert!(pool.insert(cluster(5, &[0, 1])).is_empty());
        assert_eq!(pool.len(), 1);
        assert!(pool.get(5, &both).is_some());
    }
}
