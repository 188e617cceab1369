//! Sink and source configuration.

use kvcol_format::{Compression, PageMapping};
use kvcol_storage::ObjectClass;

#[derive(Clone, Debug)]
pub struct WriteOptions {
    pub compression: Compression,
    /// Object class name for page values; validated when the dataset is
    /// created.
    pub object_class: String,
    pub page_mapping: PageMapping,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            object_class: ObjectClass::default().name().to_string(),
            page_mapping: PageMapping::default(),
        }
    }
}

impl WriteOptions {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_object_class(mut self, object_class: impl Into<String>) -> Self {
        self.object_class = object_class.into();
        self
    }

    pub fn with_page_mapping(mut self, page_mapping: PageMapping) -> Self {
        self.page_mapping = page_mapping;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClusterCache {
    /// Every page miss reads exactly that page.
    Off,
    /// Page misses load whole clusters through batched reads.
    #[default]
    On,
}

#[derive(Clone, Debug)]
pub struct ReadOptions {
    pub cluster_cache: ClusterCache,
    /// Clusters fetched together by one batched load.
    pub cluster_bunch_size: usize,
    /// Clusters kept resident.
    pub cluster_pool_capacity: usize,
    /// Workers decompressing freshly loaded clusters. `None` decompresses
    /// pages lazily on the calling thread.
    pub unzip_threads: Option<usize>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            cluster_cache: ClusterCache::On,
            cluster_bunch_size: 1,
            cluster_pool_capacity: 2,
            unzip_threads: None,
        }
    }
}

impl ReadOptions {
    pub fn with_cluster_cache(mut self, cluster_cache: ClusterCache) -> Self {
        self.cluster_cache = cluster_cache;
        self
    }

    pub fn with_cluster_bunch_size(mut self, n: usize) -> Self {
        self.cluster_bunch_size = n.max(1);
        self
    }

    pub fn with_cluster_pool_capacity(mut self, n: usize) -> Self {
        self.cluster_pool_capacity = n.max(1);
        self
    }

    pub fn with_unzip_threads(mut self, n: Option<usize>) -> Self {
        self.unzip_threads = n;
        self
    }
}
