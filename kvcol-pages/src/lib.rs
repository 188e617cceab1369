//! Page sink and page source.
//!
//! [`PageSink`] writes a dataset into an object-store container: header,
//! sealed pages, per-group page lists, footer and anchor. [`PageSource`]
//! attaches to such a container and serves pages, loading whole clusters
//! through batched reads and keeping recently used ones resident.

pub mod cluster;
pub mod cluster_pool;
pub mod column;
pub mod metrics;
pub mod options;
pub mod page_pool;
pub mod sink;
pub mod source;

pub use kvcol_result::{Error, Result};

pub use cluster::{Cluster, OnDiskPageKey, PageMapBuilder};
pub use cluster_pool::ClusterPool;
pub use column::ColumnHandle;
pub use metrics::{
    PhaseTimer, SinkCounters, SinkCountersSnapshot, SourceCounters, SourceCountersSnapshot,
};
pub use options::{ClusterCache, ReadOptions, WriteOptions};
pub use page_pool::{PageDeleter, PagePool, PageRef};
pub use sink::{PageSink, SealedPageGroup, SinkState};
pub use source::{PageSource, SealedPageInfo};
