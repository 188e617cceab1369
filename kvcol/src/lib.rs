//! kvcol: columnar page storage over key-addressed object stores.
//!
//! This crate is the entrypoint of the kvcol toolkit. It re-exports the page
//! sink and source together with the format and object-store types needed to
//! drive them.
//!
//! # Quick Start
//!
//! Write one cluster of one column into an in-memory container and read it
//! back:
//!
//! ```rust
//! use kvcol::{DatasetModel, ElementKind, MemObjectPool, PageSink, PageSource};
//! use kvcol::{ReadOptions, WriteOptions};
//!
//! let pool = MemObjectPool::new();
//! let uri = "mem://pool/events";
//!
//! let mut sink = PageSink::open(&pool, uri, "events", WriteOptions::default())?;
//! let columns = sink.create_dataset(&DatasetModel::new().with_column("px", ElementKind::F32))?;
//! let mut page = sink.reserve_page(&columns[0], 4)?;
//! for (chunk, v) in page.buffer_mut().chunks_exact_mut(4).zip([1.0f32, 2.0, 3.0, 4.0]) {
//!     chunk.copy_from_slice(&v.to_le_bytes());
//! }
//! sink.commit_page(&columns[0], &page)?;
//! sink.commit_cluster(4)?;
//! sink.commit_cluster_group()?;
//! sink.commit_dataset()?;
//!
//! let mut source = PageSource::open(&pool, uri, "events", ReadOptions::default())?;
//! source.attach()?;
//! let px = source.column_handle(columns[0].id)?;
//! let page = source.populate_page(&px, 2)?;
//! assert_eq!(page.element(2), Some(&3.0f32.to_le_bytes()[..]));
//! source.release_page(&page);
//! # Ok::<(), kvcol::Error>(())
//! ```
//!
//! # Architecture
//!
//! - **Engine** (`kvcol-pages`): page sink, page source, page and cluster
//!   caches, counters.
//! - **Formats** (`kvcol-format`): key mapping, anchor, descriptors and
//!   their envelopes, page codec.
//! - **Object store** (`kvcol-storage`): store traits, batched requests,
//!   in-memory and instrumented stores.
//! - **Threading** (`kvcol-threading`): the decompression worker pool.

pub use kvcol_pages::{
    ClusterCache, ColumnHandle, PageRef, PageSink, PageSource, ReadOptions, SealedPageGroup,
    SealedPageInfo, SinkCountersSnapshot, SinkState, SourceCountersSnapshot, WriteOptions,
};

pub use kvcol_format::{
    ClusterIndex, ClusterKey, Compression, DatasetDescriptor, DatasetModel, ElementKind, Page,
    PageLocator, PageMapping, SealedPage,
};

pub mod storage {
    //! Object-store contract and the bundled implementations.

    pub use kvcol_storage::{
        ContainerUri, InstrumentedConnector, InstrumentedStore, IoStats, IoStatsSnapshot,
        MemContainer, MemObjectPool, ObjectClass, ObjectKey, ObjectStore, ObjectStoreConnector,
    };
}

pub use storage::{MemObjectPool, ObjectClass};

pub use kvcol_threading::TaskScheduler;

pub use kvcol_result::{Error, Result};
