//! On-storage formats of the kvcol page storage engine.
//!
//! Everything here is pure: no I/O, no shared state. The page sink and
//! source (`kvcol-pages`) combine these pieces with an object store.
//!
//! - [`key_mapping`]: logical page coordinates to object-store keys.
//! - [`anchor`]: the fixed-layout root record written last.
//! - [`descriptor`] and [`builder`]: the dataset's columns, clusters and
//!   page locations.
//! - [`serialization`]: header, footer and page-list envelopes.
//! - [`compression`] and [`page`]: the page codec.

pub mod anchor;
pub mod builder;
pub mod codecs;
pub mod compression;
pub mod descriptor;
pub mod element;
pub mod ids;
pub mod key_mapping;
pub mod locator;
pub mod page;
pub mod serialization;

pub use anchor::Anchor;
pub use builder::DescriptorBuilder;
pub use compression::{Compression, unzip, zip};
pub use descriptor::{
    ClusterDescriptor, ClusterGroupDescriptor, ColumnDescriptor, ColumnRange, DatasetDescriptor,
    DatasetModel, PageInfo, PageLookup, PageRange,
};
pub use element::ElementKind;
pub use ids::{ClusterGroupId, ClusterId, ClusterIndex, ClusterKey, ColumnId, GlobalIndex};
pub use key_mapping::{PageMapping, map_page_key};
pub use locator::PageLocator;
pub use page::{ClusterInfo, Page, SealedPage, seal_page, unseal_page};
