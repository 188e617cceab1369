//! Object store layer for kvcol.
//!
//! Pages and metadata records are stored as opaque values in a key-addressed
//! store. A value lives under an (object id, distribution key, attribute key)
//! triple inside a container; containers live inside pools and are opened by
//! URI. This crate defines that contract ([`ObjectStore`],
//! [`ObjectStoreConnector`]), the batched request shape ([`BatchWrite`],
//! [`BatchRead`]), the closed set of storage object classes, and two
//! implementations used by tests and benchmarks:
//!
//! - [`MemObjectPool`] / [`MemContainer`]: in-memory containers.
//! - [`InstrumentedConnector`] / [`InstrumentedStore`]: wrappers counting
//!   round trips, keys and bytes into an [`IoStats`].

pub mod batch;
pub mod constants;
pub mod object_class;
pub mod store;
pub mod types;
pub mod uri;

pub use batch::{BatchRead, BatchWrite, MultiObjectRwOperation, RwOperation};
pub use object_class::ObjectClass;
pub use store::*;
pub use types::{AttributeKey, DistributionKey, ObjectId, ObjectKey, OidDkeyPair};
pub use uri::ContainerUri;
