//! Key-addressed object-store contract plus in-memory and instrumented
//! implementations.
//!
//! The engine never talks to a concrete store. It consumes the narrow surface
//! below: single-key reads and writes, batched reads and writes grouped by
//! (object id, distribution key), and container open-or-create by URI. Every
//! call is blocking from the caller's point of view.

use std::sync::Arc;

use kvcol_result::Result;

use crate::batch::{BatchRead, BatchWrite};
use crate::object_class::ObjectClass;
use crate::types::ObjectKey;
use crate::uri::ContainerUri;

pub mod instrumented_store;
pub use instrumented_store::*;

pub mod mem_store;
pub use mem_store::*;

pub trait ObjectStore: Send + Sync + 'static {
    /// Writes one value under `key`, replacing any previous value.
    fn write_single(&self, key: &ObjectKey, class: ObjectClass, data: &[u8]) -> Result<()>;

    /// Reads the value under `key` into the front of `buf` and returns its
    /// length. Fails if the key is absent or the value does not fit.
    fn read_single(&self, key: &ObjectKey, class: ObjectClass, buf: &mut [u8]) -> Result<usize>;

    /// Writes every value of the batch. Either the whole batch succeeds or
    /// the call fails; no partial success is reported.
    fn write_batch(&self, requests: &BatchWrite<'_>, class: ObjectClass) -> Result<()>;

    /// Fills every destination slice of the batch. Each stored value must
    /// have exactly the length of its slice.
    fn read_batch(&self, requests: &mut BatchRead<'_>, class: ObjectClass) -> Result<()>;
}

/// Opens containers by URI. Implementations own the pool/container session
/// state; the engine only asks for a store handle.
pub trait ObjectStoreConnector: Send + Sync + 'static {
    type Store: ObjectStore;

    /// Opens the container named by `uri`, creating it first if `create` is
    /// set and it does not exist yet.
    fn open_container(&self, uri: &ContainerUri, create: bool) -> Result<Arc<Self::Store>>;
}
