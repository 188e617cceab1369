use super::{ObjectStore, ObjectStoreConnector};
use crate::batch::{BatchRead, BatchWrite};
use crate::object_class::ObjectClass;
use crate::types::ObjectKey;
use crate::uri::ContainerUri;
use kvcol_result::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe container for object-store I/O statistics.
#[derive(Debug, Default)]
pub struct IoStats {
    // --- Single-key calls ---
    pub single_reads: AtomicU64,
    pub single_writes: AtomicU64,

    // --- Batched calls (i.e., remote round trips) ---
    pub read_batches: AtomicU64,
    pub write_batches: AtomicU64,

    // --- (object id, distribution key) groups inside batched calls ---
    pub read_groups: AtomicU64,
    pub write_groups: AtomicU64,

    // --- Individual values inside batched calls ---
    pub batch_read_keys: AtomicU64,
    pub batch_write_keys: AtomicU64,

    // --- Payload ---
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl IoStats {
    /// Capture a point-in-time snapshot of the accumulated metrics.
    pub fn snapshot(&self) -> IoStatsSnapshot {
        IoStatsSnapshot {
            single_reads: self.single_reads.load(Ordering::Relaxed),
            single_writes: self.single_writes.load(Ordering::Relaxed),
            read_batches: self.read_batches.load(Ordering::Relaxed),
            write_batches: self.write_batches.load(Ordering::Relaxed),
            read_groups: self.read_groups.load(Ordering::Relaxed),
            write_groups: self.write_groups.load(Ordering::Relaxed),
            batch_read_keys: self.batch_read_keys.load(Ordering::Relaxed),
            batch_write_keys: self.batch_write_keys.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }

    /// Runs `f` and returns its result together with the I/O recorded
    /// while it ran. Calls from other threads in the meantime are included.
    pub fn measure<T>(&self, f: impl FnOnce() -> T) -> (T, IoStatsSnapshot) {
        let before = self.snapshot();
        let out = f();
        (out, self.snapshot().delta_since(&before))
    }

    /// Reset all statistics to zero.
    pub fn reset(&self) {
        self.single_reads.store(0, Ordering::Relaxed);
        self.single_writes.store(0, Ordering::Relaxed);
        self.read_batches.store(0, Ordering::Relaxed);
        self.write_batches.store(0, Ordering::Relaxed);
        self.read_groups.store(0, Ordering::Relaxed);
        self.write_groups.store(0, Ordering::Relaxed);
        self.batch_read_keys.store(0, Ordering::Relaxed);
        self.batch_write_keys.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
    }
}

/// Immutable copy of [`IoStats`] counters captured at a specific moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStatsSnapshot {
    pub single_reads: u64,
    pub single_writes: u64,
    pub read_batches: u64,
    pub write_batches: u64,
    pub read_groups: u64,
    pub write_groups: u64,
    pub batch_read_keys: u64,
    pub batch_write_keys: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl IoStatsSnapshot {
    /// Compute the delta between two snapshots (`newer - older`). Saturates at zero.
    pub fn delta_since(&self, older: &Self) -> Self {
        macro_rules! delta {
            ($field:ident) => {
                self.$field.saturating_sub(older.$field)
            };
        }

        Self {
            single_reads: delta!(single_reads),
            single_writes: delta!(single_writes),
            read_batches: delta!(read_batches),
            write_batches: delta!(write_batches),
            read_groups: delta!(read_groups),
            write_groups: delta!(write_groups),
            batch_read_keys: delta!(batch_read_keys),
            batch_write_keys: delta!(batch_write_keys),
            bytes_read: delta!(bytes_read),
            bytes_written: delta!(bytes_written),
        }
    }

    fn per_batch(keys: u64, batches: u64) -> f64 {
        if batches == 0 {
            0.0
        } else {
            keys as f64 / batches as f64
        }
    }

    /// Average values fetched per batched read.
    pub fn keys_per_read_batch(&self) -> f64 {
        Self::per_batch(self.batch_read_keys, self.read_batches)
    }

    /// Average values stored per batched write.
    pub fn keys_per_write_batch(&self) -> f64 {
        Self::per_batch(self.batch_write_keys, self.write_batches)
    }

    /// Remote round trips of any kind.
    pub fn round_trips(&self) -> u64 {
        self.single_reads + self.single_writes + self.read_batches + self.write_batches
    }
}

/// A wrapper around any store that instruments I/O operations.
#[derive(Debug)]
pub struct InstrumentedStore<S: ObjectStore> {
    inner: Arc<S>,
    stats: Arc<IoStats>,
}

impl<S: ObjectStore> InstrumentedStore<S> {
    /// Wraps a store and returns the instrumented version along with a handle
    /// to its statistics.
    pub fn new(inner: Arc<S>) -> (Self, Arc<IoStats>) {
        let stats = Arc::new(IoStats::default());
        (
            Self {
                inner,
                stats: Arc::clone(&stats),
            },
            stats,
        )
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }
}

impl<S: ObjectStore> ObjectStore for InstrumentedStore<S> {
    fn write_single(&self, key: &ObjectKey, class: ObjectClass, data: &[u8]) -> Result<()> {
        self.stats.single_writes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        self.inner.write_single(key, class, data)
    }

    fn read_single(&self, key: &ObjectKey, class: ObjectClass, buf: &mut [u8]) -> Result<usize> {
        self.stats.single_reads.fetch_add(1, Ordering::Relaxed);
        let n = self.inner.read_single(key, class, buf)?;
        self.stats.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn write_batch(&self, requests: &BatchWrite<'_>, class: ObjectClass) -> Result<()> {
        self.stats.write_batches.fetch_add(1, Ordering::Relaxed);
        self.stats
            .write_groups
            .fetch_add(requests.len() as u64, Ordering::Relaxed);
        self.stats
            .batch_write_keys
            .fetch_add(requests.n_keys() as u64, Ordering::Relaxed);
        self.stats
            .bytes_written
            .fetch_add(requests.payload_bytes() as u64, Ordering::Relaxed);
        self.inner.write_batch(requests, class)
    }

    fn read_batch(&self, requests: &mut BatchRead<'_>, class: ObjectClass) -> Result<()> {
        self.stats.read_batches.fetch_add(1, Ordering::Relaxed);
        self.stats
            .read_groups
            .fetch_add(requests.len() as u64, Ordering::Relaxed);
        self.stats
            .batch_read_keys
            .fetch_add(requests.n_keys() as u64, Ordering::Relaxed);
        self.inner.read_batch(requests, class)?;
        self.stats
            .bytes_read
            .fetch_add(requests.payload_bytes() as u64, Ordering::Relaxed);
        Ok(())
    }
}

/// Connector wrapper: every container it opens is an [`InstrumentedStore`]
/// reporting into one shared [`IoStats`].
#[derive(Debug)]
pub struct InstrumentedConnector<C: ObjectStoreConnector> {
    inner: Arc<C>,
    stats: Arc<IoStats>,
}

impl<C: ObjectStoreConnector> InstrumentedConnector<C> {
    pub fn new(inner: Arc<C>) -> (Self, Arc<IoStats>) {
        let stats = Arc::new(IoStats::default());
        (
            Self {
                inner,
                stats: Arc::clone(&stats),
            },
            stats,
        )
    }
}

impl<C: ObjectStoreConnector> ObjectStoreConnector for InstrumentedConnector<C> {
    type Store = InstrumentedStore<C::Store>;

    fn open_container(&self, uri: &ContainerUri, create: bool) -> Result<Arc<Self::Store>> {
        let inner = self.inner.open_container(uri, create)?;
        Ok(Arc::new(InstrumentedStore {
            inner,
            stats: Arc::clone(&self.stats),
        }))
    }
}
