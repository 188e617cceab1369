use super::*;
use crate::constants::{ERR_NONEXIST, ERR_REC2BIG};
use crate::types::ObjectKey;
use kvcol_result::{Error, Result};
use rustc_hash::FxHashMap;
use std::sync::{
    RwLock,
    atomic::{AtomicI32, Ordering},
};

#[derive(Clone, Debug)]
struct MemValue {
    class: ObjectClass,
    bytes: Vec<u8>,
}

/// In-memory container used for tests and benchmarks.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Default)]
pub struct MemContainer {
    values: RwLock<FxHashMap<ObjectKey, MemValue>>,
    /// Non-zero: the next remote call fails with this code.
    injected_failure: AtomicI32,
}

impl MemContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next read or write (single or batched) fail with `code`.
    pub fn inject_failure(&self, code: i32) {
        self.injected_failure.store(code, Ordering::SeqCst);
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values
            .read()
            .expect("MemContainer values read lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &ObjectKey) -> bool {
        self.values
            .read()
            .expect("MemContainer values read lock poisoned")
            .contains_key(key)
    }

    /// Test-only view of every stored key, sorted.
    pub fn keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<_> = self
            .values
            .read()
            .expect("MemContainer values read lock poisoned")
            .keys()
            .copied()
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Class a value was written with, if present.
    pub fn object_class_of(&self, key: &ObjectKey) -> Option<ObjectClass> {
        self.values
            .read()
            .expect("MemContainer values read lock poisoned")
            .get(key)
            .map(|v| v.class)
    }

    fn check_injected(&self, operation: &'static str) -> Result<()> {
        match self.injected_failure.swap(0, Ordering::SeqCst) {
            0 => Ok(()),
            code => {
                tracing::debug!(operation, code, "in-memory store: injected failure");
                Err(Error::object_store(operation, code, "injected failure"))
            }
        }
    }
}

fn copy_value(
    operation: &'static str,
    key: &ObjectKey,
    values: &FxHashMap<ObjectKey, MemValue>,
    buf: &mut [u8],
    exact: bool,
) -> Result<usize> {
    let value = values
        .get(key)
        .ok_or_else(|| Error::object_store(operation, ERR_NONEXIST, format!("{key:?} not found")))?;
    let len = value.bytes.len();
    if len > buf.len() || (exact && len != buf.len()) {
        return Err(Error::object_store(
            operation,
            ERR_REC2BIG,
            format!("{key:?} holds {len} bytes, buffer has {}", buf.len()),
        ));
    }
    buf[..len].copy_from_slice(&value.bytes);
    Ok(len)
}

impl ObjectStore for MemContainer {
    fn write_single(&self, key: &ObjectKey, class: ObjectClass, data: &[u8]) -> Result<()> {
        self.check_injected("WriteSingleKey")?;
        let mut map = self
            .values
            .write()
            .expect("MemContainer values write lock poisoned");
        map.insert(
            *key,
            MemValue {
                class,
                bytes: data.to_vec(),
            },
        );
        Ok(())
    }

    fn read_single(&self, key: &ObjectKey, _class: ObjectClass, buf: &mut [u8]) -> Result<usize> {
        self.check_injected("ReadSingleKey")?;
        let map = self
            .values
            .read()
            .expect("MemContainer values read lock poisoned");
        copy_value("ReadSingleKey", key, &map, buf, false)
    }

    fn write_batch(&self, requests: &BatchWrite<'_>, class: ObjectClass) -> Result<()> {
        self.check_injected("WriteBatch")?;
        let mut map = self
            .values
            .write()
            .expect("MemContainer values write lock poisoned");
        for op in requests.iter() {
            for (akey, bytes) in &op.entries {
                let key = ObjectKey::new(op.oid_dkey.oid, op.oid_dkey.dkey, *akey);
                map.insert(
                    key,
                    MemValue {
                        class,
                        bytes: bytes.to_vec(),
                    },
                );
            }
        }
        Ok(())
    }

    fn read_batch(&self, requests: &mut BatchRead<'_>, _class: ObjectClass) -> Result<()> {
        self.check_injected("ReadBatch")?;
        let map = self
            .values
            .read()
            .expect("MemContainer values read lock poisoned");
        for op in requests.iter_mut() {
            for (akey, buf) in op.entries.iter_mut() {
                let key = ObjectKey::new(op.oid_dkey.oid, op.oid_dkey.dkey, *akey);
                copy_value("ReadBatch", &key, &map, buf, true)?;
            }
        }
        Ok(())
    }
}

/// In-memory pool of containers, addressed by (pool label, container label).
///
/// Cloning a handle to the pool (it is usually shared through an `Arc`) and
/// opening the same URI twice yields the same container, which is how a
/// writer and a later reader meet.
#[derive(Debug, Default)]
pub struct MemObjectPool {
    containers: RwLock<FxHashMap<(String, String), Arc<MemContainer>>>,
}

impl MemObjectPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the container if it exists, without creating it.
    pub fn container(&self, uri: &ContainerUri) -> Option<Arc<MemContainer>> {
        self.containers
            .read()
            .expect("MemObjectPool containers read lock poisoned")
            .get(&(uri.pool_label.clone(), uri.container_label.clone()))
            .cloned()
    }
}

impl ObjectStoreConnector for MemObjectPool {
    type Store = MemContainer;

    fn open_container(&self, uri: &ContainerUri, create: bool) -> Result<Arc<MemContainer>> {
        tracing::debug!(uri = %uri, create, "opening in-memory container");
        let label = (uri.pool_label.clone(), uri.container_label.clone());
        if !create {
            return self.container(uri).ok_or(Error::NotFound);
        }
        let mut map = self
            .containers
            .write()
            .expect("MemObjectPool containers write lock poisoned");
        Ok(Arc::clone(map.entry(label).or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_read_reports_length_and_tolerates_larger_buffers() {
        let store = MemContainer::new();
        let key = ObjectKey::new(1, 2, 3);
        store.write_single(&key, ObjectClass::S1, b"abc").unwrap();

        let mut buf = [0xffu8; 8];
        let n = store.read_single(&key, ObjectClass::S1, &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(store.object_class_of(&key), Some(ObjectClass::S1));

        let mut small = [0u8; 2];
        let err = store
            .read_single(&key, ObjectClass::S1, &mut small)
            .unwrap_err();
        assert!(matches!(err, Error::ObjectStore { code: ERR_REC2BIG, .. }));
    }

    #[test]
    fn injected_failure_fires_once() {
        let store = MemContainer::new();
        store.inject_failure(-7);
        let err = store
            .write_single(&ObjectKey::new(0, 0, 0), ObjectClass::SX, b"x")
            .unwrap_err();
        assert!(matches!(err, Error::ObjectStore { code: -7, .. }));
        store
            .write_single(&ObjectKey::new(0, 0, 0), ObjectClass::SX, b"x")
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn open_without_create_requires_existing_container() {
        let pool = MemObjectPool::new();
        let uri = ContainerUri::parse("mem://p/c").unwrap();
        assert!(matches!(pool.open_container(&uri, false), Err(Error::NotFound)));
        let a = pool.open_container(&uri, true).unwrap();
        let b = pool.open_container(&uri, false).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
