//! Batched multi-key requests.
//!
//! A batch collects many single-value reads or writes and groups them by
//! their (object id, distribution key) pair. Each group becomes one remote
//! operation carrying all of its attribute keys, so the number of round trips
//! scales with the number of distinct pairs instead of the number of values.
//!
//! The same structure serves both directions: writes carry shared slices of
//! the payload, reads carry mutable slices the store fills in place.

use rustc_hash::FxHashMap;

use crate::types::{AttributeKey, ObjectKey, OidDkeyPair};

/// All attribute keys of one (object id, distribution key) pair.
#[derive(Debug)]
pub struct RwOperation<B> {
    pub oid_dkey: OidDkeyPair,
    pub entries: Vec<(AttributeKey, B)>,
}

impl<B> RwOperation<B> {
    pub fn new(oid_dkey: OidDkeyPair) -> Self {
        Self {
            oid_dkey,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, akey: AttributeKey, buffer: B) {
        self.entries.push((akey, buffer));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Requests against several objects, aggregated by (object id, distribution key).
#[derive(Debug)]
pub struct MultiObjectRwOperation<B> {
    ops: FxHashMap<OidDkeyPair, RwOperation<B>>,
}

/// Batched write: payload slices borrowed from sealed pages.
pub type BatchWrite<'a> = MultiObjectRwOperation<&'a [u8]>;

/// Batched read: destination slices borrowed from a cluster arena.
pub type BatchRead<'a> = MultiObjectRwOperation<&'a mut [u8]>;

impl<B> Default for MultiObjectRwOperation<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> MultiObjectRwOperation<B> {
    pub fn new() -> Self {
        Self {
            ops: FxHashMap::default(),
        }
    }

    /// Adds one value, joining the group of its (object id, distribution key).
    pub fn insert(&mut self, key: ObjectKey, buffer: B) {
        let pair = key.oid_dkey();
        self.ops
            .entry(pair)
            .or_insert_with(|| RwOperation::new(pair))
            .insert(key.akey, buffer);
    }

    /// Number of groups, i.e. remote operations this batch expands to.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of individual values across all groups.
    pub fn n_keys(&self) -> usize {
        self.ops.values().map(RwOperation::len).sum()
    }

    pub fn get(&self, pair: &OidDkeyPair) -> Option<&RwOperation<B>> {
        self.ops.get(pair)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RwOperation<B>> {
        self.ops.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RwOperation<B>> {
        self.ops.values_mut()
    }
}

impl<B: AsRef<[u8]>> MultiObjectRwOperation<B> {
    /// Total bytes addressed by the batch.
    pub fn payload_bytes(&self) -> usize {
        self.ops
            .values()
            .flat_map(|op| op.entries.iter())
            .map(|(_, buf)| buf.as_ref().len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_object_and_distribution_key() {
        let payload = [1u8, 2, 3, 4, 5, 6];
        let mut batch = BatchWrite::new();
        batch.insert(ObjectKey::new(7, 1, 100), &payload[0..2]);
        batch.insert(ObjectKey::new(7, 1, 101), &payload[2..3]);
        batch.insert(ObjectKey::new(7, 2, 102), &payload[3..6]);
        batch.insert(ObjectKey::new(8, 1, 103), &payload[0..1]);

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.n_keys(), 4);
        assert_eq!(batch.payload_bytes(), 7);

        let group = batch.get(&OidDkeyPair { oid: 7, dkey: 1 }).unwrap();
        let akeys: Vec<_> = group.entries.iter().map(|(akey, _)| *akey).collect();
        assert_eq!(akeys, vec![100, 101]);
    }

    #[test]
    fn read_batch_hands_out_disjoint_slices() {
        let mut arena = vec![0u8; 6];
        {
            let (a, b) = arena.split_at_mut(2);
            let mut batch = BatchRead::new();
            batch.insert(ObjectKey::new(1, 1, 1), a);
            batch.insert(ObjectKey::new(1, 1, 2), b);
            for op in batch.iter_mut() {
                for (akey, buf) in op.entries.iter_mut() {
                    buf.fill(*akey as u8);
                }
            }
        }
        assert_eq!(arena, vec![1, 1, 2, 2, 2, 2]);
    }
}
