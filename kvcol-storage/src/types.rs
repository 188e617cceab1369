/// Object identifier inside a container.
pub type ObjectId = u64;

/// Distribution key: selects the shard/target of an object's values.
pub type DistributionKey = u64;

/// Attribute key: addresses one value under an (object, distribution key) pair.
pub type AttributeKey = u64;

/// Full address of a single value in the key-addressed store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub oid: ObjectId,
    pub dkey: DistributionKey,
    pub akey: AttributeKey,
}

impl ObjectKey {
    pub const fn new(oid: ObjectId, dkey: DistributionKey, akey: AttributeKey) -> Self {
        Self { oid, dkey, akey }
    }

    /// The (object, distribution key) pair batched requests are grouped by.
    pub const fn oid_dkey(&self) -> OidDkeyPair {
        OidDkeyPair {
            oid: self.oid,
            dkey: self.dkey,
        }
    }
}

/// Grouping key of a batched request: all attribute keys sharing this pair
/// travel in one remote operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OidDkeyPair {
    pub oid: ObjectId,
    pub dkey: DistributionKey,
}
