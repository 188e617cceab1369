//! Mapping from logical page coordinates to object-store keys.
//!
//! Two object ids at the top of the id space are reserved: one for the
//! dataset metadata values (anchor, header, footer) and one for the
//! cluster-group page lists. Page keys never use them.

use bitcode::{Decode, Encode};
use kvcol_storage::{AttributeKey, DistributionKey, ObjectId, ObjectKey};

use crate::ids::{ClusterGroupId, ClusterId, ColumnId};

/// Object holding the anchor, header and footer.
pub const METADATA_OID: ObjectId = u64::MAX;
/// Object holding one page list per cluster group.
pub const PAGE_LIST_OID: ObjectId = u64::MAX - 1;

/// Distribution key of metadata and page-list values, and of pages under
/// [`PageMapping::OidPerPage`].
pub const DEFAULT_DKEY: DistributionKey = 0x5a3c_69f0_cafe_4a11;
/// Attribute key of pages under [`PageMapping::OidPerPage`].
pub const DEFAULT_AKEY: AttributeKey = 0x4243_544b_5344_4229;

pub const ANCHOR_AKEY: AttributeKey = 0x4243_544b_5344_422a;
pub const HEADER_AKEY: AttributeKey = 0x4243_544b_5344_422b;
pub const FOOTER_AKEY: AttributeKey = 0x4243_544b_5344_422c;

/// How pages are spread over objects. Chosen once when the dataset is
/// created and persisted in its header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Encode, Decode)]
pub enum PageMapping {
    /// Object id = cluster id, distribution key = column id, attribute key =
    /// page position. All pages of a column in a cluster share one
    /// (object, distribution key) pair and batch into one request.
    #[default]
    OidPerCluster,
    /// Object id = page position, fixed distribution and attribute keys.
    OidPerPage,
}

/// Computes the key of a page.
///
/// `position` is the page's locator position. Positions are unique within a
/// dataset, which makes the mapping injective under both strategies.
///
/// # Panics
///
/// If the resulting object id falls into the reserved range.
pub fn map_page_key(
    mapping: PageMapping,
    cluster_id: ClusterId,
    column_id: ColumnId,
    position: u64,
) -> ObjectKey {
    let key = match mapping {
        PageMapping::OidPerCluster => ObjectKey::new(cluster_id, column_id, position),
        PageMapping::OidPerPage => ObjectKey::new(position, DEFAULT_DKEY, DEFAULT_AKEY),
    };
    assert!(
        key.oid < PAGE_LIST_OID,
        "page key {key:?} collides with a reserved object id"
    );
    key
}

pub const fn anchor_key() -> ObjectKey {
    ObjectKey::new(METADATA_OID, DEFAULT_DKEY, ANCHOR_AKEY)
}

pub const fn header_key() -> ObjectKey {
    ObjectKey::new(METADATA_OID, DEFAULT_DKEY, HEADER_AKEY)
}

pub const fn footer_key() -> ObjectKey {
    ObjectKey::new(METADATA_OID, DEFAULT_DKEY, FOOTER_AKEY)
}

/// Key of a cluster group's page list; the group id is the attribute key.
pub const fn page_list_key(group_id: ClusterGroupId) -> ObjectKey {
    ObjectKey::new(PAGE_LIST_OID, DEFAULT_DKEY, group_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use rustc_hash::FxHashSet;

    #[test]
    fn oid_per_cluster_is_injective_over_coordinates() {
        let mut seen = FxHashSet::default();
        for cluster in 0..8 {
            for column in 0..8 {
                for page in 0..16 {
                    let key = map_page_key(PageMapping::OidPerCluster, cluster, column, page);
                    assert!(seen.insert(key), "duplicate key {key:?}");
                    assert_eq!(
                        key,
                        map_page_key(PageMapping::OidPerCluster, cluster, column, page)
                    );
                }
            }
        }
    }

    #[test]
    fn oid_per_page_is_injective_over_positions() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut positions = FxHashSet::default();
        while positions.len() < 1_000 {
            positions.insert(rng.random_range(0..PAGE_LIST_OID));
        }
        let keys: FxHashSet<_> = positions
            .iter()
            .map(|&p| map_page_key(PageMapping::OidPerPage, p % 7, p % 5, p))
            .collect();
        assert_eq!(keys.len(), positions.len());
    }

    #[test]
    fn metadata_keys_are_distinct() {
        let keys: FxHashSet<_> = [anchor_key(), header_key(), footer_key(), page_list_key(0)]
            .into_iter()
            .collect();
        assert_eq!(keys.len(), 4);
    }

    #[test]
    #[should_panic(expected = "reserved object id")]
    fn page_keys_never_reach_reserved_ids() {
        map_page_key(PageMapping::OidPerPage, 0, 0, METADATA_OID);
    }
}
