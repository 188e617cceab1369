mod common;

use std::sync::Arc;

use common::{URI, read_u32, value, write_dataset};
use kvcol_format::key_mapping::{DEFAULT_AKEY, DEFAULT_DKEY, METADATA_OID, PAGE_LIST_OID};
use kvcol_format::{ClusterIndex, PageMapping, unseal_page};
use kvcol_pages::{ClusterCache, PageSource, ReadOptions, WriteOptions};
use kvcol_storage::{InstrumentedConnector, MemObjectPool, ObjectClass};

fn open_source(
    pool: &MemObjectPool,
    options: ReadOptions,
) -> PageSource<kvcol_storage::MemContainer> {
    let mut source = PageSource::open(pool, URI, "events", options).unwrap();
    source.attach().unwrap();
    source
}

#[test]
fn single_cluster_roundtrip() {
    let pool = MemObjectPool::new();
    write_dataset(&pool, URI, WriteOptions::default(), 2, &[&[&[10, 20, 5]]]);

    let mut source = open_source(&pool, ReadOptions::default());
    {
        let descriptor = source.descriptor();
        assert_eq!(descriptor.name(), "events");
        assert_eq!(descriptor.n_clusters(), 1);
        assert_eq!(descriptor.n_entries(), 35);
        assert_eq!(descriptor.cluster_groups().len(), 1);
        let cluster = descriptor.cluster(0).unwrap();
        for column_id in [0, 1] {
            let range = cluster.column_range(column_id).unwrap();
            assert_eq!(range.first_element_index, 0);
            assert_eq!(range.n_elements, 35);
            assert_eq!(cluster.page_range(column_id).unwrap().page_infos.len(), 3);
        }
    }

    for column_no in 0..2 {
        let column = source.column_handle(column_no as u64).unwrap();
        for index in 0..35 {
            let page = source.populate_page(&column, index).unwrap();
            assert_eq!(read_u32(&page, index), value(column_no, index));
            source.release_page(&page);
        }
    }

    let column = source.column_handle(0).unwrap();
    let page = source.populate_page(&column, 12).unwrap();
    assert_eq!(page.global_range_first(), 10);
    assert_eq!(page.n_elements(), 20);
    assert_eq!(page.cluster_info().cluster_id, 0);
    source.release_page(&page);
}

#[test]
fn clusters_and_groups_roundtrip() {
    let pool = MemObjectPool::new();
    write_dataset(
        &pool,
        URI,
        WriteOptions::default(),
        2,
        &[&[&[4, 4], &[3]], &[&[6, 1, 2]]],
    );

    let mut source = open_source(&pool, ReadOptions::default());
    {
        let descriptor = source.descriptor();
        assert_eq!(descriptor.n_clusters(), 3);
        assert_eq!(descriptor.n_entries(), 20);
        let groups = descriptor.cluster_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].cluster_ids, vec![0, 1]);
        assert_eq!(groups[1].cluster_ids, vec![2]);
        assert_eq!(
            descriptor.cluster(2).unwrap().column_range(1).unwrap().first_element_index,
            11
        );
    }

    let column = source.column_handle(1).unwrap();
    for index in 0..20 {
        let page = source.populate_page(&column, index).unwrap();
        assert_eq!(read_u32(&page, index), value(1, index));
        source.release_page(&page);
    }

    // Cluster 2 starts at global element 11; its second page starts at index 6.
    let page = source
        .populate_page_at(&column, ClusterIndex::new(2, 6))
        .unwrap();
    assert_eq!(page.global_range_first(), 17);
    assert_eq!(page.cluster_range_first(), 6);
    assert_eq!(page.cluster_info().index_offset, 11);
    assert_eq!(read_u32(&page, 17), value(1, 17));
    source.release_page(&page);
}

#[test]
fn oid_per_page_roundtrip() {
    let pool = MemObjectPool::new();
    let options = WriteOptions::default().with_page_mapping(PageMapping::OidPerPage);
    write_dataset(&pool, URI, options, 2, &[&[&[8, 8], &[8]]]);

    let container = pool
        .container(&kvcol_storage::ContainerUri::parse(URI).unwrap())
        .unwrap();
    let page_keys: Vec<_> = container
        .keys()
        .into_iter()
        .filter(|k| k.oid != METADATA_OID && k.oid != PAGE_LIST_OID)
        .collect();
    assert_eq!(page_keys.len(), 6);
    for (position, key) in page_keys.iter().enumerate() {
        assert_eq!(key.oid, position as u64);
        assert_eq!(key.dkey, DEFAULT_DKEY);
        assert_eq!(key.akey, DEFAULT_AKEY);
    }

    let mut source = open_source(&pool, ReadOptions::default().with_cluster_bunch_size(2));
    assert_eq!(source.descriptor().page_mapping(), PageMapping::OidPerPage);
    let column = source.column_handle(0).unwrap();
    for index in 0..24 {
        let page = source.populate_page(&column, index).unwrap();
        assert_eq!(read_u32(&page, index), value(0, index));
        source.release_page(&page);
    }
}

#[test]
fn object_class_is_recovered_from_the_anchor() {
    let pool = MemObjectPool::new();
    let options = WriteOptions::default().with_object_class("RP_2G1");
    write_dataset(&pool, URI, options, 1, &[&[&[5]]]);

    let container = pool
        .container(&kvcol_storage::ContainerUri::parse(URI).unwrap())
        .unwrap();
    let page_key = container
        .keys()
        .into_iter()
        .find(|k| k.oid == 0)
        .unwrap();
    assert_eq!(container.object_class_of(&page_key), Some(ObjectClass::Rp2G1));

    let source = open_source(&pool, ReadOptions::default());
    assert_eq!(source.object_class(), ObjectClass::Rp2G1);
}

#[test]
fn released_page_runs_its_callback_once() {
    let pool = MemObjectPool::new();
    write_dataset(&pool, URI, WriteOptions::default(), 1, &[&[&[10]]]);

    let mut source = open_source(&pool, ReadOptions::default());
    let column = source.column_handle(0).unwrap();
    let page = source.populate_page(&column, 3).unwrap();
    let again = source.populate_page(&column, 7).unwrap();
    assert!(Arc::ptr_eq(page.page(), again.page()));

    source.release_page(&page);
    source.release_page(&page);
    assert_eq!(source.counters().snapshot().n_page_released, 0);
    assert_eq!(source.page_pool().len(), 1);

    source.release_page(&again);
    source.release_page(&again);
    let counters = source.counters().snapshot();
    assert_eq!(counters.n_page_populated, 1);
    assert_eq!(counters.n_page_released, 1);
    assert!(source.page_pool().is_empty());
}

#[test]
fn cluster_cache_off_reads_single_pages() {
    let pool = Arc::new(MemObjectPool::new());
    write_dataset(pool.as_ref(), URI, WriteOptions::default(), 2, &[&[&[5, 5]]]);

    let (connector, stats) = InstrumentedConnector::new(Arc::clone(&pool));
    let mut source = PageSource::open(
        &connector,
        URI,
        "events",
        ReadOptions::default().with_cluster_cache(ClusterCache::Off),
    )
    .unwrap();
    source.attach().unwrap();
    let before = stats.snapshot();

    let column = source.column_handle(1).unwrap();
    let page = source.populate_page(&column, 7).unwrap();
    assert_eq!(read_u32(&page, 7), value(1, 7));

    let delta = stats.snapshot().delta_since(&before);
    assert_eq!(delta.read_batches, 0);
    assert_eq!(delta.single_reads, 1);
    assert_eq!(source.resident_clusters(), 0);
    assert_eq!(source.counters().snapshot().n_page_loaded, 1);
}

#[test]
fn sealed_pages_load_without_decompression() {
    let pool = MemObjectPool::new();
    write_dataset(&pool, URI, WriteOptions::default(), 1, &[&[&[16, 9]]]);

    let mut source = open_source(&pool, ReadOptions::default());
    let column = source.column_handle(0).unwrap();
    let at = ClusterIndex::new(0, 20);

    let info = source.load_sealed_page(column.id, at, None).unwrap();
    assert_eq!(info.n_elements, 9);
    assert!(info.size > 0);

    let mut buf = vec![0u8; info.size + 3];
    let loaded = source.load_sealed_page(column.id, at, Some(&mut buf)).unwrap();
    assert_eq!(loaded, info);
    let raw = unseal_page(&buf[..info.size], info.n_elements, column.kind).unwrap();
    let first = u32::from_le_bytes(raw[..4].try_into().unwrap());
    assert_eq!(first, value(0, 16));

    let mut small = vec![0u8; info.size - 1];
    assert!(source.load_sealed_page(column.id, at, Some(&mut small)).is_err());
    assert!(source.load_sealed_page(column.id, ClusterIndex::new(0, 25), None).is_err());
    assert!(source.load_sealed_page(column.id, ClusterIndex::new(1, 0), None).is_err());
}

#[test]
fn cloned_source_shares_metadata_not_caches() {
    let pool = MemObjectPool::new();
    write_dataset(&pool, URI, WriteOptions::default(), 1, &[&[&[6]], &[&[6]]]);

    let mut source = open_source(&pool, ReadOptions::default());
    let column = source.column_handle(0).unwrap();
    let page = source.populate_page(&column, 8).unwrap();
    assert_eq!(source.resident_clusters(), 1);

    let mut clone = source.clone_source();
    assert_eq!(clone.descriptor().n_clusters(), 2);
    assert_eq!(clone.resident_clusters(), 0);
    assert!(clone.page_pool().is_empty());

    let column = clone.column_handle(0).unwrap();
    let cloned_page = clone.populate_page(&column, 8).unwrap();
    assert_eq!(read_u32(&cloned_page, 8), read_u32(&page, 8));
    assert!(!Arc::ptr_eq(page.page(), cloned_page.page()));
    assert_eq!(source.counters().snapshot().n_page_populated, 1);
    assert_eq!(clone.counters().snapshot().n_page_populated, 1);
}
