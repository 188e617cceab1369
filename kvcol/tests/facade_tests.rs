//! End-to-end use of the re-exported API.

use std::sync::Arc;

use kvcol::storage::InstrumentedConnector;
use kvcol::{
    ClusterCache, DatasetModel, ElementKind, MemObjectPool, PageMapping, PageSink, PageSource,
    ReadOptions, WriteOptions,
};

const URI: &str = "mem://tank/run-7";

fn write_run(pool: &MemObjectPool, mapping: PageMapping) {
    let mut sink = PageSink::open(
        pool,
        URI,
        "run",
        WriteOptions::default().with_page_mapping(mapping),
    )
    .unwrap();
    let model = DatasetModel::new()
        .with_column("energy", ElementKind::F64)
        .with_column("hits", ElementKind::U16);
    let columns = sink.create_dataset(&model).unwrap();

    for cluster in 0..3u64 {
        for column in &columns {
            let mut page = sink.reserve_page(column, 50).unwrap();
            let size = column.kind.size();
            for (i, chunk) in page.buffer_mut().chunks_exact_mut(size).enumerate() {
                let v = cluster * 50 + i as u64;
                chunk.copy_from_slice(&v.to_le_bytes()[..size]);
            }
            sink.commit_page(column, &page).unwrap();
        }
        sink.commit_cluster(50).unwrap();
        if cluster == 1 {
            sink.commit_cluster_group().unwrap();
        }
    }
    sink.commit_cluster_group().unwrap();
    sink.commit_dataset().unwrap();
}

#[test]
fn every_mapping_and_cache_mode_reads_back() {
    for mapping in [PageMapping::OidPerCluster, PageMapping::OidPerPage] {
        for cache in [ClusterCache::On, ClusterCache::Off] {
            let pool = Arc::new(MemObjectPool::new());
            write_run(&pool, mapping);

            let (connector, stats) = InstrumentedConnector::new(Arc::clone(&pool));
            let options = ReadOptions::default()
                .with_cluster_cache(cache)
                .with_cluster_bunch_size(3)
                .with_cluster_pool_capacity(3)
                .with_unzip_threads(Some(2));
            let mut source = PageSource::open(&connector, URI, "run", options).unwrap();
            source.attach().unwrap();
            assert_eq!(source.descriptor().n_entries(), 150);

            let hits = source.column_handle(1).unwrap();
            for index in (0..150).step_by(7) {
                let page = source.populate_page(&hits, index).unwrap();
                let bytes = page.element(index).unwrap();
                assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), index as u16);
                source.release_page(&page);
            }

            let io = stats.snapshot();
            match cache {
                ClusterCache::On => assert_eq!(io.read_batches, 1),
                ClusterCache::Off => assert_eq!(io.read_batches, 0),
            }
        }
    }
}
