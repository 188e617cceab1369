use std::sync::Arc;

use kvcol_storage::constants::ERR_IO;
use kvcol_storage::{
    BatchWrite, ContainerUri, InstrumentedConnector, MemObjectPool, ObjectClass, ObjectKey,
    ObjectStore, ObjectStoreConnector,
};

use store_harness::{run_batch_roundtrip, run_missing_key_fails_batch, run_single_roundtrip};

fn open_mem(label: &str) -> Arc<kvcol_storage::MemContainer> {
    let pool = MemObjectPool::new();
    let uri = ContainerUri::parse(&format!("mem://pool/{label}")).unwrap();
    pool.open_container(&uri, true).unwrap()
}

#[test]
fn mem_single_roundtrip() {
    run_single_roundtrip(open_mem("single").as_ref());
}

#[test]
fn mem_batch_roundtrip() {
    run_batch_roundtrip(open_mem("batch").as_ref(), 40, 7);
}

#[test]
fn mem_missing_key_fails_batch() {
    run_missing_key_fails_batch(open_mem("missing").as_ref());
}

#[test]
fn instrumented_batch_roundtrip_counts_round_trips() {
    let (connector, stats) = InstrumentedConnector::new(Arc::new(MemObjectPool::new()));
    let uri = ContainerUri::parse("mem://pool/instrumented").unwrap();
    let store = connector.open_container(&uri, true).unwrap();

    let ((), delta) = stats.measure(|| run_batch_roundtrip(store.as_ref(), 12, 3));
    assert_eq!(delta.write_batches, 1);
    assert_eq!(delta.read_batches, 1);
    assert_eq!(delta.batch_write_keys, 12);
    assert_eq!(delta.batch_read_keys, 12);
    assert_eq!(delta.bytes_read, delta.bytes_written);
    assert_eq!(delta.round_trips(), 2);
    assert_eq!(delta.keys_per_read_batch(), 12.0);
}

#[test]
fn injected_failure_aborts_whole_batch() {
    let container = open_mem("inject");
    container.inject_failure(ERR_IO);

    let payload = [1u8, 2, 3];
    let mut batch = BatchWrite::new();
    batch.insert(ObjectKey::new(1, 0, 0), &payload[..1]);
    batch.insert(ObjectKey::new(2, 0, 0), &payload[1..]);
    let err = container
        .write_batch(&batch, ObjectClass::SX)
        .expect_err("injected failure");
    assert!(err.is_remote());
    assert!(container.is_empty(), "no partial writes");
}

#[test]
fn containers_are_shared_by_uri() {
    let pool = MemObjectPool::new();
    let uri = ContainerUri::parse("mem://pool/shared").unwrap();
    let writer = pool.open_container(&uri, true).unwrap();
    writer
        .write_single(&ObjectKey::new(0, 0, 0), ObjectClass::SX, b"hello")
        .unwrap();

    let reader = pool.open_container(&uri, false).unwrap();
    assert_eq!(reader.keys(), vec![ObjectKey::new(0, 0, 0)]);
}
