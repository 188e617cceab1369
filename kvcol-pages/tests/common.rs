#![allow(dead_code)]

use kvcol_format::{DatasetModel, ElementKind, GlobalIndex, Page};
use kvcol_pages::{ColumnHandle, PageSink, WriteOptions};
use kvcol_storage::{ObjectStore, ObjectStoreConnector};

pub const URI: &str = "mem://pool-a/dataset";

/// Value stored at `index` of the `column`-th column of every test dataset.
pub fn value(column: usize, index: GlobalIndex) -> u32 {
    ((column as u32) << 24) | index as u32
}

pub fn read_u32(page: &Page, index: GlobalIndex) -> u32 {
    let bytes = page
        .element(index)
        .unwrap_or_else(|| panic!("page does not hold element {index}"));
    u32::from_le_bytes(bytes.try_into().unwrap())
}

/// A page of `column` whose elements are `value(column_no, first..first+n)`.
pub fn fill_page<S: ObjectStore>(
    sink: &PageSink<S>,
    column: &ColumnHandle,
    column_no: usize,
    first: GlobalIndex,
    n: u32,
) -> Page {
    let mut page = sink.reserve_page(column, n).unwrap();
    for (i, chunk) in page.buffer_mut().chunks_exact_mut(4).enumerate() {
        chunk.copy_from_slice(&value(column_no, first + i as u64).to_le_bytes());
    }
    page
}

pub fn u32_model(n_columns: usize) -> DatasetModel {
    (0..n_columns).fold(DatasetModel::new(), |model, i| {
        model.with_column(format!("c{i}"), ElementKind::U32)
    })
}

/// Writes a dataset of `n_columns` u32 columns.
///
/// `groups[g][c]` lists the page sizes of cluster `c` in cluster group `g`;
/// every column gets the same page sizes. Returns the column handles.
pub fn write_dataset<C: ObjectStoreConnector>(
    connector: &C,
    uri: &str,
    options: WriteOptions,
    n_columns: usize,
    groups: &[&[&[u32]]],
) -> Vec<ColumnHandle> {
    let mut sink = PageSink::open(connector, uri, "events", options).unwrap();
    let columns = sink.create_dataset(&u32_model(n_columns)).unwrap();
    let mut next: Vec<GlobalIndex> = vec![0; n_columns];

    for clusters in groups {
        for page_sizes in clusters.iter() {
            for (column_no, column) in columns.iter().enumerate() {
                for &n in page_sizes.iter() {
                    let page = fill_page(&sink, column, column_no, next[column_no], n);
                    sink.commit_page(column, &page).unwrap();
                    sink.release_page(page);
                    next[column_no] += u64::from(n);
                }
            }
            let n_entries = page_sizes.iter().map(|&n| u64::from(n)).sum();
            sink.commit_cluster(n_entries).unwrap();
        }
        sink.commit_cluster_group().unwrap();
    }
    sink.commit_dataset().unwrap();
    columns
}
