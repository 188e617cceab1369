//! Read path.
//!
//! [`PageSource::attach`] rebuilds the dataset descriptor from the anchor,
//! header, footer and page lists. Page requests are then served from the
//! page pool, from a resident cluster, or from a fresh batched cluster load.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use kvcol_format::anchor::ANCHOR_VERSION;
use kvcol_format::key_mapping::{anchor_key, footer_key, header_key, page_list_key};
use kvcol_format::serialization::{
    add_clusters, deserialize_footer, deserialize_header, deserialize_page_list,
};
use kvcol_format::{
    Anchor, ClusterDescriptor, ClusterId, ClusterIndex, ClusterInfo, ClusterKey, ColumnId,
    DatasetDescriptor, GlobalIndex, Page, PageLookup, map_page_key, unseal_page, unzip,
};
use kvcol_result::{Error, Result};
use kvcol_storage::{
    BatchRead, ContainerUri, ObjectClass, ObjectKey, ObjectStore, ObjectStoreConnector,
};
use kvcol_threading::TaskScheduler;

use crate::cluster::{Cluster, OnDiskPageKey, PageMapBuilder};
use crate::cluster_pool::ClusterPool;
use crate::column::ColumnHandle;
use crate::metrics::{PhaseTimer, SourceCounters, add};
use crate::options::{ClusterCache, ReadOptions};
use crate::page_pool::{PageDeleter, PagePool, PageRef};

/// Size and element count of a sealed page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SealedPageInfo {
    pub size: usize,
    pub n_elements: u32,
}

/// A page resolved against the descriptor.
#[derive(Clone, Copy, Debug)]
struct PageLocation {
    cluster_id: ClusterId,
    /// Global index of the cluster's first element in the column.
    column_offset: GlobalIndex,
    lookup: PageLookup,
}

/// One page decompression of a cluster unzip.
struct UnzipJob<'a> {
    sealed: &'a [u8],
    column: ColumnHandle,
    n_elements: u32,
    range_first: GlobalIndex,
    cluster_info: ClusterInfo,
}

/// Reads one dataset from a container.
pub struct PageSource<S: ObjectStore> {
    store: Arc<S>,
    uri: ContainerUri,
    name: String,
    options: ReadOptions,
    attached: bool,
    object_class: ObjectClass,
    descriptor: RwLock<DatasetDescriptor>,
    /// Columns fetched whenever a cluster is loaded.
    active_columns: BTreeSet<ColumnId>,
    page_pool: PagePool,
    cluster_pool: ClusterPool,
    current_cluster: Option<Arc<Cluster>>,
    scheduler: Option<Arc<TaskScheduler>>,
    counters: Arc<SourceCounters>,
}

impl<S: ObjectStore> PageSource<S> {
    /// Opens the existing container at `uri`. Call [`PageSource::attach`]
    /// before reading.
    pub fn open<C>(connector: &C, uri: &str, name: &str, options: ReadOptions) -> Result<Self>
    where
        C: ObjectStoreConnector<Store = S>,
    {
        let uri = ContainerUri::parse(uri)?;
        let store = connector.open_container(&uri, false)?;
        let scheduler = options
            .unzip_threads
            .map(TaskScheduler::new)
            .transpose()?
            .map(Arc::new);
        Ok(Self {
            store,
            uri,
            name: name.to_string(),
            cluster_pool: ClusterPool::new(options.cluster_pool_capacity),
            options,
            attached: false,
            object_class: ObjectClass::default(),
            descriptor: RwLock::new(DatasetDescriptor::new(name, Default::default())),
            active_columns: BTreeSet::new(),
            page_pool: PagePool::new(),
            current_cluster: None,
            scheduler,
            counters: Arc::new(SourceCounters::default()),
        })
    }

    pub fn uri(&self) -> &ContainerUri {
        &self.uri
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Object class recovered from the anchor.
    pub fn object_class(&self) -> ObjectClass {
        self.object_class
    }

    pub fn counters(&self) -> Arc<SourceCounters> {
        Arc::clone(&self.counters)
    }

    pub fn page_pool(&self) -> &PagePool {
        &self.page_pool
    }

    pub fn resident_clusters(&self) -> usize {
        self.cluster_pool.len()
    }

    pub fn descriptor(&self) -> RwLockReadGuard<'_, DatasetDescriptor> {
        self.descriptor
            .read()
            .expect("PageSource descriptor read lock poisoned")
    }

    /// Reads anchor, header, footer and every page list, in that order, and
    /// installs the resulting descriptor.
    pub fn attach(&mut self) -> Result<()> {
        if self.attached {
            return Err(Error::InvalidState("source is already attached".into()));
        }

        let mut buf = vec![0u8; Anchor::max_size()];
        let n = self.read_single(&anchor_key(), ObjectClass::METADATA, &mut buf)?;
        let (anchor, _) = Anchor::deserialize(&buf[..n])?;
        if anchor.version != ANCHOR_VERSION {
            return Err(Error::Format(format!(
                "unsupported anchor version {}, expected {ANCHOR_VERSION}",
                anchor.version
            )));
        }
        let object_class: ObjectClass = anchor.object_class.parse()?;

        let header = self.read_metadata(
            &header_key(),
            "header",
            anchor.nbytes_header,
            anchor.len_header,
        )?;
        let mut descriptor = deserialize_header(&header)?;

        let footer = self.read_metadata(
            &footer_key(),
            "footer",
            anchor.nbytes_footer,
            anchor.len_footer,
        )?;
        deserialize_footer(&footer, &mut descriptor)?;

        let groups = descriptor.cluster_groups().to_vec();
        for group in &groups {
            let locator = group.page_list_locator;
            let page_list = self.read_metadata(
                &page_list_key(locator.position),
                "page list",
                locator.bytes_on_storage,
                group.page_list_length,
            )?;
            let clusters = deserialize_page_list(&page_list)?;
            if !clusters.iter().map(|c| c.id).eq(group.cluster_ids.iter().copied()) {
                return Err(Error::Format(format!(
                    "page list of cluster group {} does not match its cluster ids",
                    group.id
                )));
            }
            add_clusters(&mut descriptor, clusters);
        }

        if descriptor.name() != self.name {
            tracing::warn!(
                requested = %self.name,
                stored = descriptor.name(),
                uri = %self.uri,
                "dataset name differs from the one requested"
            );
        }
        tracing::info!(
            dataset = descriptor.name(),
            uri = %self.uri,
            object_class = %object_class,
            header_bytes = anchor.nbytes_header,
            footer_bytes = anchor.nbytes_footer,
            n_cluster_groups = groups.len(),
            n_clusters = descriptor.n_clusters(),
            "attached"
        );

        *self
            .descriptor
            .write()
            .expect("PageSource descriptor write lock poisoned") = descriptor;
        self.object_class = object_class;
        self.attached = true;
        Ok(())
    }

    /// Handle for `column_id`; the column joins the set fetched by cluster
    /// loads.
    pub fn column_handle(&mut self, column_id: ColumnId) -> Result<ColumnHandle> {
        let kind = self
            .descriptor()
            .column(column_id)
            .map(|c| c.kind)
            .ok_or_else(|| Error::InvalidArgumentError(format!("unknown column {column_id}")))?;
        self.active_columns.insert(column_id);
        Ok(ColumnHandle {
            id: column_id,
            kind,
        })
    }

    /// Reads one sealed page into `buf`. With `buf == None` only the size
    /// and element count are reported.
    pub fn load_sealed_page(
        &self,
        column_id: ColumnId,
        at: ClusterIndex,
        buf: Option<&mut [u8]>,
    ) -> Result<SealedPageInfo> {
        let (info, mapping) = {
            let descriptor = self.descriptor();
            let cluster = find_cluster(&descriptor, at.cluster_id)?;
            let location = locate_in_cluster(cluster, column_id, at.index)?;
            (location.lookup.info, descriptor.page_mapping())
        };
        let size = info.locator.bytes_on_storage as usize;

        if let Some(buf) = buf {
            if buf.len() < size {
                return Err(Error::InvalidArgumentError(format!(
                    "buffer of {} bytes cannot hold a {size} byte page",
                    buf.len()
                )));
            }
            let key = map_page_key(mapping, at.cluster_id, column_id, info.locator.position);
            let n = self.read_single(&key, self.object_class, &mut buf[..size])?;
            check_len("sealed page", size, n)?;
        }
        Ok(SealedPageInfo {
            size,
            n_elements: info.n_elements,
        })
    }

    /// The page holding element `index` (global) of `column`.
    pub fn populate_page(&mut self, column: &ColumnHandle, index: GlobalIndex) -> Result<PageRef> {
        if let Some(page) = self.page_pool.get_by_global_index(column.id, index) {
            return Ok(page);
        }
        let location = {
            let descriptor = self.descriptor();
            let cluster_id = descriptor.find_cluster_id(column.id, index).ok_or_else(|| {
                Error::InvalidArgumentError(format!(
                    "element {index} of column {} is out of range",
                    column.id
                ))
            })?;
            let Some(cluster) = descriptor.cluster(cluster_id) else {
                panic!("cluster {cluster_id} found by index but not described");
            };
            let Some(range) = cluster.column_range(column.id) else {
                panic!("cluster {cluster_id} has no range for column {}", column.id);
            };
            assert!(range.first_element_index <= index);
            let Ok(location) =
                locate_in_cluster(cluster, column.id, index - range.first_element_index)
            else {
                panic!(
                    "cluster {cluster_id} column {}: element {index} is in range but on no page",
                    column.id
                );
            };
            location
        };
        self.populate_from_cluster(column, location, index - location.column_offset)
    }

    /// The page holding the element at the cluster-relative index `at`.
    pub fn populate_page_at(&mut self, column: &ColumnHandle, at: ClusterIndex) -> Result<PageRef> {
        if let Some(page) = self.page_pool.get_by_cluster_index(column.id, at) {
            return Ok(page);
        }
        let location = {
            let descriptor = self.descriptor();
            let cluster = find_cluster(&descriptor, at.cluster_id)?;
            locate_in_cluster(cluster, column.id, at.index)?
        };
        self.populate_from_cluster(column, location, at.index)
    }

    /// Returns a page obtained from [`PageSource::populate_page`]. Releasing
    /// the same handle twice is harmless.
    pub fn release_page(&self, page: &PageRef) {
        self.page_pool.release(page);
    }

    fn populate_from_cluster(
        &mut self,
        column: &ColumnHandle,
        location: PageLocation,
        index_in_cluster: u64,
    ) -> Result<PageRef> {
        let info = location.lookup.info;
        let size = info.locator.bytes_on_storage as usize;

        let direct: Vec<u8>;
        let pinned: Arc<Cluster>;
        let sealed: &[u8] = match self.options.cluster_cache {
            ClusterCache::Off => {
                let mut buf = vec![0u8; size];
                let key = map_page_key(
                    self.descriptor().page_mapping(),
                    location.cluster_id,
                    column.id,
                    info.locator.position,
                );
                let n = self.read_single(&key, self.object_class, &mut buf)?;
                check_len("sealed page", size, n)?;
                add(&self.counters.n_page_loaded, 1);
                direct = buf;
                direct.as_slice()
            }
            ClusterCache::On => {
                self.active_columns.insert(column.id);
                let resident = self
                    .current_cluster
                    .as_ref()
                    .filter(|c| c.id() == location.cluster_id && c.contains_column(column.id))
                    .cloned();
                pinned = match resident {
                    Some(c) => c,
                    None => {
                        let c = self.get_cluster(location.cluster_id)?;
                        self.current_cluster = Some(Arc::clone(&c));
                        c
                    }
                };
                assert!(
                    pinned.contains_column(column.id),
                    "cluster {} was loaded without column {}",
                    location.cluster_id,
                    column.id
                );

                let at = ClusterIndex::new(location.cluster_id, index_in_cluster);
                if let Some(page) = self.page_pool.get_by_cluster_index(column.id, at) {
                    return Ok(page);
                }

                let key = OnDiskPageKey::new(column.id, location.lookup.page_no);
                let Some(bytes) = pinned.on_disk_page(key) else {
                    panic!("cluster {} is missing page {key:?}", location.cluster_id);
                };
                assert_eq!(bytes.len(), size, "page {key:?} has the wrong size on disk");
                bytes
            }
        };

        let raw = {
            let _timer =
                PhaseTimer::start(&self.counters.time_wall_unzip, &self.counters.time_cpu_unzip);
            unseal_page(sealed, info.n_elements, column.kind)?
        };
        add(&self.counters.sz_unzip, raw.len() as u64);

        let mut page = Page::from_buffer(column.id, raw, column.kind.size(), info.n_elements);
        page.set_window(
            location.column_offset + location.lookup.first_in_page,
            ClusterInfo {
                cluster_id: location.cluster_id,
                index_offset: location.column_offset,
            },
        );
        let handle = self
            .page_pool
            .register(page, Some(release_callback(&self.counters)));
        add(&self.counters.n_page_populated, 1);
        Ok(handle)
    }

    /// A resident cluster holding every active column, loading it (and up
    /// to `cluster_bunch_size - 1` following clusters) if needed.
    fn get_cluster(&mut self, cluster_id: ClusterId) -> Result<Arc<Cluster>> {
        let columns = self.active_columns.clone();
        if let Some(cluster) = self.cluster_pool.get(cluster_id, &columns) {
            return Ok(cluster);
        }

        let keys = {
            let descriptor = self.descriptor();
            let mut keys = vec![ClusterKey {
                cluster_id,
                columns: columns.clone(),
            }];
            let mut next = cluster_id;
            while keys.len() < self.options.cluster_bunch_size {
                let Some(id) = descriptor.next_cluster_id(next) else {
                    break;
                };
                next = id;
                if !self.cluster_pool.contains(id, &columns) {
                    keys.push(ClusterKey {
                        cluster_id: id,
                        columns: columns.clone(),
                    });
                }
            }
            keys
        };

        let clusters = self.load_clusters(&keys)?;
        let mut wanted = None;
        // Insert the requested cluster last so it ends up most recently used.
        for cluster in clusters.into_iter().rev() {
            self.unzip_cluster(&cluster)?;
            let cluster = Arc::new(cluster);
            if cluster.id() == cluster_id {
                wanted = Some(Arc::clone(&cluster));
            }
            for evicted in self.cluster_pool.insert(cluster) {
                let n = self.page_pool.evict_unleased(evicted);
                tracing::trace!(cluster_id = evicted, n_pages = n, "dropped preloaded pages");
            }
        }
        wanted.ok_or_else(|| Error::Internal(format!("cluster {cluster_id} was not loaded")))
    }

    /// Fetches the sealed pages of the requested clusters and columns with a
    /// single batched read. Each cluster gets its own arena.
    pub fn load_clusters(&self, keys: &[ClusterKey]) -> Result<Vec<Cluster>> {
        let mut layouts: Vec<(PageMapBuilder, Vec<(ObjectKey, usize)>)> =
            Vec::with_capacity(keys.len());
        {
            let descriptor = self.descriptor();
            let mapping = descriptor.page_mapping();
            for key in keys {
                let cluster = find_cluster(&descriptor, key.cluster_id)?;
                let mut map = PageMapBuilder::default();
                let mut pages = Vec::new();
                for &column_id in &key.columns {
                    let range = cluster.page_range(column_id).ok_or_else(|| {
                        Error::InvalidArgumentError(format!(
                            "cluster {} has no column {column_id}",
                            key.cluster_id
                        ))
                    })?;
                    for (page_no, info) in range.page_infos.iter().enumerate() {
                        let len = info.locator.bytes_on_storage as usize;
                        map.push(OnDiskPageKey::new(column_id, page_no as u64), len);
                        pages.push((
                            map_page_key(mapping, key.cluster_id, column_id, info.locator.position),
                            len,
                        ));
                    }
                }
                layouts.push((map, pages));
            }
        }

        let mut arenas: Vec<Vec<u8>> =
            layouts.iter().map(|(map, _)| vec![0u8; map.size()]).collect();
        let n_pages: usize = layouts.iter().map(|(_, pages)| pages.len()).sum();
        let sz_payload: usize = arenas.iter().map(Vec::len).sum();

        if n_pages > 0 {
            let mut batch = BatchRead::new();
            for (arena, (_, pages)) in arenas.iter_mut().zip(&layouts) {
                let mut rest = arena.as_mut_slice();
                for &(key, len) in pages {
                    let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
                    batch.insert(key, head);
                    rest = tail;
                }
            }
            let _timer =
                PhaseTimer::start(&self.counters.time_wall_read, &self.counters.time_cpu_read);
            self.store.read_batch(&mut batch, self.object_class)?;
            add(&self.counters.n_read_v, 1);
        }

        add(&self.counters.n_cluster_loaded, keys.len() as u64);
        add(&self.counters.n_page_loaded, n_pages as u64);
        add(&self.counters.sz_read_payload, sz_payload as u64);
        tracing::debug!(
            cluster_ids = ?keys.iter().map(|k| k.cluster_id).collect::<Vec<_>>(),
            n_pages,
            payload_bytes = sz_payload,
            "clusters loaded"
        );

        Ok(layouts
            .into_iter()
            .zip(arenas)
            .zip(keys)
            .map(|(((map, _), arena), key)| map.finish(key.cluster_id, arena, key.columns.clone()))
            .collect())
    }

    /// Decompresses every page of `cluster` on the worker pool and preloads
    /// the results into the page pool. Returns once all pages are in.
    ///
    /// Without a worker pool this does nothing; pages are then decompressed
    /// on demand.
    pub fn unzip_cluster(&self, cluster: &Cluster) -> Result<()> {
        let Some(scheduler) = self.scheduler.as_deref() else {
            return Ok(());
        };

        let jobs = {
            let descriptor = self.descriptor();
            let cluster_id = cluster.id();
            let Some(desc) = descriptor.cluster(cluster_id) else {
                panic!("unzipping undescribed cluster {cluster_id}");
            };
            let mut jobs = Vec::with_capacity(cluster.n_pages());
            for &column_id in cluster.available_columns() {
                let (Some(column), Some(range), Some(pages)) = (
                    descriptor.column(column_id),
                    desc.column_range(column_id),
                    desc.page_range(column_id),
                ) else {
                    panic!("cluster {cluster_id} holds undescribed column {column_id}");
                };
                let handle = ColumnHandle {
                    id: column_id,
                    kind: column.kind,
                };
                let mut first_in_page = 0u64;
                for (page_no, info) in pages.page_infos.iter().enumerate() {
                    let key = OnDiskPageKey::new(column_id, page_no as u64);
                    let Some(sealed) = cluster.on_disk_page(key) else {
                        panic!("cluster {cluster_id} is missing page {key:?}");
                    };
                    jobs.push(UnzipJob {
                        sealed,
                        column: handle,
                        n_elements: info.n_elements,
                        range_first: range.first_element_index + first_in_page,
                        cluster_info: ClusterInfo {
                            cluster_id,
                            index_offset: range.first_element_index,
                        },
                    });
                    first_in_page += u64::from(info.n_elements);
                }
            }
            jobs
        };

        let n_pages = jobs.len();
        let errors = Mutex::new(Vec::new());
        let pool = &self.page_pool;
        let counters = &self.counters;
        scheduler.run(|tasks| {
            for job in jobs {
                let errors = &errors;
                tasks.submit(move || {
                    let raw = {
                        let _timer =
                            PhaseTimer::start(&counters.time_wall_unzip, &counters.time_cpu_unzip);
                        unseal_page(job.sealed, job.n_elements, job.column.kind)
                    };
                    match raw {
                        Ok(raw) => {
                            add(&counters.sz_unzip, raw.len() as u64);
                            let mut page = Page::from_buffer(
                                job.column.id,
                                raw,
                                job.column.kind.size(),
                                job.n_elements,
                            );
                            page.set_window(job.range_first, job.cluster_info);
                            pool.preload(page, Some(release_callback(counters)));
                        }
                        Err(err) => errors
                            .lock()
                            .expect("unzip error list poisoned")
                            .push(err),
                    }
                });
            }
        });

        if let Some(err) = errors
            .into_inner()
            .expect("unzip error list poisoned")
            .into_iter()
            .next()
        {
            return Err(err);
        }
        tracing::debug!(
            cluster_id = cluster.id(),
            n_pages,
            n_workers = scheduler.thread_count(),
            "cluster unzipped"
        );
        Ok(())
    }

    /// An independent source over the same container, with empty caches.
    pub fn clone_source(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            uri: self.uri.clone(),
            name: self.name.clone(),
            options: self.options.clone(),
            attached: self.attached,
            object_class: self.object_class,
            descriptor: RwLock::new(self.descriptor().clone()),
            active_columns: BTreeSet::new(),
            page_pool: PagePool::new(),
            cluster_pool: ClusterPool::new(self.options.cluster_pool_capacity),
            current_cluster: None,
            scheduler: self.scheduler.clone(),
            counters: Arc::new(SourceCounters::default()),
        }
    }

    fn read_single(&self, key: &ObjectKey, class: ObjectClass, buf: &mut [u8]) -> Result<usize> {
        let n = {
            let _timer =
                PhaseTimer::start(&self.counters.time_wall_read, &self.counters.time_cpu_read);
            self.store.read_single(key, class, buf)?
        };
        add(&self.counters.n_read, 1);
        add(&self.counters.sz_read_payload, n as u64);
        Ok(n)
    }

    /// Reads a compressed metadata value of exactly `nbytes` and unzips it
    /// to `len` bytes.
    fn read_metadata(
        &self,
        key: &ObjectKey,
        what: &'static str,
        nbytes: u32,
        len: u32,
    ) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; nbytes as usize];
        let n = self.read_single(key, ObjectClass::METADATA, &mut buf)?;
        if n != buf.len() {
            return Err(Error::ShortRead {
                what,
                expected: buf.len(),
                actual: n,
            });
        }
        unzip(&buf, len as usize)
    }
}

fn release_callback(counters: &Arc<SourceCounters>) -> PageDeleter {
    let counters = Arc::clone(counters);
    Box::new(move |_| add(&counters.n_page_released, 1))
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::ShortRead {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

fn find_cluster(
    descriptor: &DatasetDescriptor,
    cluster_id: ClusterId,
) -> Result<&ClusterDescriptor> {
    descriptor
        .cluster(cluster_id)
        .ok_or_else(|| Error::InvalidArgumentError(format!("unknown cluster {cluster_id}")))
}

fn locate_in_cluster(
    cluster: &ClusterDescriptor,
    column_id: ColumnId,
    index_in_cluster: u64,
) -> Result<PageLocation> {
    let (Some(range), Some(pages)) =
        (cluster.column_range(column_id), cluster.page_range(column_id))
    else {
        return Err(Error::InvalidArgumentError(format!(
            "cluster {} has no column {column_id}",
            cluster.id
        )));
    };
    let lookup = pages.find(index_in_cluster).ok_or_else(|| {
        Error::InvalidArgumentError(format!(
            "index {index_in_cluster} is out of range for column {column_id} in cluster {}",
            cluster.id
        ))
    })?;
    Ok(PageLocation {
        cluster_id: cluster.id,
        column_offset: range.first_element_index,
        lookup,
    })
}
