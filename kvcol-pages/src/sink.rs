//! Write path.
//!
//! Artifacts are written in a fixed order: header at dataset creation,
//! pages while clusters are open, one page list per cluster group, then the
//! footer and finally the anchor. A reader that finds an anchor can rely on
//! everything it references being present.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use kvcol_format::key_mapping::{anchor_key, footer_key, header_key, page_list_key};
use kvcol_format::serialization::{serialize_footer, serialize_header, serialize_page_list};
use kvcol_format::{
    Anchor, ClusterId, ColumnId, DatasetModel, DescriptorBuilder, Page, PageInfo, PageLocator,
    PageMapping, SealedPage, map_page_key, seal_page, zip,
};
use kvcol_result::{Error, Result};
use kvcol_storage::{BatchWrite, ContainerUri, ObjectClass, ObjectStore, ObjectStoreConnector};

use crate::column::ColumnHandle;
use crate::metrics::{PhaseTimer, SinkCounters, add};
use crate::options::WriteOptions;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkState {
    Created,
    HeaderWritten,
    Closed,
}

/// Sealed pages of one column, committed together.
#[derive(Clone, Copy, Debug)]
pub struct SealedPageGroup<'a> {
    pub column_id: ColumnId,
    pub pages: &'a [SealedPage],
}

#[derive(Debug)]
struct SinkInner {
    state: SinkState,
    builder: DescriptorBuilder,
}

/// Writes one dataset into a container.
///
/// Page commits take `&self` and may run from several threads; cluster,
/// cluster-group and dataset commits take `&mut self`.
pub struct PageSink<S: ObjectStore> {
    store: Arc<S>,
    uri: ContainerUri,
    options: WriteOptions,
    object_class: ObjectClass,
    anchor: Anchor,
    /// Next page position. Never reset within a sink.
    next_position: AtomicU64,
    /// Sealed bytes committed to the open cluster.
    cluster_bytes: AtomicU64,
    inner: Mutex<SinkInner>,
    counters: Arc<SinkCounters>,
}

impl<S: ObjectStore> PageSink<S> {
    /// Opens (creating if needed) the container at `uri`.
    ///
    /// The URI and the configured object class are validated before the
    /// container is opened.
    pub fn open<C>(connector: &C, uri: &str, name: &str, options: WriteOptions) -> Result<Self>
    where
        C: ObjectStoreConnector<Store = S>,
    {
        let uri = ContainerUri::parse(uri)?;
        let object_class: ObjectClass = options.object_class.parse()?;
        let store = connector.open_container(&uri, true)?;
        let builder = DescriptorBuilder::new(name, options.page_mapping);
        Ok(Self {
            store,
            uri,
            options,
            object_class,
            anchor: Anchor::default(),
            next_position: AtomicU64::new(0),
            cluster_bytes: AtomicU64::new(0),
            inner: Mutex::new(SinkInner {
                state: SinkState::Created,
                builder,
            }),
            counters: Arc::new(SinkCounters::default()),
        })
    }

    pub fn uri(&self) -> &ContainerUri {
        &self.uri
    }

    pub fn state(&self) -> SinkState {
        self.inner.lock().expect("PageSink lock poisoned").state
    }

    pub fn counters(&self) -> Arc<SinkCounters> {
        Arc::clone(&self.counters)
    }

    /// The anchor as it stands; persisted only by [`PageSink::commit_dataset`].
    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn object_class(&self) -> ObjectClass {
        self.object_class
    }

    /// Registers the model's columns and writes the header.
    pub fn create_dataset(&mut self, model: &DatasetModel) -> Result<Vec<ColumnHandle>> {
        let inner = self.inner.get_mut().expect("PageSink lock poisoned");
        expect_state(inner.state, SinkState::Created, "create_dataset")?;

        let handles: Vec<ColumnHandle> = model
            .columns()
            .iter()
            .map(|(name, kind)| ColumnHandle {
                id: inner.builder.add_column(name.clone(), *kind),
                kind: *kind,
            })
            .collect();

        let header = serialize_header(inner.builder.descriptor());
        let zipped = zip(&header, self.options.compression)?;
        self.store
            .write_single(&header_key(), ObjectClass::METADATA, &zipped)?;

        self.anchor.nbytes_header = zipped.len() as u32;
        self.anchor.len_header = header.len() as u32;
        self.anchor.object_class = self.object_class.name().to_string();
        inner.state = SinkState::HeaderWritten;

        tracing::info!(
            dataset = inner.builder.descriptor().name(),
            uri = %self.uri,
            object_class = %self.object_class,
            page_mapping = ?self.options.page_mapping,
            n_columns = handles.len(),
            header_bytes = zipped.len(),
            "dataset created"
        );
        Ok(handles)
    }

    /// A zeroed page for `column` with room for `n_elements`.
    pub fn reserve_page(&self, column: &ColumnHandle, n_elements: u32) -> Result<Page> {
        if n_elements == 0 {
            return Err(Error::InvalidArgumentError(
                "cannot reserve an empty page".into(),
            ));
        }
        Ok(Page::new(column.id, column.kind.size(), n_elements))
    }

    pub fn release_page(&self, page: Page) {
        tracing::trace!(column_id = page.column_id(), "page released");
    }

    /// Seals `page` and commits it.
    pub fn commit_page(&self, column: &ColumnHandle, page: &Page) -> Result<PageLocator> {
        let sealed = {
            let _timer =
                PhaseTimer::start(&self.counters.time_wall_zip, &self.counters.time_cpu_zip);
            seal_page(page, column.kind, self.options.compression)?
        };
        add(&self.counters.sz_zip, page.buffer().len() as u64);
        self.commit_sealed_page(column.id, &sealed)
    }

    /// Writes one sealed page into the open cluster.
    pub fn commit_sealed_page(
        &self,
        column_id: ColumnId,
        page: &SealedPage,
    ) -> Result<PageLocator> {
        let (cluster_id, mapping) = self.open_cluster("commit_sealed_page", [column_id])?;
        let position = self.next_position.fetch_add(1, Ordering::Relaxed);
        let key = map_page_key(mapping, cluster_id, column_id, position);
        {
            let _timer =
                PhaseTimer::start(&self.counters.time_wall_write, &self.counters.time_cpu_write);
            self.store.write_single(&key, self.object_class, &page.buffer)?;
        }

        let locator = PageLocator::new(position, page.size() as u32);
        self.record_pages(&[(column_id, page.n_elements, locator)])?;
        Ok(locator)
    }

    /// Writes many sealed pages with one batched request.
    ///
    /// Positions are assigned in iteration order, exactly as consecutive
    /// [`PageSink::commit_sealed_page`] calls would. Pages sharing an
    /// (object id, distribution key) pair travel in one group.
    pub fn commit_sealed_page_batch(
        &self,
        groups: &[SealedPageGroup<'_>],
    ) -> Result<Vec<PageLocator>> {
        let (cluster_id, mapping) = self.open_cluster(
            "commit_sealed_page_batch",
            groups.iter().map(|g| g.column_id),
        )?;

        let mut batch = BatchWrite::new();
        let mut committed = Vec::new();
        for group in groups {
            for page in group.pages {
                let position = self.next_position.fetch_add(1, Ordering::Relaxed);
                let key = map_page_key(mapping, cluster_id, group.column_id, position);
                batch.insert(key, page.buffer.as_slice());
                committed.push((
                    group.column_id,
                    page.n_elements,
                    PageLocator::new(position, page.size() as u32),
                ));
            }
        }
        if committed.is_empty() {
            return Ok(Vec::new());
        }

        {
            let _timer =
                PhaseTimer::start(&self.counters.time_wall_write, &self.counters.time_cpu_write);
            self.store.write_batch(&batch, self.object_class)?;
        }
        tracing::debug!(
            cluster_id,
            n_pages = committed.len(),
            n_groups = batch.len(),
            payload_bytes = batch.payload_bytes(),
            "flushed sealed page batch"
        );

        self.record_pages(&committed)?;
        Ok(committed.into_iter().map(|(_, _, locator)| locator).collect())
    }

    /// Closes the open cluster. Returns the sealed bytes committed to it.
    pub fn commit_cluster(&mut self, n_entries: u64) -> Result<u64> {
        let inner = self.inner.get_mut().expect("PageSink lock poisoned");
        expect_state(inner.state, SinkState::HeaderWritten, "commit_cluster")?;
        let nbytes = self.cluster_bytes.swap(0, Ordering::Relaxed);
        let cluster_id = inner.builder.commit_cluster(n_entries);
        tracing::debug!(cluster_id, n_entries, nbytes, "cluster committed");
        Ok(nbytes)
    }

    /// Writes the page list of the clusters committed since the previous
    /// group.
    pub fn commit_cluster_group(&mut self) -> Result<PageLocator> {
        let inner = self.inner.get_mut().expect("PageSink lock poisoned");
        expect_state(inner.state, SinkState::HeaderWritten, "commit_cluster_group")?;

        let page_list = serialize_page_list(inner.builder.ungrouped_clusters());
        let zipped = zip(&page_list, self.options.compression)?;
        let group_id = inner.builder.next_cluster_group_id();
        self.store
            .write_single(&page_list_key(group_id), ObjectClass::METADATA, &zipped)?;

        let locator = PageLocator::new(group_id, zipped.len() as u32);
        let n_clusters = inner.builder.ungrouped_clusters().count();
        inner
            .builder
            .commit_cluster_group(locator, page_list.len() as u32);
        tracing::debug!(
            group_id,
            n_clusters,
            page_list_bytes = zipped.len(),
            "cluster group committed"
        );
        Ok(locator)
    }

    /// Writes the footer, then the anchor. No commit is accepted afterwards.
    pub fn commit_dataset(&mut self) -> Result<()> {
        let inner = self.inner.get_mut().expect("PageSink lock poisoned");
        expect_state(inner.state, SinkState::HeaderWritten, "commit_dataset")?;

        let footer = serialize_footer(inner.builder.descriptor());
        let zipped = zip(&footer, self.options.compression)?;
        self.store
            .write_single(&footer_key(), ObjectClass::METADATA, &zipped)?;
        self.anchor.nbytes_footer = zipped.len() as u32;
        self.anchor.len_footer = footer.len() as u32;

        self.store.write_single(
            &anchor_key(),
            ObjectClass::METADATA,
            &self.anchor.serialize_padded(),
        )?;
        inner.state = SinkState::Closed;

        let descriptor = inner.builder.descriptor();
        tracing::info!(
            dataset = descriptor.name(),
            n_clusters = descriptor.n_clusters(),
            n_cluster_groups = descriptor.cluster_groups().len(),
            n_entries = descriptor.n_entries(),
            "dataset committed"
        );
        Ok(())
    }

    /// Cluster id pages are currently committed to, plus the mapping.
    /// Fails before any write if a column is unknown.
    fn open_cluster(
        &self,
        operation: &str,
        column_ids: impl IntoIterator<Item = ColumnId>,
    ) -> Result<(ClusterId, PageMapping)> {
        let inner = self.inner.lock().expect("PageSink lock poisoned");
        expect_state(inner.state, SinkState::HeaderWritten, operation)?;
        for column_id in column_ids {
            if inner.builder.descriptor().column(column_id).is_none() {
                return Err(Error::InvalidArgumentError(format!(
                    "{operation}: unknown column {column_id}"
                )));
            }
        }
        Ok((
            inner.builder.current_cluster_id(),
            inner.builder.descriptor().page_mapping(),
        ))
    }

    fn record_pages(&self, pages: &[(ColumnId, u32, PageLocator)]) -> Result<()> {
        let mut inner = self.inner.lock().expect("PageSink lock poisoned");
        let mut nbytes = 0u64;
        for &(column_id, n_elements, locator) in pages {
            inner.builder.add_page(
                column_id,
                PageInfo {
                    n_elements,
                    locator,
                },
            )?;
            nbytes += u64::from(locator.bytes_on_storage);
        }
        drop(inner);
        self.cluster_bytes.fetch_add(nbytes, Ordering::Relaxed);
        add(&self.counters.n_page_committed, pages.len() as u64);
        add(&self.counters.sz_write_payload, nbytes);
        Ok(())
    }
}

fn expect_state(actual: SinkState, expected: SinkState, operation: &str) -> Result<()> {
    if actual != expected {
        return Err(Error::InvalidState(format!(
            "{operation} requires the sink to be {expected:?}, it is {actual:?}"
        )));
    }
    Ok(())
}
