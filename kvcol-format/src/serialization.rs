//! Envelopes for the header, footer and page lists.
//!
//! Envelopes are bitcode blobs carrying a format version. The header holds
//! the dataset name, page mapping and columns; the footer holds the cluster
//! groups; a page list holds the cluster summaries and page locations of one
//! cluster group.

use bitcode::{Decode, Encode};
use kvcol_result::{Error, Result};

use crate::descriptor::{
    ClusterDescriptor, ClusterGroupDescriptor, ColumnDescriptor, ColumnRange, DatasetDescriptor,
    PageRange,
};
use crate::ids::ClusterId;
use crate::key_mapping::PageMapping;

pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Encode, Decode)]
struct HeaderEnvelope {
    version: u32,
    name: String,
    page_mapping: PageMapping,
    columns: Vec<ColumnDescriptor>,
}

#[derive(Encode, Decode)]
struct FooterEnvelope {
    version: u32,
    cluster_groups: Vec<ClusterGroupDescriptor>,
}

#[derive(Encode, Decode)]
struct ClusterSummary {
    id: ClusterId,
    first_entry_index: u64,
    n_entries: u64,
    columns: Vec<(ColumnRange, PageRange)>,
}

#[derive(Encode, Decode)]
struct PageListEnvelope {
    version: u32,
    clusters: Vec<ClusterSummary>,
}

fn check_version(what: &str, version: u32) -> Result<()> {
    if version != ENVELOPE_VERSION {
        return Err(Error::Format(format!(
            "unsupported {what} version {version}, expected {ENVELOPE_VERSION}"
        )));
    }
    Ok(())
}

pub fn serialize_header(descriptor: &DatasetDescriptor) -> Vec<u8> {
    bitcode::encode(&HeaderEnvelope {
        version: ENVELOPE_VERSION,
        name: descriptor.name().to_string(),
        page_mapping: descriptor.page_mapping(),
        columns: descriptor.columns().to_vec(),
    })
}

/// Starts a descriptor from a header: name, mapping and columns.
pub fn deserialize_header(bytes: &[u8]) -> Result<DatasetDescriptor> {
    let env: HeaderEnvelope = bitcode::decode(bytes).map_err(Error::format)?;
    check_version("header", env.version)?;
    let mut descriptor = DatasetDescriptor::new(env.name, env.page_mapping);
    for column in env.columns {
        descriptor.add_column(column);
    }
    Ok(descriptor)
}

pub fn serialize_footer(descriptor: &DatasetDescriptor) -> Vec<u8> {
    bitcode::encode(&FooterEnvelope {
        version: ENVELOPE_VERSION,
        cluster_groups: descriptor.cluster_groups().to_vec(),
    })
}

/// Adds the footer's cluster groups to `descriptor`.
pub fn deserialize_footer(bytes: &[u8], descriptor: &mut DatasetDescriptor) -> Result<()> {
    let env: FooterEnvelope = bitcode::decode(bytes).map_err(Error::format)?;
    check_version("footer", env.version)?;
    for group in env.cluster_groups {
        descriptor.add_cluster_group(group);
    }
    Ok(())
}

pub fn serialize_page_list<'a>(
    clusters: impl IntoIterator<Item = &'a ClusterDescriptor>,
) -> Vec<u8> {
    let clusters = clusters
        .into_iter()
        .map(|c| ClusterSummary {
            id: c.id,
            first_entry_index: c.first_entry_index,
            n_entries: c.n_entries,
            columns: c
                .column_ranges
                .values()
                .map(|range| {
                    let pages = c.page_ranges.get(&range.column_id).cloned().unwrap_or(PageRange {
                        column_id: range.column_id,
                        page_infos: Vec::new(),
                    });
                    (*range, pages)
                })
                .collect(),
        })
        .collect();
    bitcode::encode(&PageListEnvelope {
        version: ENVELOPE_VERSION,
        clusters,
    })
}

/// Decodes the cluster descriptors of one page list.
pub fn deserialize_page_list(bytes: &[u8]) -> Result<Vec<ClusterDescriptor>> {
    let env: PageListEnvelope = bitcode::decode(bytes).map_err(Error::format)?;
    check_version("page list", env.version)?;
    env.clusters
        .into_iter()
        .map(|summary| {
            let mut cluster =
                ClusterDescriptor::new(summary.id, summary.first_entry_index, summary.n_entries);
            for (range, pages) in summary.columns {
                if range.column_id != pages.column_id || range.n_elements != pages.n_elements() {
                    return Err(Error::Format(format!(
                        "cluster {} column {}: range does not match its pages",
                        summary.id, range.column_id
                    )));
                }
                cluster.add_column(range, pages);
            }
            Ok(cluster)
        })
        .collect()
}

/// Attaches decoded page-list clusters to `descriptor`.
pub fn add_clusters(descriptor: &mut DatasetDescriptor, clusters: Vec<ClusterDescriptor>) {
    for cluster in clusters {
        descriptor.add_cluster(cluster);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DescriptorBuilder;
    use crate::descriptor::PageInfo;
    use crate::element::ElementKind;
    use crate::locator::PageLocator;

    fn built() -> DescriptorBuilder {
        let mut b = DescriptorBuilder::new("events", PageMapping::OidPerPage);
        let a = b.add_column("a", ElementKind::I32);
        let c = b.add_column("c", ElementKind::F64);
        for (pos, (col, n)) in [(a, 10), (a, 20), (c, 30)].into_iter().enumerate() {
            b.add_page(
                col,
                PageInfo {
                    n_elements: n,
                    locator: PageLocator::new(pos as u64, n * 3),
                },
            )
            .unwrap();
        }
        b.commit_cluster(30);
        let page_list = serialize_page_list(b.ungrouped_clusters());
        b.commit_cluster_group(PageLocator::new(0, page_list.len() as u32), page_list.len() as u32);
        b
    }

    #[test]
    fn header_footer_and_page_list_rebuild_the_descriptor() {
        let b = built();
        let original = b.descriptor();

        let mut rebuilt = deserialize_header(&serialize_header(original)).unwrap();
        assert_eq!(rebuilt.name(), "events");
        assert_eq!(rebuilt.page_mapping(), PageMapping::OidPerPage);
        assert_eq!(rebuilt.columns(), original.columns());

        deserialize_footer(&serialize_footer(original), &mut rebuilt).unwrap();
        assert_eq!(rebuilt.cluster_groups(), original.cluster_groups());

        let page_list = serialize_page_list(original.clusters());
        add_clusters(&mut rebuilt, deserialize_page_list(&page_list).unwrap());
        assert_eq!(&rebuilt, original);
    }

    #[test]
    fn garbage_is_a_format_error() {
        assert!(matches!(deserialize_header(&[]), Err(Error::Format(_))));
        assert!(matches!(deserialize_page_list(&[]), Err(Error::Format(_))));
    }
}
