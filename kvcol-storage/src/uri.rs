//! Container URIs of the form `scheme://pool-label/container-label`.

use std::fmt;
use std::sync::LazyLock;

use kvcol_result::{Error, Result};
use regex::Regex;

static URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*)://([^/]+)/(.+)$").expect("container URI regex")
});

/// Location of a dataset: a container inside a pool, both named by label.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerUri {
    pub scheme: String,
    pub pool_label: String,
    pub container_label: String,
}

impl ContainerUri {
    /// Parses `scheme://pool-label/container-label`. The container label may
    /// itself contain `/`.
    pub fn parse(uri: &str) -> Result<Self> {
        let caps = URI_RE
            .captures(uri)
            .ok_or_else(|| Error::InvalidUri(uri.to_string()))?;
        Ok(Self {
            scheme: caps[1].to_string(),
            pool_label: caps[2].to_string(),
            container_label: caps[3].to_string(),
        })
    }
}

impl fmt::Display for ContainerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}",
            self.scheme, self.pool_label, self.container_label
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pool_and_container() {
        let uri = ContainerUri::parse("daos://pool-a/events/2024").unwrap();
        assert_eq!(uri.scheme, "daos");
        assert_eq!(uri.pool_label, "pool-a");
        assert_eq!(uri.container_label, "events/2024");
        assert_eq!(uri.to_string(), "daos://pool-a/events/2024");
    }

    #[test]
    fn rejects_malformed_uris() {
        for bad in ["pool/container", "daos://pool", "daos://pool/", "://a/b", ""] {
            assert!(
                matches!(ContainerUri::parse(bad), Err(Error::InvalidUri(_))),
                "{bad} should be rejected"
            );
        }
    }
}
