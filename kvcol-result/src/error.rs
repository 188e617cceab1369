use std::{fmt, io};
use thiserror::Error;

/// Unified error type for all kvcol operations.
///
/// Every crate in the workspace returns this enum so failures cross crate
/// boundaries with `?` and no conversion glue. Variants follow the failure
/// classes of the page storage engine:
///
/// - **Format errors** ([`Error::Format`], [`Error::ShortRead`]): truncated or
///   undersized buffers while decoding the anchor, header, footer or page lists.
/// - **Configuration errors** ([`Error::UnknownObjectClass`], [`Error::InvalidUri`]):
///   rejected before any remote I/O happens.
/// - **Remote I/O errors** ([`Error::ObjectStore`]): non-zero codes returned by
///   single-key or batched reads and writes. These abort the enclosing operation
///   and are never retried.
/// - **Usage errors** ([`Error::InvalidState`], [`Error::InvalidArgumentError`]).
///
/// Broken internal invariants (a page listed in the descriptor but missing
/// from a loaded cluster, for example) are not represented here. They
/// indicate corruption between the descriptor and the store and panic.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the local operating system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A serialized metadata record could not be decoded.
    ///
    /// Raised for anchors shorter than their fixed prefix, truncated
    /// length-prefixed strings, undecodable header/footer/page-list envelopes
    /// and unsupported format versions.
    #[error("format error: {0}")]
    Format(String),

    /// A read returned a different number of bytes than the metadata recorded.
    #[error("short read of {what}: expected {expected} bytes, got {actual}")]
    ShortRead {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The configured storage object class is not one the store knows.
    #[error("unknown object class '{0}'")]
    UnknownObjectClass(String),

    /// A container URI is not of the form `scheme://pool/container`.
    #[error("invalid container URI '{0}'")]
    InvalidUri(String),

    /// A remote read or write failed.
    ///
    /// `code` is the store's non-zero error code. The whole request (including
    /// every key of a batched request) is considered failed.
    #[error("{operation} failed with code {code}: {message}")]
    ObjectStore {
        operation: &'static str,
        code: i32,
        message: String,
    },

    /// Compressing or decompressing a buffer failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// An operation was invoked out of order, e.g. committing pages before the
    /// dataset header was written or after the anchor was written.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid user input or API parameter.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// Storage key, container or entity not found.
    #[error("Storage key not found")]
    NotFound,

    /// Internal error indicating a bug or unexpected state.
    #[error("An internal operation failed: {0}")]
    Internal(String),
}

impl Error {
    /// Create a format error from any displayable error.
    #[inline]
    pub fn format<E: fmt::Display>(err: E) -> Self {
        Error::Format(err.to_string())
    }

    /// Create a compression error from any displayable error.
    #[inline]
    pub fn compression<E: fmt::Display>(err: E) -> Self {
        Error::Compression(err.to_string())
    }

    /// Create a remote I/O error for the named store operation.
    #[inline]
    pub fn object_store(operation: &'static str, code: i32, message: impl Into<String>) -> Self {
        Error::ObjectStore {
            operation,
            code,
            message: message.into(),
        }
    }

    /// Returns `true` for failures reported by the object store.
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::ObjectStore { .. })
    }
}
