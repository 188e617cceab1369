//! Error types and result definitions for the kvcol page storage engine.
//!
//! This crate provides the unified error type ([`Error`]) and result alias
//! ([`Result<T>`]) used throughout all kvcol crates.
//!
//! # Error Categories
//!
//! - **Format errors** ([`Error::Format`], [`Error::ShortRead`]): metadata decoding
//! - **Configuration errors** ([`Error::UnknownObjectClass`], [`Error::InvalidUri`])
//! - **Remote I/O errors** ([`Error::ObjectStore`]): failed store requests
//! - **Codec errors** ([`Error::Compression`])
//! - **Usage errors** ([`Error::InvalidState`], [`Error::InvalidArgumentError`])
//! - **Internal errors** ([`Error::Internal`]): bugs or unexpected states

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
