//! The dataset's root record.
//!
//! Layout: five little-endian u32 fields (format version, header compressed
//! size, header uncompressed size, footer compressed size, footer
//! uncompressed size) followed by the object-class label as a u32 length and
//! its UTF-8 bytes. The record is written last, zero-padded to
//! [`Anchor::max_size`], so readers can fetch it with one read before its
//! true length is known.

use kvcol_result::{Error, Result};
use kvcol_storage::constants::OBJECT_CLASS_NAME_MAX_LEN;

use crate::codecs::{put_str, put_u32_le, read_str, read_u32_le};

/// Format version written by this crate.
pub const ANCHOR_VERSION: u32 = 0;

const FIXED_PREFIX_LEN: usize = 20;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Anchor {
    pub version: u32,
    pub nbytes_header: u32,
    pub len_header: u32,
    pub nbytes_footer: u32,
    pub len_footer: u32,
    pub object_class: String,
}

impl Anchor {
    /// Upper bound of [`Anchor::serialized_size`] over all valid labels.
    pub const fn max_size() -> usize {
        FIXED_PREFIX_LEN + 4 + OBJECT_CLASS_NAME_MAX_LEN
    }

    pub fn serialized_size(&self) -> usize {
        FIXED_PREFIX_LEN + 4 + self.object_class.len()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        put_u32_le(&mut out, self.version);
        put_u32_le(&mut out, self.nbytes_header);
        put_u32_le(&mut out, self.len_header);
        put_u32_le(&mut out, self.nbytes_footer);
        put_u32_le(&mut out, self.len_footer);
        put_str(&mut out, &self.object_class);
        out
    }

    /// Serialized record zero-padded to [`Anchor::max_size`].
    pub fn serialize_padded(&self) -> Vec<u8> {
        let mut out = self.serialize();
        debug_assert!(out.len() <= Self::max_size());
        out.resize(Self::max_size(), 0);
        out
    }

    /// Decodes an anchor from the front of `buf`; trailing bytes are ignored.
    /// Returns the anchor and the number of bytes consumed.
    pub fn deserialize(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < FIXED_PREFIX_LEN {
            return Err(Error::Format(format!(
                "anchor too short: {} bytes, need at least {FIXED_PREFIX_LEN}",
                buf.len()
            )));
        }
        let version = read_u32_le(buf, 0)?;
        let nbytes_header = read_u32_le(buf, 4)?;
        let len_header = read_u32_le(buf, 8)?;
        let nbytes_footer = read_u32_le(buf, 12)?;
        let len_footer = read_u32_le(buf, 16)?;
        let (object_class, consumed) = read_str(buf, FIXED_PREFIX_LEN)?;
        Ok((
            Self {
                version,
                nbytes_header,
                len_header,
                nbytes_footer,
                len_footer,
                object_class,
            },
            FIXED_PREFIX_LEN + consumed,
        ))
    }
}
