//! Buffer compression for pages and metadata envelopes.
//!
//! A compressed buffer whose length equals the uncompressed length is stored
//! verbatim; [`zip`] falls back to that whenever compression does not shrink
//! the input, and [`unzip`] relies on it to skip decompression.

use kvcol_result::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Zstd { level: i32 },
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Zstd { level: 5 }
    }
}

pub fn zip(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Zstd { level } => {
            let packed = zstd::bulk::compress(data, level).map_err(Error::compression)?;
            if packed.len() < data.len() {
                Ok(packed)
            } else {
                Ok(data.to_vec())
            }
        }
    }
}

pub fn unzip(data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
    if data.len() == uncompressed_len {
        return Ok(data.to_vec());
    }
    let out = zstd::bulk::decompress(data, uncompressed_len).map_err(Error::compression)?;
    if out.len() != uncompressed_len {
        return Err(Error::Compression(format!(
            "expected {uncompressed_len} bytes after decompression, got {}",
            out.len()
        )));
    }
    Ok(out)
}
