//! Little-endian integer helpers for the fixed-layout records.

use kvcol_result::{Error, Result};

#[inline]
pub fn put_u32_le(dst: &mut Vec<u8>, v: u32) {
    dst.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn read_u32_le(src: &[u8], at: usize) -> Result<u32> {
    let bytes = src
        .get(at..at + 4)
        .ok_or_else(|| Error::Format(format!("u32 at offset {at} runs past {} bytes", src.len())))?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(buf))
}

/// Writes `s` as a u32 length followed by its bytes.
pub fn put_str(dst: &mut Vec<u8>, s: &str) {
    put_u32_le(dst, s.len() as u32);
    dst.extend_from_slice(s.as_bytes());
}

/// Reads a length-prefixed string at `at`; returns it with the bytes consumed.
pub fn read_str(src: &[u8], at: usize) -> Result<(String, usize)> {
    if src.len().saturating_sub(at) < 4 {
        return Err(Error::Format(
            "string length prefix is truncated".to_string(),
        ));
    }
    let len = read_u32_le(src, at)? as usize;
    let start = at + 4;
    let bytes = src
        .get(start..start.saturating_add(len))
        .ok_or_else(|| {
            Error::Format(format!(
                "string of {len} bytes runs past the end of a {} byte buffer",
                src.len()
            ))
        })?;
    let s = std::str::from_utf8(bytes)
        .map_err(|e| Error::Format(format!("string is not UTF-8: {e}")))?;
    Ok((s.to_string(), 4 + len))
}
