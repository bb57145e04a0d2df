//! Git delta instructions.
//!
//! A delta starts with the base and result sizes as little-endian base-128
//! varints, followed by copy (high bit set) and insert (high bit clear)
//! instructions.

use bucketgit_core::{Error, Result};

use super::MAX_PREALLOC;

/// A copy of size zero copies this many bytes.
const DEFAULT_COPY_SIZE: usize = 0x10000;

/// Rebuilds an object from `base` and a delta.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;
    let base_size = read_size(delta, &mut pos)?;
    let result_size = read_size(delta, &mut pos)?;
    if base_size != base.len() {
        return Err(malformed(format!(
            "base is {} bytes but delta expects {base_size}",
            base.len()
        )));
    }

    let mut out = Vec::with_capacity(result_size.min(MAX_PREALLOC));
    while pos < delta.len() {
        let op = delta[pos];
        pos += 1;

        if op & 0x80 != 0 {
            let mut offset = 0usize;
            for (i, bit) in [0x01u8, 0x02, 0x04, 0x08].into_iter().enumerate() {
                if op & bit != 0 {
                    offset |= usize::from(next(delta, &mut pos)?) << (8 * i);
                }
            }
            let mut size = 0usize;
            for (i, bit) in [0x10u8, 0x20, 0x40].into_iter().enumerate() {
                if op & bit != 0 {
                    size |= usize::from(next(delta, &mut pos)?) << (8 * i);
                }
            }
            if size == 0 {
                size = DEFAULT_COPY_SIZE;
            }
            let end = offset
                .checked_add(size)
                .filter(|end| *end <= base.len())
                .ok_or_else(|| malformed(format!("copy {offset}+{size} outside base")))?;
            out.extend_from_slice(&base[offset..end]);
        } else if op != 0 {
            let size = usize::from(op);
            let end = pos + size;
            if end > delta.len() {
                return Err(malformed("insert runs past the end of the delta"));
            }
            out.extend_from_slice(&delta[pos..end]);
            pos = end;
        } else {
            return Err(malformed("reserved instruction 0"));
        }
        if out.len() > result_size {
            return Err(malformed(format!("result grows past its declared {result_size} bytes")));
        }
    }

    if out.len() != result_size {
        return Err(malformed(format!(
            "result is {} bytes but delta declares {result_size}",
            out.len()
        )));
    }
    Ok(out)
}

fn read_size(data: &[u8], pos: &mut usize) -> Result<usize> {
    let mut value = 0usize;
    let mut shift = 0;
    loop {
        let byte = next(data, pos)?;
        if shift >= usize::BITS as usize {
            return Err(malformed("size varint overflows"));
        }
        value |= usize::from(byte & 0x7f) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}

fn next(data: &[u8], pos: &mut usize) -> Result<u8> {
    let byte = *data.get(*pos).ok_or_else(|| malformed("truncated delta"))?;
    *pos += 1;
    Ok(byte)
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::malformed("delta", reason)
}
