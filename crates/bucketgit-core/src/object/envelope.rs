//! Loose object envelope: zlib(`"<type> <size>\0"` + content), the format Git uses for loose objects.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::{EncodedObject, ObjectKind};
use crate::error::{Error, Result};

/// Longest possible header: "commit " + 20 digits + NUL.
const MAX_HEADER_LEN: usize = 32;

/// Serializes an object into its deflated envelope.
pub fn encode_envelope(object: &EncodedObject) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(object.data().len() / 2 + 64),
        Compression::default(),
    );
    write!(encoder, "{} {}\0", object.kind(), object.size())?;
    encoder.write_all(object.data())?;
    Ok(encoder.finish()?)
}

/// Inflates an envelope and rebuilds the object. The id is recomputed from the content.
pub fn decode_envelope(envelope: &[u8]) -> Result<EncodedObject> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(envelope)
        .read_to_end(&mut inflated)
        .map_err(|e| Error::malformed("loose object", e.to_string()))?;

    let nul = inflated
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::malformed("loose object", "missing header terminator"))?;
    let (kind, size) = parse_header(&inflated[..nul])?;
    let content = &inflated[nul + 1..];
    if content.len() as u64 != size {
        return Err(Error::malformed(
            "loose object",
            format!("header declares {size} bytes, found {}", content.len()),
        ));
    }

    Ok(EncodedObject::new(kind, Bytes::copy_from_slice(content)))
}

/// Decodes only the header from the first bytes of an envelope.
///
/// Used for size probes: callers fetch a short prefix of the stored envelope
/// instead of the whole body.
pub fn read_envelope_header(prefix: &[u8]) -> Result<(ObjectKind, u64)> {
    let mut header = Vec::with_capacity(MAX_HEADER_LEN);
    let mut decoder = ZlibDecoder::new(prefix);
    let mut byte = [0u8; 1];
    loop {
        match decoder.read(&mut byte) {
            Ok(0) => return Err(Error::malformed("loose object", "truncated header")),
            Ok(_) if byte[0] == 0 => break,
            Ok(_) => {
                header.push(byte[0]);
                if header.len() > MAX_HEADER_LEN {
                    return Err(Error::malformed("loose object", "header too long"));
                }
            },
            // A prefix cut in the middle of the deflate stream reports EOF as an error.
            Err(e) => return Err(Error::malformed("loose object", e.to_string())),
        }
    }
    parse_header(&header)
}

fn parse_header(header: &[u8]) -> Result<(ObjectKind, u64)> {
    let header = std::str::from_utf8(header)
        .map_err(|_| Error::malformed("loose object", "header is not UTF-8"))?;
    let (kind, size) = header
        .split_once(' ')
        .ok_or_else(|| Error::malformed("loose object", format!("bad header '{header}'")))?;
    let kind = kind.parse::<ObjectKind>()?;
    let size = size
        .parse::<u64>()
        .map_err(|_| Error::malformed("loose object", format!("bad size '{size}'")))?;
    Ok((kind, size))
}
