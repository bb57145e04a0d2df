//! Pack encoding. Every entry is stored whole; no deltas are produced.

use std::io::Write;

use bucketgit_core::{EncodedObject, Error, ObjectKind, Result};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use gix_pack::data::{self, entry::Header};
use sha1::{Digest, Sha1};

/// Encodes `objects` as a version 2 pack with its SHA-1 trailer.
pub fn encode_pack(objects: &[EncodedObject]) -> Result<Vec<u8>> {
    let count = u32::try_from(objects.len())
        .map_err(|_| Error::malformed("pack", format!("{} objects do not fit a pack", objects.len())))?;

    let mut out = Vec::with_capacity(64 + objects.iter().map(|o| o.data().len()).sum::<usize>());
    out.extend_from_slice(&data::header::encode(data::Version::V2, count));

    for object in objects {
        base_header(object.kind()).write_to(object.data().len() as u64, &mut out)?;
        let mut encoder = ZlibEncoder::new(&mut out, Compression::default());
        encoder.write_all(object.data())?;
        encoder.finish()?;
    }

    let digest: [u8; 20] = Sha1::digest(&out).into();
    out.extend_from_slice(&digest);
    Ok(out)
}

/// Entry header for a whole object.
pub(crate) fn base_header(kind: ObjectKind) -> Header {
    match kind {
        ObjectKind::Commit => Header::Commit,
        ObjectKind::Tree => Header::Tree,
        ObjectKind::Blob => Header::Blob,
        ObjectKind::Tag => Header::Tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_header() {
        let mut out = Vec::new();
        base_header(ObjectKind::Blob).write_to(5, &mut out).unwrap();
        assert_eq!(out, [0x35]);

        out.clear();
        base_header(ObjectKind::Commit).write_to(300, &mut out).unwrap();
        // 300 = 0b1_0010_1100: low nibble 0xc, then 300 >> 4 = 18
        assert_eq!(out, [0x80 | 0x10 | 0x0c, 18]);
    }

    #[test]
    fn test_empty_pack() {
        let pack = encode_pack(&[]).unwrap();
        assert_eq!(pack.len(), 12 + 20);
        assert_eq!(&pack[..4], b"PACK");
        assert_eq!(&pack[8..12], &[0, 0, 0, 0]);
    }
}
