//! Pack decoding.

use std::collections::HashMap;
use std::io::Read;

use bucketgit_core::hash::RAW_LEN;
use bucketgit_core::{EncodedObject, Error, Hash, ObjectKind, Result};
use bucketgit_storage::GitStorage;
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use gix_pack::data::{self, entry::Header, input};
use sha1::{Digest, Sha1};
use tracing::debug;

use super::MAX_PREALLOC;
use super::delta::apply_delta;

const HEADER_LEN: usize = 12;

/// How an entry's content is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A whole object.
    Base(ObjectKind),
    /// A delta against the entry at this absolute pack offset.
    OfsDelta(usize),
    /// A delta against the object with this id, inside or outside the pack.
    RefDelta(Hash),
}

/// One inflated pack entry.
#[derive(Debug, Clone)]
pub struct PackEntry {
    pub offset: usize,
    pub kind: EntryKind,
    pub data: Vec<u8>,
}

/// Splits a pack into inflated entries, checking header and trailer.
pub fn parse_pack(pack: &[u8]) -> Result<Vec<PackEntry>> {
    if pack.len() < HEADER_LEN + RAW_LEN {
        return Err(malformed(format!("{} bytes is too short for a pack", pack.len())));
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&pack[..HEADER_LEN]);
    let (version, count) = data::header::decode(&header).map_err(|e| malformed(e.to_string()))?;
    if version != data::Version::V2 {
        return Err(malformed(format!("unsupported {version:?} pack")));
    }

    let entries_iter = input::BytesToEntriesIter::new_from_header(
        pack,
        input::Mode::Verify,
        input::EntryDataMode::Ignore,
        gix::hash::Kind::Sha1,
    )
    .map_err(|e| malformed(e.to_string()))?;

    let mut entries = Vec::with_capacity((count as usize).min(4096));
    let mut end = HEADER_LEN;
    for entry in entries_iter {
        let entry = entry.map_err(|e| malformed(e.to_string()))?;
        let offset = to_usize(entry.pack_offset)?;
        let start = offset + usize::from(entry.header_size);
        end = start + to_usize(entry.compressed_size)?;
        let compressed = pack
            .get(start..end)
            .ok_or_else(|| malformed(format!("entry at {offset} runs past the pack")))?;

        let kind = match entry.header {
            Header::OfsDelta { base_distance } => {
                let base = Header::verified_base_pack_offset(entry.pack_offset, base_distance)
                    .ok_or_else(|| malformed(format!("entry at {offset} points before the pack")))?;
                EntryKind::OfsDelta(to_usize(base)?)
            },
            Header::RefDelta { base_id } => EntryKind::RefDelta(base_id),
            header => EntryKind::Base(
                header
                    .as_kind()
                    .map(ObjectKind::from)
                    .ok_or_else(|| malformed(format!("entry at {offset} has no object kind")))?,
            ),
        };

        let data = inflate(compressed, to_usize(entry.decompressed_size)?)?;
        entries.push(PackEntry { offset, kind, data });
    }

    // The entry stream only verifies the trailer after its last entry.
    if count == 0 {
        let digest: [u8; RAW_LEN] = Sha1::digest(&pack[..HEADER_LEN]).into();
        if digest[..] != pack[HEADER_LEN..HEADER_LEN + RAW_LEN] {
            return Err(malformed("checksum mismatch"));
        }
    }
    if end + RAW_LEN != pack.len() {
        return Err(malformed(format!(
            "{} trailing bytes after {count} entries",
            pack.len().saturating_sub(end + RAW_LEN)
        )));
    }
    Ok(entries)
}

/// Decodes a pack into objects, resolving every delta.
///
/// Bases named by ref-deltas that are not in the pack (thin packs) are read
/// from `storage`. An empty input is an empty pack.
pub async fn read_pack(pack: &[u8], storage: &dyn GitStorage) -> Result<Vec<EncodedObject>> {
    if pack.is_empty() {
        return Ok(Vec::new());
    }
    let entries = parse_pack(pack)?;
    let by_offset: HashMap<usize, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.offset, i))
        .collect();

    let mut resolved: Vec<Option<EncodedObject>> = vec![None; entries.len()];
    let mut by_hash: HashMap<Hash, usize> = HashMap::new();
    let mut external: HashMap<Hash, EncodedObject> = HashMap::new();
    let mut pending = entries.len();

    while pending > 0 {
        let mut progress = false;
        for (i, entry) in entries.iter().enumerate() {
            if resolved[i].is_some() {
                continue;
            }
            let object = match &entry.kind {
                EntryKind::Base(kind) => EncodedObject::new(*kind, entry.data.clone()),
                EntryKind::OfsDelta(base_offset) => {
                    let base_index = by_offset.get(base_offset).ok_or_else(|| {
                        malformed(format!("no entry at offset {base_offset}"))
                    })?;
                    match &resolved[*base_index] {
                        Some(base) => undelta(base, &entry.data)?,
                        None => continue,
                    }
                },
                EntryKind::RefDelta(base_id) => {
                    let base = by_hash
                        .get(base_id)
                        .and_then(|j| resolved[*j].as_ref())
                        .or_else(|| external.get(base_id));
                    match base {
                        Some(base) => undelta(base, &entry.data)?,
                        None => continue,
                    }
                },
            };
            by_hash.insert(object.hash(), i);
            resolved[i] = Some(object);
            pending -= 1;
            progress = true;
        }

        if pending > 0 && !progress {
            let mut missing: Vec<Hash> = entries
                .iter()
                .enumerate()
                .filter(|(i, _)| resolved[*i].is_none())
                .filter_map(|(_, e)| match &e.kind {
                    EntryKind::RefDelta(id) if !by_hash.contains_key(id) && !external.contains_key(id) => {
                        Some(*id)
                    },
                    _ => None,
                })
                .collect();
            missing.sort();
            missing.dedup();
            if missing.is_empty() {
                return Err(malformed("delta chain cannot be resolved"));
            }
            for id in missing {
                debug!(base = %id, "thin pack base read from storage");
                let base = storage.object(&id, None).await.map_err(|e| {
                    if e.is_not_found() {
                        malformed(format!("delta base {id} is missing"))
                    } else {
                        e
                    }
                })?;
                external.insert(id, base);
            }
        }
    }

    Ok(resolved.into_iter().flatten().collect())
}

fn undelta(base: &EncodedObject, delta: &[u8]) -> Result<EncodedObject> {
    let data = apply_delta(base.data(), delta)?;
    Ok(EncodedObject::new(base.kind(), Bytes::from(data)))
}

/// Inflates one entry. The stream was already checked to produce `size`
/// bytes, but only a bounded amount is reserved before inflating.
fn inflate(compressed: &[u8], size: usize) -> Result<Vec<u8>> {
    let reserve = size
        .min(compressed.len().saturating_mul(4))
        .min(MAX_PREALLOC);
    let mut out = Vec::with_capacity(reserve);
    ZlibDecoder::new(compressed)
        .take(size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| malformed(format!("inflate: {e}")))?;
    if out.len() != size {
        return Err(malformed(format!(
            "entry declared {size} bytes but inflated to {}",
            out.len()
        )));
    }
    Ok(out)
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| malformed(format!("{value} does not fit in memory")))
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::malformed("pack", reason)
}
