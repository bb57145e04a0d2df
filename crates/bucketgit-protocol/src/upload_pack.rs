//! Fetch: want/have negotiation and pack generation.
//!
//! Only the stateless, non-multi-ack variant is spoken: every request carries
//! the full list of wants and haves, the server ACKs the first have it
//! shares with the client (or NAKs when there is none) and, once the client
//! says `done`, sends every object reachable from the wants that is not
//! reachable from a common have. Wants must name an advertised tip or a
//! peeled tag target; stored objects that no reference reaches are never served.

use std::collections::{HashSet, VecDeque};

use bucketgit_core::reference::HEAD;
use bucketgit_core::{EncodedObject, Error, Hash, Result, hash};
use bucketgit_storage::GitStorage;
use bytes::Bytes;
use tracing::{debug, info};

use crate::advertise::list_refs;
use crate::pack::encode_pack;
use crate::pktline::{Band, PktReader, PktWriter, SideBand};

/// A decoded upload-pack request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    pub wants: Vec<Hash>,
    pub haves: Vec<Hash>,
    /// Capabilities sent after the first want.
    pub capabilities: Vec<String>,
    pub done: bool,
}

impl UploadRequest {
    /// Decodes want, have and done lines. Shallow and filter requests are rejected.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut request = Self::default();
        let mut reader = PktReader::new(body);
        while let Some(line) = reader.read()? {
            let Some(text) = line.text_str()? else {
                continue;
            };
            if let Some(rest) = text.strip_prefix("want ") {
                let mut parts = rest.split(' ');
                let id = parts.next().unwrap_or_default();
                request.wants.push(hash::parse_hex(id)?);
                if request.wants.len() == 1 {
                    request.capabilities = parts.filter(|c| !c.is_empty()).map(str::to_string).collect();
                }
            } else if let Some(id) = text.strip_prefix("have ") {
                request.haves.push(hash::parse_hex(id.trim())?);
            } else if text == "done" {
                request.done = true;
                break;
            } else if text.starts_with("shallow ") || text.starts_with("deepen") {
                return Err(Error::Unsupported("shallow fetch"));
            } else if text.starts_with("filter ") {
                return Err(Error::Unsupported("partial clone filters"));
            } else {
                return Err(Error::malformed("upload-pack request", format!("unexpected line '{text}'")));
            }
        }
        if request.wants.is_empty() {
            return Err(Error::malformed("upload-pack request", "no want lines"));
        }
        Ok(request)
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c == name)
    }

    pub fn side_band(&self) -> SideBand {
        SideBand::from_capabilities(self.capabilities.iter().map(String::as_str))
    }
}

/// Result of one upload-pack exchange.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: Bytes,
    /// Objects in the pack, zero when the round ended without `done`.
    pub objects_sent: usize,
}

/// Runs one stateless upload-pack round against `storage`.
pub async fn upload_pack(storage: &dyn GitStorage, body: &[u8]) -> Result<FetchOutcome> {
    let request = UploadRequest::parse(body)?;

    let advertised = advertised_ids(storage).await?;
    for want in &request.wants {
        if !advertised.contains(want) {
            return Err(Error::malformed("upload-pack request", format!("not our ref {want}")));
        }
    }

    let mut common = Vec::new();
    for have in &request.haves {
        if storage.has_object(have).await? {
            common.push(*have);
        }
    }

    let mut w = PktWriter::new();
    match common.first() {
        Some(first) => w.text(&format!("ACK {first}"))?,
        None => w.text("NAK")?,
    };

    if !request.done {
        debug!(wants = request.wants.len(), haves = request.haves.len(), common = common.len(), "negotiation round");
        return Ok(FetchOutcome {
            response: w.freeze(),
            objects_sent: 0,
        });
    }

    let excluded = closure(storage, &common).await?;
    let objects = collect(storage, &request.wants, &excluded).await?;
    let pack = encode_pack(&objects)?;
    info!(
        wants = request.wants.len(),
        common = common.len(),
        objects = objects.len(),
        bytes = pack.len(),
        "sending pack"
    );

    let mode = request.side_band();
    if mode != SideBand::None && !request.has_capability("no-progress") {
        w.band(
            mode,
            Band::Progress,
            format!("Total {} (delta 0), reused 0 (delta 0)\n", objects.len()).as_bytes(),
        )?;
    }
    w.band(mode, Band::Data, &pack)?;
    if mode != SideBand::None {
        w.flush();
    }

    Ok(FetchOutcome {
        response: w.freeze(),
        objects_sent: objects.len(),
    })
}

/// Ids a client may want: HEAD, every advertised tip and every peeled tag target.
async fn advertised_ids(storage: &dyn GitStorage) -> Result<HashSet<Hash>> {
    let mut ids = HashSet::new();
    match storage.resolve(HEAD).await {
        Ok(head) => {
            ids.insert(head);
        },
        Err(e) if e.is_not_found() => {},
        Err(e) => return Err(e),
    }
    for advertised in list_refs(storage).await? {
        ids.insert(advertised.id);
        ids.extend(advertised.peeled);
    }
    Ok(ids)
}

/// Every id reachable from `roots`.
pub async fn closure(storage: &dyn GitStorage, roots: &[Hash]) -> Result<HashSet<Hash>> {
    let mut seen: HashSet<Hash> = HashSet::new();
    let mut queue: VecDeque<Hash> = roots.iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let object = storage.object(&id, None).await?;
        queue.extend(object.links()?.into_iter().filter(|l| !seen.contains(l)));
    }
    Ok(seen)
}

/// Objects reachable from `roots` and not in `excluded`, in breadth-first order.
pub async fn collect(
    storage: &dyn GitStorage,
    roots: &[Hash],
    excluded: &HashSet<Hash>,
) -> Result<Vec<EncodedObject>> {
    let mut seen: HashSet<Hash> = excluded.clone();
    let mut queue: VecDeque<Hash> = roots.iter().copied().collect();
    let mut out = Vec::new();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let object = storage.object(&id, None).await?;
        queue.extend(object.links()?.into_iter().filter(|l| !seen.contains(l)));
        out.push(object);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bucketgit_core::{ObjectKind, Reference};
    use bucketgit_storage::BucketRepository;
    use object_store::memory::InMemory;
    use object_store::path::Path;

    use super::*;
    use crate::pack::parse_pack;
    use crate::pktline::PktLine;

    fn repo() -> BucketRepository {
        BucketRepository::new(
            Arc::new(InMemory::new()),
            &Path::default(),
            "repo",
            Duration::from_secs(5),
        )
    }

    fn tree(entries: &[(&str, &str, Hash)]) -> EncodedObject {
        let mut data = Vec::new();
        for (mode, name, id) in entries {
            data.extend_from_slice(format!("{mode} {name}\0").as_bytes());
            data.extend_from_slice(id.as_bytes());
        }
        EncodedObject::new(ObjectKind::Tree, data)
    }

    fn commit(tree: Hash, parents: &[Hash], message: &str) -> EncodedObject {
        let mut text = format!("tree {tree}\n");
        for parent in parents {
            text.push_str(&format!("parent {parent}\n"));
        }
        text.push_str("author A <a@example.com> 0 +0000\ncommitter A <a@example.com> 0 +0000\n\n");
        text.push_str(message);
        EncodedObject::new(ObjectKind::Commit, text.into_bytes())
    }

    /// Two commits: c1 (tree1: a.txt) and c2 (tree2: a.txt, b.txt) on top.
    async fn history(repo: &BucketRepository) -> (EncodedObject, EncodedObject) {
        let a = EncodedObject::blob(&b"a\n"[..]);
        let b = EncodedObject::blob(&b"b\n"[..]);
        let tree1 = tree(&[("100644", "a.txt", a.hash())]);
        let tree2 = tree(&[("100644", "a.txt", a.hash()), ("100644", "b.txt", b.hash())]);
        let c1 = commit(tree1.hash(), &[], "one\n");
        let c2 = commit(tree2.hash(), &[c1.hash()], "two\n");
        for object in [&a, &b, &tree1, &tree2, &c1, &c2] {
            repo.put_object(object).await.unwrap();
        }
        repo.set_reference(&Reference::direct("refs/heads/main", c2.hash()))
            .await
            .unwrap();
        (c1, c2)
    }

    fn request(lines: &[String], done: bool) -> Vec<u8> {
        let mut w = PktWriter::new();
        let mut iter = lines.iter();
        if let Some(first) = iter.next() {
            w.text(first).unwrap();
        }
        w.flush();
        for line in iter {
            w.text(line).unwrap();
        }
        if done {
            w.text("done").unwrap();
        } else {
            w.flush();
        }
        w.freeze().to_vec()
    }

    /// Splits a side-band response into its pre-pack lines and the pack bytes.
    fn split_sideband(bytes: &[u8]) -> (Vec<String>, Vec<u8>) {
        let mut r = PktReader::new(bytes);
        let mut lines = Vec::new();
        let mut pack = Vec::new();
        while let Some(line) = r.read().unwrap() {
            if let PktLine::Data(data) = line {
                match data[0] {
                    1 => pack.extend_from_slice(&data[1..]),
                    2 | 3 => {},
                    _ => lines.push(line.text_str().unwrap().unwrap().to_string()),
                }
            }
        }
        (lines, pack)
    }

    #[test]
    fn test_parse_request() {
        let id = EncodedObject::blob(&b"x"[..]).hash();
        let body = request(
            &[format!("want {id} side-band-64k ofs-delta agent=git/2.43"), format!("have {id}")],
            true,
        );
        let request = UploadRequest::parse(&body).unwrap();
        assert_eq!(request.wants, vec![id]);
        assert_eq!(request.haves, vec![id]);
        assert!(request.done);
        assert!(request.has_capability("ofs-delta"));
        assert_eq!(request.side_band(), SideBand::Large);
    }

    #[test]
    fn test_parse_rejects_shallow_and_garbage() {
        let id = EncodedObject::blob(&b"x"[..]).hash();
        let shallow = request(&[format!("want {id}"), "deepen 1".to_string()], true);
        assert!(UploadRequest::parse(&shallow).unwrap_err().is_unsupported());

        let garbage = request(&[format!("want {id}"), "frobnicate".to_string()], true);
        assert!(UploadRequest::parse(&garbage).unwrap_err().is_malformed());

        let empty = request(&[], true);
        assert!(UploadRequest::parse(&empty).unwrap_err().is_malformed());
    }

    #[tokio::test]
    async fn test_clone_sends_everything() {
        let repo = repo();
        let (_, c2) = history(&repo).await;

        let body = request(&[format!("want {} side-band-64k", c2.hash())], true);
        let outcome = upload_pack(&repo, &body).await.unwrap();
        let (lines, pack) = split_sideband(&outcome.response);

        assert_eq!(lines, vec!["NAK".to_string()]);
        assert_eq!(outcome.objects_sent, 6);
        assert_eq!(parse_pack(&pack).unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_incremental_fetch_excludes_common_history() {
        let repo = repo();
        let (c1, c2) = history(&repo).await;

        let body = request(
            &[format!("want {} side-band-64k no-progress", c2.hash()), format!("have {}", c1.hash())],
            true,
        );
        let outcome = upload_pack(&repo, &body).await.unwrap();
        let (lines, pack) = split_sideband(&outcome.response);

        assert_eq!(lines, vec![format!("ACK {}", c1.hash())]);
        // c2, tree2 and b.txt; a.txt is reachable from c1.
        assert_eq!(outcome.objects_sent, 3);
        assert_eq!(parse_pack(&pack).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_round_without_done_only_negotiates() {
        let repo = repo();
        let (c1, c2) = history(&repo).await;
        let unknown = EncodedObject::blob(&b"client only"[..]).hash();

        let body = request(&[format!("want {}", c2.hash()), format!("have {unknown}")], false);
        let outcome = upload_pack(&repo, &body).await.unwrap();
        assert_eq!(&outcome.response[..], b"0008NAK\n");
        assert_eq!(outcome.objects_sent, 0);

        let body = request(
            &[format!("want {}", c2.hash()), format!("have {unknown}"), format!("have {}", c1.hash())],
            false,
        );
        let outcome = upload_pack(&repo, &body).await.unwrap();
        let mut r = PktReader::new(&outcome.response);
        assert_eq!(r.expect().unwrap().text_str().unwrap(), Some(format!("ACK {}", c1.hash()).as_str()));
        assert!(r.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_without_sideband_pack_follows_nak() {
        let repo = repo();
        let (_, c2) = history(&repo).await;

        let body = request(&[format!("want {}", c2.hash())], true);
        let outcome = upload_pack(&repo, &body).await.unwrap();
        assert_eq!(&outcome.response[..8], b"0008NAK\n");
        assert_eq!(&outcome.response[8..12], b"PACK");
        assert_eq!(parse_pack(&outcome.response[8..]).unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_unknown_want_is_rejected() {
        let repo = repo();
        let missing = EncodedObject::blob(&b"nowhere"[..]).hash();
        let body = request(&[format!("want {missing}")], true);
        assert!(upload_pack(&repo, &body).await.unwrap_err().is_malformed());
    }

    #[tokio::test]
    async fn test_unreferenced_object_is_not_served() {
        let repo = repo();
        let (c1, _) = history(&repo).await;
        let stray = commit(c1.hash(), &[], "never referenced\n");
        repo.put_object(&stray).await.unwrap();

        let body = request(&[format!("want {}", stray.hash())], true);
        let err = upload_pack(&repo, &body).await.unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("not our ref"));

        // Reachable but not a tip.
        let body = request(&[format!("want {}", c1.hash())], true);
        assert!(upload_pack(&repo, &body).await.is_err());
    }
}
