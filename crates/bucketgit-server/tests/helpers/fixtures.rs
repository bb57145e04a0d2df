//! Git objects and request bodies.

use bucketgit_core::{AccessPolicy, Capability, EncodedObject, Hash, ObjectKind, hash};
use bucketgit_protocol::pack::encode_pack;
use bucketgit_protocol::{PktLine, PktReader, PktWriter};

/// A commit with its root tree and blobs, commit first.
pub struct Snapshot {
    pub commit: EncodedObject,
    pub objects: Vec<EncodedObject>,
}

impl Snapshot {
    pub fn id(&self) -> Hash {
        self.commit.hash()
    }
}

/// Builds a commit whose tree holds `files` (flat, no directories).
pub fn snapshot(files: &[(&str, &str)], message: &str, parent: Option<Hash>) -> Snapshot {
    let mut objects = Vec::new();
    let mut sorted: Vec<_> = files.to_vec();
    sorted.sort_by_key(|(name, _)| *name);

    let mut tree = Vec::new();
    for (name, content) in sorted {
        let blob = EncodedObject::blob(content.as_bytes().to_vec());
        tree.extend_from_slice(format!("100644 {name}\0").as_bytes());
        tree.extend_from_slice(blob.hash().as_bytes());
        objects.push(blob);
    }
    let tree = EncodedObject::new(ObjectKind::Tree, tree);

    let mut body = format!("tree {}\n", tree.hash());
    if let Some(parent) = parent {
        body.push_str(&format!("parent {parent}\n"));
    }
    body.push_str("author Dev <dev@example.com> 1700000000 +0000\n");
    body.push_str("committer Dev <dev@example.com> 1700000000 +0000\n\n");
    body.push_str(message);
    body.push('\n');
    let commit = EncodedObject::new(ObjectKind::Commit, body.into_bytes());

    objects.push(tree);
    objects.insert(0, commit.clone());
    Snapshot { commit, objects }
}

/// A create or update of `name` with `report-status`, carrying `objects`.
pub fn push_body(old: Option<Hash>, new: Hash, name: &str, objects: &[EncodedObject]) -> Vec<u8> {
    let old = old.unwrap_or_else(hash::zero);
    let mut w = PktWriter::new();
    w.data(format!("{old} {new} {name}\0report-status").as_bytes())
        .unwrap();
    w.flush();
    let mut body = w.freeze().to_vec();
    body.extend(encode_pack(objects).unwrap());
    body
}

/// A complete fetch of `want` without side-band.
pub fn fetch_body(want: Hash, haves: &[Hash]) -> Vec<u8> {
    let mut w = PktWriter::new();
    w.text(&format!("want {want} no-progress")).unwrap();
    w.flush();
    for have in haves {
        w.text(&format!("have {have}")).unwrap();
    }
    w.text("done").unwrap();
    w.freeze().to_vec()
}

/// Text of every data pkt-line up to the first flush that ends the input.
pub fn pkt_texts(bytes: &[u8]) -> Vec<String> {
    let mut reader = PktReader::new(bytes);
    let mut out = Vec::new();
    while let Ok(Some(line)) = reader.read() {
        if let PktLine::Data(_) = line {
            if let Ok(Some(text)) = line.text_str() {
                out.push(text.to_string());
            }
        }
    }
    out
}

/// Policy granting `user` (password `password`) the given capabilities on `repo`.
pub fn policy_with(user: &str, password: &str, repo: &str, caps: &[Capability]) -> AccessPolicy {
    let mut policy = AccessPolicy::new();
    policy.add_user(user, bcrypt::hash(password, 4).unwrap());
    policy.grant(repo, user, caps.iter().copied());
    policy
}
