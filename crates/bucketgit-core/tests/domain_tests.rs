mod common;

use bucketgit_core::object::{decode_envelope, encode_envelope, parse_commit, parse_tree};
use bucketgit_core::reference::{HEAD, validate_ref_name};
use bucketgit_core::{
    AccessPolicy, Capability, Endpoint, Error, ObjectKind, Reference, RepositoryConfig, hash,
};
use common::{blob, commit, entry_names, tree};

#[test]
fn test_commit_tree_blob_chain() {
    let readme = blob("# hello\n");
    let root = tree(&[("100644", "README.md", readme.hash())]);
    let first = commit(root.hash(), &[], "first\n");
    let second = commit(root.hash(), &[first.hash()], "second\n");

    assert_eq!(root.links().unwrap(), vec![readme.hash()]);
    assert_eq!(second.links().unwrap(), vec![root.hash(), first.hash()]);

    let info = parse_commit(second.data()).unwrap();
    assert_eq!(info.parents, vec![first.hash()]);
    assert_eq!(info.message, "second\n");
    assert_eq!(entry_names(&parse_tree(root.data()).unwrap()), vec!["README.md"]);
}

#[test]
fn test_objects_survive_envelope() {
    let readme = blob("content");
    let root = tree(&[("100644", "a.txt", readme.hash())]);
    let c = commit(root.hash(), &[], "msg\n");

    for object in [readme, root, c] {
        let envelope = encode_envelope(&object).unwrap();
        let decoded = decode_envelope(&envelope).unwrap();
        assert_eq!(decoded.hash(), object.hash());
        assert_eq!(decoded.kind(), object.kind());
    }
}

#[test]
fn test_submodule_entries_are_not_links() {
    let file = blob("x");
    let foreign = hash::compute(ObjectKind::Commit, b"elsewhere");
    let root = tree(&[("100644", "file", file.hash()), ("160000", "lib", foreign)]);
    assert_eq!(root.links().unwrap(), vec![file.hash()]);
}

#[test]
fn test_head_reference_record() {
    let head = Reference::symbolic(HEAD, "refs/heads/main");
    assert_eq!(head.to_record(), "ref: refs/heads/main HEAD");
    assert!(validate_ref_name(head.name()).is_ok());

    let c = commit(hash::compute(ObjectKind::Tree, b""), &[], "m\n");
    let main = Reference::direct("refs/heads/main", c.hash());
    let parsed = Reference::from_record(&main.to_record()).unwrap();
    assert_eq!(parsed.hash(), Some(c.hash()));
}

#[test]
fn test_bootstrap_config_roundtrip() {
    let config = RepositoryConfig::default_bare();
    let text = config.serialize();
    assert_eq!(RepositoryConfig::parse(&text).unwrap(), config);
}

#[test]
fn test_policy_denies_by_default() {
    let policy = AccessPolicy::new();
    for cap in Capability::ALL {
        assert!(!policy.authorize(&Endpoint::new("admin", "admin", cap)));
    }
}

#[test]
fn test_errors_are_typed() {
    let err = Reference::from_record("nonsense").unwrap_err();
    assert!(matches!(err, Error::Malformed { what: "reference record", .. }));

    let err = "git-upload-archive".parse::<Capability>().unwrap_err();
    assert!(err.is_malformed());
}
