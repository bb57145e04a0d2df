//! Object ids.

use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::object::ObjectKind;

/// SHA-1 object id. Re-exported from gix so ids interoperate with the wider gix ecosystem.
pub use gix::ObjectId as Hash;

/// Length of a hex-encoded id.
pub const HEX_LEN: usize = 40;

/// Length of a raw id.
pub const RAW_LEN: usize = 20;

/// The all-zero id, used on the wire for "no object".
pub fn zero() -> Hash {
    Hash::null(gix::hash::Kind::Sha1)
}

/// Computes the canonical id of an object: SHA-1 over `"<type> <size>\0"` followed by the content.
pub fn compute(kind: ObjectKind, content: &[u8]) -> Hash {
    let mut hasher = Sha1::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(content.len().to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    let digest: [u8; RAW_LEN] = hasher.finalize().into();
    Hash::from(digest)
}

/// Parses a 40 character hex id.
pub fn parse_hex(hex: &str) -> Result<Hash> {
    if hex.len() != HEX_LEN {
        return Err(Error::malformed(
            "object id",
            format!("expected {HEX_LEN} hex characters, got {}", hex.len()),
        ));
    }
    Hash::from_hex(hex.as_bytes())
        .map_err(|e| Error::malformed("object id", format!("'{hex}': {e}")))
}

/// Builds an id from its raw 20 byte form.
pub fn from_raw(raw: &[u8]) -> Result<Hash> {
    let digest: [u8; RAW_LEN] = raw.try_into().map_err(|_| {
        Error::malformed("object id", format!("expected {RAW_LEN} bytes, got {}", raw.len()))
    })?;
    Ok(Hash::from(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_matches_git() {
        // `printf 'hello\n' | git hash-object --stdin`
        let id = compute(ObjectKind::Blob, b"hello\n");
        assert_eq!(id.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");

        // The empty tree.
        let id = compute(ObjectKind::Tree, b"");
        assert_eq!(id.to_string(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
    }

    #[test]
    fn test_parse_hex_roundtrip() {
        let hex = "ce013625030ba8dba906f756967f9e9ca394464a";
        let id = parse_hex(hex).unwrap();
        assert_eq!(id.to_string(), hex);
    }

    #[test]
    fn test_parse_hex_rejects_bad_input() {
        assert!(parse_hex("ce0136").unwrap_err().is_malformed());
        assert!(parse_hex("zz013625030ba8dba906f756967f9e9ca394464a").is_err());
    }

    #[test]
    fn test_zero() {
        assert!(zero().is_null());
        assert_eq!(zero().to_string(), "0".repeat(HEX_LEN));
    }

    #[test]
    fn test_from_raw() {
        let id = compute(ObjectKind::Blob, b"x");
        assert_eq!(from_raw(id.as_bytes()).unwrap(), id);
        assert!(from_raw(&[1, 2, 3]).is_err());
    }
}
