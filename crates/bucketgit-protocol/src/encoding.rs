//! Request body content encodings.

use std::borrow::Cow;
use std::io::Read;

use bucketgit_core::{Error, Result};
use flate2::read::GzDecoder;

/// Returns the request body with its `Content-Encoding` removed.
///
/// Git clients gzip large upload-pack requests. `limit` bounds the inflated size.
pub fn decode_body<'a>(content_encoding: Option<&str>, body: &'a [u8], limit: usize) -> Result<Cow<'a, [u8]>> {
    match content_encoding.map(str::trim) {
        None | Some("") | Some("identity") => Ok(Cow::Borrowed(body)),
        Some("gzip") | Some("x-gzip") => {
            let mut out = Vec::with_capacity(body.len() * 4);
            GzDecoder::new(body)
                .take(limit as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|e| Error::malformed("request body", format!("gzip: {e}")))?;
            if out.len() > limit {
                return Err(Error::malformed(
                    "request body",
                    format!("inflates past {limit} bytes"),
                ));
            }
            Ok(Cow::Owned(out))
        },
        Some(other) => Err(Error::malformed(
            "request body",
            format!("unsupported content encoding '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_identity_is_borrowed() {
        let body = b"0009done\n";
        assert!(matches!(decode_body(None, body, 100).unwrap(), Cow::Borrowed(_)));
        assert_eq!(&*decode_body(Some("identity"), body, 100).unwrap(), body);
    }

    #[test]
    fn test_gzip_is_inflated() {
        let body = gzip(b"0032want 0000000000000000000000000000000000000000\n");
        let out = decode_body(Some("gzip"), &body, 1024).unwrap();
        assert!(out.starts_with(b"0032want"));
    }

    #[test]
    fn test_limits_and_errors() {
        let body = gzip(&[0u8; 4096]);
        assert!(decode_body(Some("gzip"), &body, 1024).unwrap_err().is_malformed());
        assert!(decode_body(Some("gzip"), b"not gzip", 1024).is_err());
        assert!(decode_body(Some("br"), b"", 1024).is_err());
    }
}
