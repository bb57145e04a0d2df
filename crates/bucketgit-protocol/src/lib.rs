//! bucketgit protocol - Git smart HTTP over a [`GitStorage`]
//!
//! This crate speaks the server side of Git's smart HTTP protocol:
//!
//! - [`pktline`]: length-prefixed framing and side-band multiplexing
//! - [`pack`]: pack file decoding (including deltas) and encoding
//! - [`advertise`]: the `info/refs` reference advertisement
//! - [`upload_pack`]: fetch negotiation and pack generation
//! - [`receive_pack`]: push commands and per-reference compare-and-swap
//!
//! Everything works on complete request bodies and returns complete
//! response bodies; HTTP concerns live in the server crate.
//!
//! [`GitStorage`]: bucketgit_storage::GitStorage

pub mod advertise;
pub mod encoding;
pub mod pack;
pub mod pktline;
pub mod receive_pack;
pub mod service;
pub mod upload_pack;

pub use advertise::{AdvertisedRef, advertise, list_refs};
pub use encoding::decode_body;
pub use pktline::{Band, PktLine, PktReader, PktWriter, SideBand};
pub use receive_pack::{PushReport, PushRequest, RefCommand, RefStatus, receive_pack};
pub use service::Service;
pub use upload_pack::{FetchOutcome, UploadRequest, upload_pack};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_defined() {
        assert!(!version().is_empty());
    }
}
