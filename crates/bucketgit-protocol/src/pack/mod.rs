//! Pack files: the object container exchanged by fetch and push.
//!
//! Framing, entry headers and the trailer checksum come from `gix-pack`;
//! this module inflates entries and resolves deltas against storage.

mod delta;
mod reader;
mod writer;

pub use delta::apply_delta;
pub use reader::{EntryKind, PackEntry, parse_pack, read_pack};
pub use writer::encode_pack;

/// Most memory reserved up front for a size declared by the sender.
pub(crate) const MAX_PREALLOC: usize = 1 << 20;
