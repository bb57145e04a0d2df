//! pkt-line framing.
//!
//! Every packet starts with four lowercase hex digits giving the packet
//! length including those four digits. `0000` is a flush packet, `0001` a
//! delimiter and `0002` a response-end marker; `0003` is never valid.
//! Decoding and framing are done by `gix-packetline`.

use bucketgit_core::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use gix_packetline::decode::{self, Stream};
use gix_packetline::{PacketLineRef, encode};

/// Side-band channels.
pub use gix_packetline::Channel as Band;

/// Largest packet, prefix included.
pub const MAX_PKT_LEN: usize = 65520;

/// Largest payload of a data packet.
pub const MAX_PKT_DATA: usize = MAX_PKT_LEN - 4;

/// Largest packet when only the old `side-band` capability was negotiated.
pub const SIDE_BAND_PKT_LEN: usize = 1000;

const PREFIX_LEN: usize = 4;

/// One decoded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PktLine<'a> {
    Flush,
    Delim,
    ResponseEnd,
    Data(&'a [u8]),
}

impl<'a> PktLine<'a> {
    /// Returns the payload of a data packet without its trailing newline.
    pub fn text(&self) -> Option<&'a [u8]> {
        match self {
            Self::Data(data) => Some(data.strip_suffix(b"\n").unwrap_or(data)),
            _ => None,
        }
    }

    /// Like [`PktLine::text`] but as UTF-8.
    pub fn text_str(&self) -> Result<Option<&'a str>> {
        self.text()
            .map(|t| {
                std::str::from_utf8(t).map_err(|_| Error::malformed("pkt-line", "payload is not UTF-8"))
            })
            .transpose()
    }

    pub fn is_flush(&self) -> bool {
        matches!(self, Self::Flush)
    }
}

/// Reads packets from an in-memory buffer.
#[derive(Debug, Clone)]
pub struct PktReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PktReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reads the next packet; `None` at the end of input.
    pub fn read(&mut self) -> Result<Option<PktLine<'a>>> {
        let buf: &'a [u8] = self.buf;
        let rest = &buf[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }

        let (line, consumed) = match decode::streaming(rest).map_err(malformed)? {
            Stream::Complete { line, bytes_consumed } => (line, bytes_consumed),
            Stream::Incomplete { bytes_needed } => {
                return Err(Error::malformed(
                    "pkt-line",
                    format!("truncated packet, {bytes_needed} more bytes expected"),
                ));
            },
        };
        self.pos += consumed;

        Ok(Some(match line {
            PacketLineRef::Data(data) => PktLine::Data(data),
            PacketLineRef::Flush => PktLine::Flush,
            PacketLineRef::Delimiter => PktLine::Delim,
            PacketLineRef::ResponseEnd => PktLine::ResponseEnd,
        }))
    }

    /// Reads the next packet, treating end of input as an error.
    pub fn expect(&mut self) -> Result<PktLine<'a>> {
        self.read()?
            .ok_or_else(|| Error::malformed("pkt-line", "unexpected end of input"))
    }

    /// Bytes after the last packet read, e.g. the pack following push commands.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

fn malformed(err: impl std::fmt::Display) -> Error {
    Error::malformed("pkt-line", err.to_string())
}

/// Side-band mode negotiated with the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideBand {
    #[default]
    None,
    /// `side-band`: packets of at most 1000 bytes.
    Small,
    /// `side-band-64k`: packets of at most 65520 bytes.
    Large,
}

impl SideBand {
    /// Picks the best mode from client capabilities.
    pub fn from_capabilities<'a>(mut caps: impl Iterator<Item = &'a str>) -> Self {
        let mut mode = Self::None;
        for cap in caps.by_ref() {
            match cap {
                "side-band-64k" => return Self::Large,
                "side-band" => mode = Self::Small,
                _ => {},
            }
        }
        mode
    }

    fn max_payload(&self) -> usize {
        match self {
            Self::None => MAX_PKT_DATA,
            Self::Small => SIDE_BAND_PKT_LEN - PREFIX_LEN - 1,
            Self::Large => MAX_PKT_LEN - PREFIX_LEN - 1,
        }
    }
}

/// Builds a response out of packets.
#[derive(Debug, Default)]
pub struct PktWriter {
    buf: BytesMut,
}

impl PktWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one data packet.
    pub fn data(&mut self, data: &[u8]) -> Result<&mut Self> {
        if data.len() > MAX_PKT_DATA {
            return Err(Error::malformed(
                "pkt-line",
                format!("payload of {} bytes exceeds {MAX_PKT_DATA}", data.len()),
            ));
        }
        encode::data_to_write(data, (&mut self.buf).writer()).map_err(malformed)?;
        Ok(self)
    }

    /// Writes a text packet terminated by a newline.
    pub fn text(&mut self, line: &str) -> Result<&mut Self> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.data(&data)
    }

    pub fn flush(&mut self) -> &mut Self {
        self.buf.put_slice(b"0000");
        self
    }

    /// Writes `data` on a side-band channel, split into as many packets as needed.
    ///
    /// With [`SideBand::None`] only [`Band::Data`] is written, unframed; other bands are dropped.
    pub fn band(&mut self, mode: SideBand, band: Band, data: &[u8]) -> Result<&mut Self> {
        if mode == SideBand::None {
            if band == Band::Data {
                self.buf.put_slice(data);
            }
            return Ok(self);
        }
        for chunk in data.chunks(mode.max_payload()) {
            encode::band_to_write(band, chunk, (&mut self.buf).writer()).map_err(malformed)?;
        }
        Ok(self)
    }

    /// Appends bytes that are not pkt-line framed (a raw pack).
    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.put_slice(data);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
