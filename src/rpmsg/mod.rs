//! rpmsg container decoding
//!
//! An rpmsg attachment (`message.rpmsg`) wraps a compound file holding the
//! protected message. The container is an 8-byte magic prefix followed by
//! segments whose payloads form one zlib stream. Decoding is a pull pipeline:
//!
//! ```text
//! source -> magic check -> segment framing -> zlib inflate -> compound file
//! ```
//!
//! [`decode`] checks the prefix and returns an [`InflateReader`]; the framing
//! and decompression layers are never constructed directly.
//!
//! # Example
//!
//! ```no_run
//! use librms::rpmsg;
//! use std::fs::File;
//! use std::io;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = File::open("message.rpmsg")?;
//! let mut reader = rpmsg::decode(input)?;
//! let mut output = File::create("message.compound")?;
//! let written = io::copy(&mut reader, &mut output)?;
//! println!("Decoded {} bytes", written);
//! # Ok(())
//! # }
//! ```

mod inflate;
mod segment;
mod writer;

pub use inflate::InflateReader;
pub use segment::{SegmentHeader, SEGMENT_HEADER_LEN, SEGMENT_TAG};
pub use writer::{encode, encode_with_config, RpmsgWriter, WriterConfig, DEFAULT_SEGMENT_SIZE};

use crate::error::{Error, Result};
use segment::SegmentReader;
use std::io::{self, Read};
use tracing::debug;

/// Magic prefix at offset 0 of every rpmsg container
pub const MAGIC_PREFIX: [u8; 8] = [0x76, 0xE8, 0x04, 0x60, 0xC4, 0x11, 0xE3, 0x86];

/// Default upper bound on a single segment's compressed payload (64 MiB)
pub const DEFAULT_MAX_SEGMENT_SIZE: u32 = 64 * 1024 * 1024;

/// Decoder configuration
///
/// # Example
///
/// ```
/// use librms::rpmsg::DecoderConfig;
///
/// let config = DecoderConfig::new().with_max_segment_size(1 << 20);
/// assert_eq!(config.max_segment_size(), 1 << 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    max_segment_size: u32,
}

impl DecoderConfig {
    /// Create a configuration with the default segment size limit
    pub fn new() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
        }
    }

    /// Limit the compressed payload size accepted for a single segment
    ///
    /// The payload is buffered in memory, so this bounds the allocation a
    /// malformed header can trigger.
    pub fn with_max_segment_size(mut self, max: u32) -> Self {
        self.max_segment_size = max;
        self
    }

    /// Largest accepted compressed payload per segment
    pub fn max_segment_size(&self) -> u32 {
        self.max_segment_size
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Start decoding an rpmsg container with the default configuration
///
/// Reads and checks the magic prefix; nothing else is consumed until the
/// returned reader is read.
///
/// # Errors
///
/// [`Error::InvalidMagic`] if the source is shorter than the prefix or does
/// not start with it, [`Error::Io`] if the source fails.
pub fn decode<R: Read>(reader: R) -> Result<InflateReader<R>> {
    decode_with_config(reader, DecoderConfig::default())
}

/// Start decoding an rpmsg container with a custom configuration
pub fn decode_with_config<R: Read>(mut reader: R, config: DecoderConfig) -> Result<InflateReader<R>> {
    let mut prefix = [0u8; MAGIC_PREFIX.len()];
    let n = read_full(&mut reader, &mut prefix)?;
    if n < prefix.len() {
        return Err(Error::InvalidMagic(format!(
            "source ended after {} of {} prefix bytes",
            n,
            prefix.len()
        )));
    }
    if prefix != MAGIC_PREFIX {
        return Err(Error::InvalidMagic(format!(
            "found {:02x?}, expected {:02x?}",
            prefix, MAGIC_PREFIX
        )));
    }
    debug!(
        max_segment_size = config.max_segment_size,
        "rpmsg magic prefix matched"
    );

    Ok(InflateReader::new(SegmentReader::new(
        reader,
        config.max_segment_size,
    )))
}

/// Decode a whole container into memory
///
/// Unlike reading an [`InflateReader`] through [`std::io::Read`], errors come
/// back as typed [`Error`] values.
pub fn decode_to_vec<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut decoder = decode(reader)?;
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Fill `buf` from `reader`, stopping early only at end of input
///
/// Returns the number of bytes read, so callers can tell a clean end (0) from
/// a short read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
