//! Container writing
//!
//! Produces containers the decoder accepts: the magic prefix, then the
//! plaintext split into segments of a fixed uncompressed size. All segments
//! share one zlib stream; each segment boundary is a sync flush so the
//! compressed bytes of a segment correspond exactly to its original bytes.

use super::segment::SegmentHeader;
use super::MAGIC_PREFIX;
use crate::error::{Error, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Write};
use tracing::trace;

/// Default number of uncompressed bytes per segment
pub const DEFAULT_SEGMENT_SIZE: usize = 4096;

/// Options for [`RpmsgWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    segment_size: usize,
    level: u32,
}

impl WriterConfig {
    /// Create a configuration with 4 KiB segments and default compression
    pub fn new() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            level: Compression::default().level(),
        }
    }

    /// Set the number of uncompressed bytes per segment (at least 1)
    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size.max(1);
        self
    }

    /// Set the zlib compression level (0-9)
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level.min(9);
        self
    }

    /// Uncompressed bytes per segment
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Zlib compression level
    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Streaming container writer
///
/// # Example
///
/// ```
/// use librms::rpmsg::{self, RpmsgWriter};
/// use std::io::{Read, Write};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut writer = RpmsgWriter::new(Vec::new())?;
/// writer.write_all(b"compound file bytes")?;
/// let container = writer.finish()?;
///
/// let mut decoded = Vec::new();
/// rpmsg::decode(container.as_slice())?.read_to_end(&mut decoded)?;
/// assert_eq!(decoded, b"compound file bytes");
/// # Ok(())
/// # }
/// ```
pub struct RpmsgWriter<W: Write> {
    inner: W,
    encoder: ZlibEncoder<Vec<u8>>,
    /// Plaintext not yet assigned to a segment
    pending: Vec<u8>,
    segment_size: usize,
    segments: u64,
}

impl<W: Write> RpmsgWriter<W> {
    /// Create a writer with the default configuration, writing the magic prefix
    pub fn new(inner: W) -> io::Result<Self> {
        Self::with_config(inner, WriterConfig::default())
    }

    /// Create a writer with a custom configuration, writing the magic prefix
    pub fn with_config(mut inner: W, config: WriterConfig) -> io::Result<Self> {
        inner.write_all(&MAGIC_PREFIX)?;
        Ok(Self {
            inner,
            encoder: ZlibEncoder::new(Vec::new(), Compression::new(config.level)),
            pending: Vec::with_capacity(config.segment_size),
            segment_size: config.segment_size,
            segments: 0,
        })
    }

    /// Emit one segment holding `original` uncompressed bytes
    ///
    /// `last` finishes the zlib stream instead of sync-flushing it.
    fn emit(&mut self, original: usize, last: bool) -> io::Result<()> {
        self.encoder.write_all(&self.pending[..original])?;
        if last {
            self.encoder.try_finish()?;
        } else {
            self.encoder.flush()?;
        }
        let compressed = std::mem::take(self.encoder.get_mut());

        let index = self.segments;
        let too_large = || -> io::Error {
            Error::invalid_segment(index, "segment does not fit in a 32-bit size field").into()
        };
        let header = SegmentHeader {
            original_size: u32::try_from(original).map_err(|_| too_large())?,
            compressed_size: u32::try_from(compressed.len()).map_err(|_| too_large())?,
        };
        self.inner.write_all(&header.to_bytes())?;
        self.inner.write_all(&compressed)?;

        self.pending.drain(..original);
        self.segments += 1;
        trace!(
            segment = index,
            original_size = header.original_size,
            compressed_size = header.compressed_size,
            "wrote segment"
        );
        Ok(())
    }

    /// Write the remaining plaintext as the final segment and return the sink
    pub fn finish(mut self) -> io::Result<W> {
        self.emit(self.pending.len(), true)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for RpmsgWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        // Keep at least one byte back so the final segment is never empty
        // unless the whole plaintext is.
        while self.pending.len() > self.segment_size {
            self.emit(self.segment_size, false)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Encode `plaintext` into an in-memory container with default settings
pub fn encode(plaintext: &[u8]) -> Result<Vec<u8>> {
    encode_with_config(plaintext, WriterConfig::default())
}

/// Encode `plaintext` into an in-memory container
pub fn encode_with_config(plaintext: &[u8], config: WriterConfig) -> Result<Vec<u8>> {
    let mut writer = RpmsgWriter::with_config(Vec::new(), config)?;
    writer.write_all(plaintext)?;
    Ok(writer.finish()?)
}
