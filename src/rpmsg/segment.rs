//! Segment framing
//!
//! After the magic prefix an rpmsg container is a sequence of segments. Each
//! segment is a 12-byte header followed by a compressed payload:
//!
//! ```text
//! +----------+-------------------+---------------------+-------------------+
//! | tag (4)  | original size (4) | compressed size (4) | payload ...       |
//! | A0 0F 00 | u32 little-endian | u32 little-endian   | compressed size   |
//! | 00       |                   |                     | bytes             |
//! +----------+-------------------+---------------------+-------------------+
//! ```
//!
//! The payloads are consecutive fragments of one zlib stream. [`SegmentReader`]
//! strips the framing and yields the fragments as a single byte stream.

use super::read_full;
use crate::error::{duplicate_io, Error, Result};
use std::io::{self, Read};
use tracing::trace;

/// Tag at the start of every segment header
pub const SEGMENT_TAG: [u8; 4] = [0xA0, 0x0F, 0x00, 0x00];

/// Length of a segment header in bytes
pub const SEGMENT_HEADER_LEN: usize = 12;

/// Decoded segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Number of bytes the payload contributes to the decompressed stream
    pub original_size: u32,
    /// Number of payload bytes following the header
    pub compressed_size: u32,
}

impl SegmentHeader {
    /// Parse a header, checking the tag
    ///
    /// `index` is only used to label the error.
    pub fn parse(bytes: &[u8; SEGMENT_HEADER_LEN], index: u64) -> Result<Self> {
        if bytes[0..4] != SEGMENT_TAG {
            return Err(Error::invalid_segment(
                index,
                &format!(
                    "tag {:02x?} does not match expected {:02x?}",
                    &bytes[0..4],
                    SEGMENT_TAG
                ),
            ));
        }
        let original_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let compressed_size = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        Ok(Self {
            original_size,
            compressed_size,
        })
    }

    /// Serialize the header including the tag
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_LEN] {
        let mut out = [0u8; SEGMENT_HEADER_LEN];
        out[0..4].copy_from_slice(&SEGMENT_TAG);
        out[4..8].copy_from_slice(&self.original_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.compressed_size.to_le_bytes());
        out
    }
}

/// Reads segments and exposes their payloads as one byte stream
///
/// Payload bytes that do not fit into the caller's buffer are kept and handed
/// out by the next call. A read keeps pulling segments until the buffer is
/// full or the source is exhausted at a header boundary.
///
/// If a read fails after some bytes were already copied into the caller's
/// buffer, those bytes are returned and the failure is reported by the next
/// call. A failure is terminal: every later read reports it again.
#[derive(Debug)]
pub(crate) struct SegmentReader<R> {
    inner: R,
    /// Payload of the current segment
    buf: Vec<u8>,
    /// Bytes of `buf` already handed out
    pos: usize,
    /// Sum of the original sizes of all segments read so far
    expected: u64,
    segments: u64,
    max_segment_size: u32,
    /// First failure, replayed by every later read
    failure: Option<io::Error>,
}

impl<R: Read> SegmentReader<R> {
    pub(crate) fn new(inner: R, max_segment_size: u32) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
            expected: 0,
            segments: 0,
            max_segment_size,
            failure: None,
        }
    }

    /// Sum of the original sizes declared by the segments read so far
    pub(crate) fn expected_size(&self) -> u64 {
        self.expected
    }

    /// Number of segments read so far
    pub(crate) fn segments_read(&self) -> u64 {
        self.segments
    }

    /// Load the next segment into the buffer
    ///
    /// Returns `Ok(false)` when the source is exhausted exactly at a header
    /// boundary, the only legitimate end of a container.
    fn read_segment(&mut self) -> io::Result<bool> {
        let index = self.segments;
        let mut header = [0u8; SEGMENT_HEADER_LEN];
        let n = read_full(&mut self.inner, &mut header)?;
        if n == 0 {
            trace!(segments = index, "end of segments");
            return Ok(false);
        }
        if n < SEGMENT_HEADER_LEN {
            return Err(Error::invalid_segment(
                index,
                &format!(
                    "truncated header: got {} of {} bytes",
                    n, SEGMENT_HEADER_LEN
                ),
            )
            .into());
        }

        let header = SegmentHeader::parse(&header, index)?;
        if header.compressed_size > self.max_segment_size {
            return Err(Error::invalid_segment(
                index,
                &format!(
                    "compressed size {} exceeds limit of {} bytes",
                    header.compressed_size, self.max_segment_size
                ),
            )
            .into());
        }
        self.expected += u64::from(header.original_size);

        self.buf.clear();
        self.buf.resize(header.compressed_size as usize, 0);
        self.pos = 0;
        self.inner.read_exact(&mut self.buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                Error::invalid_segment(
                    index,
                    &format!(
                        "truncated payload: expected {} bytes",
                        header.compressed_size
                    ),
                )
                .into()
            } else {
                e
            }
        })?;

        self.segments += 1;
        trace!(
            segment = index,
            original_size = header.original_size,
            compressed_size = header.compressed_size,
            "read segment"
        );
        Ok(true)
    }
}

impl<R: Read> Read for SegmentReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = &self.failure {
            return Err(duplicate_io(err));
        }

        let mut copied = 0;
        while copied < out.len() {
            let available = &self.buf[self.pos..];
            if !available.is_empty() {
                let n = available.len().min(out.len() - copied);
                out[copied..copied + n].copy_from_slice(&available[..n]);
                self.pos += n;
                copied += n;
                continue;
            }

            match self.read_segment() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    let report = duplicate_io(&e);
                    self.failure = Some(e);
                    if copied == 0 {
                        return Err(report);
                    }
                    break;
                }
            }
        }
        Ok(copied)
    }
}
