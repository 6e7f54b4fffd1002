//! Decompression layer over the segment stream

use super::segment::SegmentReader;
use crate::error::{duplicate_io, Error};
use flate2::read::ZlibDecoder;
use std::io::{self, Read};
use tracing::debug;

/// Length of the header that opens every zlib stream
const ZLIB_HEADER_LEN: u64 = 2;

/// Decoded view of an rpmsg container
///
/// Returned by [`decode`](super::decode). Reading yields the inner compound
/// file. The stream only ends cleanly when the decompressed length equals the
/// sum of the original sizes declared by every segment; any disagreement is
/// reported as [`Error::Truncated`].
///
/// Like the segment layer, bytes produced before a failure are returned first
/// and the failure is reported by the following call. Failures are terminal:
/// once reported, every later read reports the same error again and the
/// reader never becomes finished.
#[derive(Debug)]
pub struct InflateReader<R: Read> {
    /// Segment stream waiting for the first read
    framer: Option<SegmentReader<R>>,
    /// Started on the first read
    decoder: Option<ZlibDecoder<SegmentReader<R>>>,
    produced: u64,
    finished: bool,
    /// First failure, replayed by every later read
    failure: Option<io::Error>,
}

impl<R: Read> InflateReader<R> {
    pub(crate) fn new(framer: SegmentReader<R>) -> Self {
        Self {
            framer: Some(framer),
            decoder: None,
            produced: 0,
            finished: false,
            failure: None,
        }
    }

    /// Decompressed bytes produced so far
    pub fn bytes_produced(&self) -> u64 {
        self.produced
    }

    /// Sum of the original sizes declared by the segments read so far
    ///
    /// Once the reader reports end of stream this is the declared total of
    /// the whole container.
    pub fn expected_size(&self) -> u64 {
        self.segments().map_or(0, SegmentReader::expected_size)
    }

    /// Number of segments consumed so far
    pub fn segments_read(&self) -> u64 {
        self.segments().map_or(0, SegmentReader::segments_read)
    }

    /// Returns true once the stream ended cleanly
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn segments(&self) -> Option<&SegmentReader<R>> {
        match (&self.framer, &self.decoder) {
            (Some(framer), _) => Some(framer),
            (None, Some(decoder)) => Some(decoder.get_ref()),
            (None, None) => None,
        }
    }

    fn decoder(&mut self) -> &mut ZlibDecoder<SegmentReader<R>> {
        match (self.framer.take(), &mut self.decoder) {
            (Some(framer), decoder) => {
                debug!("starting zlib decoder");
                decoder.insert(ZlibDecoder::new(framer))
            }
            (None, Some(decoder)) => decoder,
            (None, None) => unreachable!("InflateReader holds either a framer or a decoder"),
        }
    }

    /// Validate the produced length once the decompressor stops
    ///
    /// A stream that never got past the zlib header is a decompression
    /// error. Segments left after the end of the compressed stream still
    /// count towards the declared total, so they are drained first.
    fn finish(&mut self) -> io::Result<()> {
        if self.decoder().total_in() < ZLIB_HEADER_LEN {
            return Err(Error::Decompression("missing zlib header".to_string()).into());
        }
        io::copy(self.decoder().get_mut(), &mut io::sink())?;

        let expected = self.expected_size();
        if self.produced != expected {
            return Err(Error::Truncated {
                expected,
                actual: self.produced,
            }
            .into());
        }

        self.finished = true;
        debug!(
            bytes = self.produced,
            segments = self.segments_read(),
            "rpmsg stream complete"
        );
        Ok(())
    }
}

/// Returns true when the error was raised by this crate rather than the decompressor
fn is_typed(err: &io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<Error>())
}

impl<R: Read> Read for InflateReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = &self.failure {
            return Err(duplicate_io(err));
        }
        if self.finished || buf.is_empty() {
            return Ok(0);
        }

        let mut filled = 0;
        let outcome = loop {
            if filled == buf.len() {
                break Ok(());
            }
            match self.decoder().read(&mut buf[filled..]) {
                Ok(0) => break self.finish(),
                Ok(n) => {
                    filled += n;
                    self.produced += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_typed(&e) => break Err(e),
                // Source ran dry inside the compressed stream
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break self.finish(),
                Err(e) => break Err(Error::Decompression(e.to_string()).into()),
            }
        };

        match outcome {
            Ok(()) => Ok(filled),
            Err(e) => {
                let report = duplicate_io(&e);
                self.failure = Some(e);
                if filled == 0 {
                    return Err(report);
                }
                Ok(filled)
            }
        }
    }
}
