//! Error types for rpmsg decoding and license handling
//!
//! All errors carry an error code so callers and logs can categorize failures
//! without matching on message text.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O and serialization errors
//! - **E2xxx**: Container format errors
//! - **E3xxx**: Content key errors
//! - **E4xxx**: License and licensing-service errors
//!
//! ## Common Error Codes
//!
//! - `E1001`: I/O error reading the source
//! - `E1002`: JSON encoding or decoding error
//! - `E2001`: Magic prefix mismatch
//! - `E2002`: Corrupt segment framing
//! - `E2003`: Decompressed length disagrees with the declared total
//! - `E2004`: Malformed compressed data
//! - `E3001`: Unsupported key algorithm
//! - `E3002`: Unsupported cipher mode
//! - `E3003`: Invalid key material
//! - `E3004`: Missing key descriptor field
//! - `E4001`: Invalid license document
//! - `E4002`: Licensing service request failed
//!
//! # Errors from `Read` implementations
//!
//! The container readers implement [`std::io::Read`], so their failures travel
//! as [`std::io::Error`]. The typed [`Error`] is kept as the payload and
//! [`Error::from`] recovers it:
//!
//! ```no_run
//! use librms::{rpmsg, Error};
//! use std::io::Read;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = std::fs::File::open("message.rpmsg")?;
//! let mut reader = rpmsg::decode(file)?;
//! let mut out = Vec::new();
//! if let Err(e) = reader.read_to_end(&mut out) {
//!     match Error::from(e) {
//!         Error::Truncated { expected, actual } => {
//!             eprintln!("stream ended after {actual} of {expected} bytes");
//!         }
//!         other => return Err(other.into()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::io;
use thiserror::Error;

/// Result type for rpmsg and license operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when decoding containers or decrypting content
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred while reading the underlying source
    ///
    /// **Error Code**: E1001
    ///
    /// **Common Causes**:
    /// - File not found
    /// - Insufficient permissions
    /// - The source was closed or cancelled mid-read
    #[error("[E1001] I/O error: {0}")]
    Io(#[source] io::Error),

    /// JSON error while decoding or encoding a license document
    ///
    /// **Error Code**: E1002
    #[error("[E1002] JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source does not start with the rpmsg magic prefix
    ///
    /// **Error Code**: E2001
    ///
    /// **Common Causes**:
    /// - The file is not an rpmsg attachment
    /// - The file was already decoded into a compound file
    /// - The file is shorter than the prefix
    #[error("[E2001] Invalid rpmsg magic prefix: {0}")]
    InvalidMagic(String),

    /// A segment header or payload is malformed
    ///
    /// **Error Code**: E2002
    ///
    /// **Common Causes**:
    /// - Segment tag does not match the expected constant
    /// - The source ended inside a segment header or payload
    /// - A segment declares a payload larger than the configured limit
    #[error("[E2002] Invalid segment: {0}")]
    InvalidSegment(String),

    /// The decompressed stream length disagrees with the declared total
    ///
    /// **Error Code**: E2003
    ///
    /// Raised when the inner compressed stream finishes (or is cut off) before
    /// producing the sum of the original sizes declared by every segment.
    #[error("[E2003] Truncated stream: expected {expected} decompressed bytes, got {actual}")]
    Truncated {
        /// Sum of the original sizes declared by all segments
        expected: u64,
        /// Bytes actually produced by the decompressor
        actual: u64,
    },

    /// The compressed stream carried by the segments is invalid
    ///
    /// **Error Code**: E2004
    ///
    /// **Common Causes**:
    /// - Bad zlib header
    /// - Corrupt deflate blocks or checksum
    #[error("[E2004] Decompression error: {0}")]
    Decompression(String),

    /// The key descriptor names an algorithm other than AES
    ///
    /// **Error Code**: E3001
    #[error("[E3001] Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key descriptor names a cipher mode other than the vendor ECB mode
    ///
    /// **Error Code**: E3002
    #[error("[E3002] Unsupported cipher mode: {0}")]
    UnsupportedCipherMode(String),

    /// The key value is not valid base64 or its size does not match
    ///
    /// **Error Code**: E3003
    ///
    /// **Common Causes**:
    /// - Key value is not standard base64
    /// - Decoded key is not 16, 24 or 32 bytes long
    /// - Declared size differs from the cipher block size
    #[error("[E3003] Invalid key material: {0}")]
    KeyMaterial(String),

    /// A field required for decryption is absent
    ///
    /// **Error Code**: E3004
    #[error("[E3004] Missing required field: {0}")]
    MissingField(&'static str),

    /// The license document is unusable
    ///
    /// **Error Code**: E4001
    ///
    /// **Common Causes**:
    /// - Publishing license lacks an XML prologue
    #[error("[E4001] Invalid license: {0}")]
    InvalidLicense(String),

    /// Request to the licensing service failed
    ///
    /// **Error Code**: E4002
    ///
    /// **Common Causes**:
    /// - Expired or missing access token
    /// - The service rejected the publishing license
    /// - Network or TLS failure
    #[error("[E4002] Licensing service error: {0}")]
    Http(String),
}

impl From<io::Error> for Error {
    /// Unwraps an [`Error`] that was carried through an [`io::Error`], and wraps
    /// any other I/O failure as [`Error::Io`].
    fn from(err: io::Error) -> Self {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(typed)) => *typed,
            Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
            None => Error::Io(io::Error::from(kind)),
        }
    }
}

impl From<Error> for io::Error {
    /// Wraps an [`Error`] so it can be returned from a `Read` implementation.
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => {
                let kind = match other {
                    Error::Truncated { .. } => io::ErrorKind::UnexpectedEof,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

/// Copy an error returned from a `Read` implementation
///
/// A typed [`Error`] payload is duplicated so [`Error::from`] still recovers
/// the same variant from the copy.
pub(crate) fn duplicate_io(err: &io::Error) -> io::Error {
    match err.get_ref().and_then(|inner| inner.downcast_ref::<Error>()) {
        Some(typed) => typed.duplicate().into(),
        None => io::Error::new(err.kind(), err.to_string()),
    }
}

#[cfg(feature = "client")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl Error {
    /// Create an InvalidSegment error naming the segment it occurred in
    ///
    /// # Arguments
    /// * `index` - Zero-based index of the segment being read
    /// * `message` - Description of the problem
    pub fn invalid_segment(index: u64, message: &str) -> Self {
        Error::InvalidSegment(format!("segment {}: {}", index, message))
    }

    /// Copy of this error for reporting the same failure again
    ///
    /// Wrapped I/O and JSON errors keep their kind and message but lose their
    /// source chain.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Error::Io(inner) => Error::Io(io::Error::new(inner.kind(), inner.to_string())),
            Error::Json(inner) => Error::Json(serde::de::Error::custom(inner.to_string())),
            Error::InvalidMagic(m) => Error::InvalidMagic(m.clone()),
            Error::InvalidSegment(m) => Error::InvalidSegment(m.clone()),
            Error::Truncated { expected, actual } => Error::Truncated {
                expected: *expected,
                actual: *actual,
            },
            Error::Decompression(m) => Error::Decompression(m.clone()),
            Error::UnsupportedAlgorithm(m) => Error::UnsupportedAlgorithm(m.clone()),
            Error::UnsupportedCipherMode(m) => Error::UnsupportedCipherMode(m.clone()),
            Error::KeyMaterial(m) => Error::KeyMaterial(m.clone()),
            Error::MissingField(field) => Error::MissingField(*field),
            Error::InvalidLicense(m) => Error::InvalidLicense(m.clone()),
            Error::Http(m) => Error::Http(m.clone()),
        }
    }

    /// Returns true for container format errors (magic or segment framing)
    pub fn is_format_error(&self) -> bool {
        matches!(self, Error::InvalidMagic(_) | Error::InvalidSegment(_))
    }

    /// Returns true when the decompressed length disagreed with the declared total
    pub fn is_truncation(&self) -> bool {
        matches!(self, Error::Truncated { .. })
    }
}
