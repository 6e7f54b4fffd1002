//! Integration tests for rpmsg container decoding

use flate2::write::ZlibEncoder;
use flate2::Compression;
use librms::rpmsg::{self, SegmentHeader, WriterConfig, MAGIC_PREFIX, SEGMENT_HEADER_LEN};
use librms::Error;
use std::io::{Cursor, Read, Write};

/// Compress `plaintext` into one zlib stream
fn zlib(plaintext: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(plaintext).unwrap();
    encoder.finish().unwrap()
}

/// Build a container by hand: the compressed stream is cut into `chunk`-byte
/// payloads and the original sizes are spread across the segments.
fn synthetic_container(plaintext: &[u8], chunk: usize) -> Vec<u8> {
    let compressed = zlib(plaintext);
    let payloads: Vec<&[u8]> = compressed.chunks(chunk).collect();
    let per_segment = plaintext.len() / payloads.len();

    let mut out = MAGIC_PREFIX.to_vec();
    let mut remaining = plaintext.len();
    for (i, payload) in payloads.iter().enumerate() {
        let original = if i + 1 == payloads.len() {
            remaining
        } else {
            per_segment
        };
        remaining -= original;
        let header = SegmentHeader {
            original_size: original as u32,
            compressed_size: payload.len() as u32,
        };
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(payload);
    }
    out
}

fn sample_plaintext() -> Vec<u8> {
    // Compound files start with this signature
    let mut data = vec![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    let mut state = 0x2545_F491u32;
    for _ in 0..20_000 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        data.push((state >> 24) as u8);
    }
    data
}

/// Sum of the declared original sizes, walking the framing directly
fn declared_total(container: &[u8]) -> u64 {
    let mut rest = &container[MAGIC_PREFIX.len()..];
    let mut total = 0u64;
    let mut index = 0;
    while !rest.is_empty() {
        let mut header = [0u8; SEGMENT_HEADER_LEN];
        header.copy_from_slice(&rest[..SEGMENT_HEADER_LEN]);
        let parsed = SegmentHeader::parse(&header, index).unwrap();
        total += u64::from(parsed.original_size);
        rest = &rest[SEGMENT_HEADER_LEN + parsed.compressed_size as usize..];
        index += 1;
    }
    total
}

/// Read the whole stream with a fixed-size destination buffer
fn read_in_steps<R: Read>(reader: &mut R, step: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; step];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        assert!(n <= step);
        out.extend_from_slice(&buf[..n]);
    }
    out
}

#[test]
fn test_synthetic_container_round_trip() {
    let plaintext = sample_plaintext();
    let container = synthetic_container(&plaintext, 97);

    let mut reader = rpmsg::decode(Cursor::new(container)).unwrap();
    let mut decoded = Vec::new();
    reader.read_to_end(&mut decoded).unwrap();

    assert_eq!(decoded, plaintext);
    assert!(reader.is_finished());
    assert!(reader.segments_read() > 1);
}

#[test]
fn test_writer_container_round_trip() {
    let plaintext = sample_plaintext();
    let config = WriterConfig::new().with_segment_size(1000).with_level(1);
    let container = rpmsg::encode_with_config(&plaintext, config).unwrap();
    assert_eq!(rpmsg::decode_to_vec(container.as_slice()).unwrap(), plaintext);
}

#[test]
fn test_output_length_equals_declared_total() {
    let plaintext = sample_plaintext();
    for container in [
        synthetic_container(&plaintext, 13),
        synthetic_container(&plaintext, 4096),
        rpmsg::encode(&plaintext).unwrap(),
    ] {
        let total = declared_total(&container);
        let mut reader = rpmsg::decode(container.as_slice()).unwrap();
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded.len() as u64, total);
        assert_eq!(reader.expected_size(), total);
        assert_eq!(reader.bytes_produced(), total);
    }
}

#[test]
fn test_small_destination_buffers() {
    let plaintext = sample_plaintext();
    let segment_size = 512;
    let config = WriterConfig::new().with_segment_size(segment_size);
    let container = rpmsg::encode_with_config(&plaintext, config).unwrap();

    for step in [1, 7, segment_size] {
        let mut reader = rpmsg::decode(container.as_slice()).unwrap();
        let decoded = read_in_steps(&mut reader, step);
        assert_eq!(decoded, plaintext, "buffer size {}", step);
    }
}

#[test]
fn test_one_byte_reads_return_exactly_one_byte() {
    let container = synthetic_container(b"abcdefghij", 3);
    let mut reader = rpmsg::decode(container.as_slice()).unwrap();
    let mut byte = [0u8; 1];
    for expected in b"abcdefghij" {
        assert_eq!(reader.read(&mut byte).unwrap(), 1);
        assert_eq!(byte[0], *expected);
    }
    assert_eq!(reader.read(&mut byte).unwrap(), 0);
}

#[test]
fn test_short_declared_stream_is_truncation() {
    let plaintext = sample_plaintext();
    let mut container = synthetic_container(&plaintext, 1 << 20);
    // Declare more plaintext than the zlib stream holds
    let declared = (plaintext.len() as u32 + 100).to_le_bytes();
    container[12..16].copy_from_slice(&declared);

    let mut reader = rpmsg::decode(container.as_slice()).unwrap();
    let mut decoded = Vec::new();
    let err = Error::from(reader.read_to_end(&mut decoded).unwrap_err());

    assert!(err.is_truncation(), "got {:?}", err);
    assert_eq!(decoded, plaintext);
    assert!(!reader.is_finished());
}

#[test]
fn test_empty_final_segment_is_truncation() {
    let plaintext = sample_plaintext();
    let config = WriterConfig::new().with_segment_size(4096).with_level(0);
    let container = rpmsg::encode_with_config(&plaintext, config).unwrap();

    // Keep the first segment, then declare the rest without carrying it
    let mut header = [0u8; SEGMENT_HEADER_LEN];
    header.copy_from_slice(&container[8..8 + SEGMENT_HEADER_LEN]);
    let first = SegmentHeader::parse(&header, 0).unwrap();
    let cut = 8 + SEGMENT_HEADER_LEN + first.compressed_size as usize;
    let mut damaged = container[..cut].to_vec();
    let rest = SegmentHeader {
        original_size: (plaintext.len() - 4096) as u32,
        compressed_size: 0,
    };
    damaged.extend_from_slice(&rest.to_bytes());

    let err = rpmsg::decode_to_vec(damaged.as_slice()).unwrap_err();
    match err {
        Error::Truncated { expected, actual } => {
            assert_eq!(expected, plaintext.len() as u64);
            assert_eq!(actual, 4096);
        }
        other => panic!("expected truncation, got {:?}", other),
    }
}

#[test]
fn test_cut_payload_is_format_error() {
    let container = synthetic_container(&sample_plaintext(), 256);
    let err = rpmsg::decode_to_vec(&container[..container.len() - 10]).unwrap_err();
    assert!(err.is_format_error(), "got {:?}", err);
}

#[test]
fn test_bad_magic_yields_no_bytes() {
    let mut container = synthetic_container(b"secret", 64);
    container[0] = 0x00;
    let err = rpmsg::decode(container.as_slice()).err().unwrap();
    assert!(matches!(err, Error::InvalidMagic(_)));
    assert!(err.is_format_error());
}

#[test]
fn test_empty_input_is_format_error() {
    let err = rpmsg::decode(&[0u8; 0][..]).err().unwrap();
    assert!(matches!(err, Error::InvalidMagic(_)));
}

#[test]
fn test_bad_segment_tag_yields_no_bytes() {
    let mut container = synthetic_container(b"secret message body", 64);
    container[MAGIC_PREFIX.len()] = 0xA1;

    let mut reader = rpmsg::decode(container.as_slice()).unwrap();
    let mut buf = [0u8; 64];
    let err = Error::from(reader.read(&mut buf).unwrap_err());
    assert!(matches!(err, Error::InvalidSegment(_)), "got {:?}", err);
    assert_eq!(reader.bytes_produced(), 0);
}

#[test]
fn test_partial_header_is_format_error() {
    let mut container = synthetic_container(b"body", 64);
    container.extend_from_slice(&[0xA0, 0x0F, 0x00]);
    let err = rpmsg::decode_to_vec(container.as_slice()).unwrap_err();
    assert!(matches!(err, Error::InvalidSegment(_)), "got {:?}", err);
}

/// Read until the first error, returning the bytes delivered before it
fn read_until_error<R: Read>(reader: &mut R, step: usize) -> (Vec<u8>, Error) {
    let mut out = Vec::new();
    let mut buf = vec![0u8; step];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => panic!("stream ended cleanly after {} bytes", out.len()),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) => return (out, Error::from(e)),
        }
    }
}

#[test]
fn test_framing_error_is_terminal() {
    let plaintext = sample_plaintext();
    let mut container = rpmsg::encode(&plaintext).unwrap();
    container.extend_from_slice(&[0xA0, 0x0F, 0x00]);

    let mut reader = rpmsg::decode(container.as_slice()).unwrap();
    let (decoded, err) = read_until_error(&mut reader, 4096);
    assert!(matches!(err, Error::InvalidSegment(_)), "got {:?}", err);
    assert!(plaintext.starts_with(&decoded));

    let mut buf = [0u8; 64];
    for _ in 0..3 {
        let again = Error::from(reader.read(&mut buf).unwrap_err());
        assert_eq!(again.to_string(), err.to_string());
    }
    assert!(!reader.is_finished());
}

#[test]
fn test_truncation_is_terminal() {
    let plaintext = sample_plaintext();
    let mut container = synthetic_container(&plaintext, 1 << 20);
    let declared = (plaintext.len() as u32 + 1).to_le_bytes();
    container[12..16].copy_from_slice(&declared);

    let mut reader = rpmsg::decode(container.as_slice()).unwrap();
    let (_, err) = read_until_error(&mut reader, 1000);
    assert!(err.is_truncation(), "got {:?}", err);

    let mut buf = [0u8; 64];
    for _ in 0..3 {
        let again = Error::from(reader.read(&mut buf).unwrap_err());
        assert!(again.is_truncation(), "got {:?}", again);
    }
    assert!(!reader.is_finished());
}

#[test]
fn test_decompression_error_is_terminal() {
    let plaintext = sample_plaintext();
    let config = WriterConfig::new().with_segment_size(4096);
    let mut container = rpmsg::encode_with_config(&plaintext, config).unwrap();
    // Flip a bit in the Adler-32 trailer of the last segment
    let last = container.len() - 1;
    container[last] ^= 0x01;

    let mut reader = rpmsg::decode(container.as_slice()).unwrap();
    let (decoded, err) = read_until_error(&mut reader, 512);
    assert!(matches!(err, Error::Decompression(_)), "got {:?}", err);
    assert!(plaintext.starts_with(&decoded));

    let mut buf = [0u8; 64];
    for _ in 0..3 {
        let again = Error::from(reader.read(&mut buf).unwrap_err());
        assert!(matches!(again, Error::Decompression(_)), "got {:?}", again);
    }
    assert!(!reader.is_finished());
}

#[test]
fn test_corrupt_later_segment_fails_after_earlier_bytes() {
    let plaintext = sample_plaintext();
    let config = WriterConfig::new().with_segment_size(4096).with_level(0);
    let mut container = rpmsg::encode_with_config(&plaintext, config).unwrap();

    // Break the tag of the second segment
    let mut header = [0u8; SEGMENT_HEADER_LEN];
    header.copy_from_slice(&container[8..8 + SEGMENT_HEADER_LEN]);
    let first = SegmentHeader::parse(&header, 0).unwrap();
    let second = 8 + SEGMENT_HEADER_LEN + first.compressed_size as usize;
    container[second] = 0x00;

    let mut reader = rpmsg::decode(container.as_slice()).unwrap();
    let (decoded, err) = read_until_error(&mut reader, 1024);
    assert!(!decoded.is_empty());
    assert!(plaintext.starts_with(&decoded));
    assert!(err.to_string().contains("segment 1"), "got {}", err);

    let mut buf = [0u8; 64];
    assert!(Error::from(reader.read(&mut buf).unwrap_err()).is_format_error());
}

#[test]
fn test_container_without_compressed_data_is_rejected() {
    let err = rpmsg::decode_to_vec(&MAGIC_PREFIX[..]).unwrap_err();
    assert!(matches!(err, Error::Decompression(_)), "got {:?}", err);

    let mut container = MAGIC_PREFIX.to_vec();
    let empty = SegmentHeader {
        original_size: 0,
        compressed_size: 0,
    };
    container.extend_from_slice(&empty.to_bytes());
    let err = rpmsg::decode_to_vec(container.as_slice()).unwrap_err();
    assert!(matches!(err, Error::Decompression(_)), "got {:?}", err);
}

#[test]
fn test_corrupt_compressed_data_is_decompression_error() {
    let header = SegmentHeader {
        original_size: 16,
        compressed_size: 8,
    };
    let mut container = MAGIC_PREFIX.to_vec();
    container.extend_from_slice(&header.to_bytes());
    container.extend_from_slice(&[0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);

    let err = rpmsg::decode_to_vec(container.as_slice()).unwrap_err();
    assert!(matches!(err, Error::Decompression(_)), "got {:?}", err);
}

#[test]
fn test_segment_size_limit() {
    let container = synthetic_container(&sample_plaintext(), 2048);
    let config = rpmsg::DecoderConfig::new().with_max_segment_size(1024);
    let mut reader = rpmsg::decode_with_config(container.as_slice(), config).unwrap();
    let mut decoded = Vec::new();
    let err = Error::from(reader.read_to_end(&mut decoded).unwrap_err());
    assert!(matches!(err, Error::InvalidSegment(_)), "got {:?}", err);
}

#[test]
fn test_decode_from_file() {
    let plaintext = sample_plaintext();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&rpmsg::encode(&plaintext).unwrap()).unwrap();
    file.flush().unwrap();

    let input = std::fs::File::open(file.path()).unwrap();
    let mut reader = rpmsg::decode(input).unwrap();
    let mut output = Vec::new();
    let written = std::io::copy(&mut reader, &mut output).unwrap();

    assert_eq!(written, plaintext.len() as u64);
    assert_eq!(output, plaintext);
}
