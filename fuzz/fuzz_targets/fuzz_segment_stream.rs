#![no_main]

use libfuzzer_sys::arbitrary::{Arbitrary, Result, Unstructured};
use libfuzzer_sys::fuzz_target;
use librms::rpmsg::{self, SegmentHeader, MAGIC_PREFIX};
use std::io::Read;

#[derive(Debug)]
struct FuzzContainer {
    segments: Vec<(u32, Vec<u8>)>,
    read_size: usize,
}

impl<'a> Arbitrary<'a> for FuzzContainer {
    fn arbitrary(u: &mut Unstructured<'a>) -> Result<Self> {
        // Well-formed framing with arbitrary payloads, so the fuzzer spends
        // its time in the decompression and length checks
        let count = u.int_in_range(0..=16)?;
        let mut segments = Vec::with_capacity(count);
        for _ in 0..count {
            let original = u.int_in_range(0..=8192)?;
            let len = u.int_in_range(0..=512)?;
            segments.push((original, u.bytes(len)?.to_vec()));
        }
        let read_size = u.int_in_range(1..=4096)?;
        Ok(FuzzContainer { segments, read_size })
    }
}

fuzz_target!(|input: FuzzContainer| {
    let mut data = MAGIC_PREFIX.to_vec();
    for (original, payload) in &input.segments {
        let header = SegmentHeader {
            original_size: *original,
            compressed_size: payload.len() as u32,
        };
        data.extend_from_slice(&header.to_bytes());
        data.extend_from_slice(payload);
    }

    let Ok(mut reader) = rpmsg::decode(data.as_slice()) else {
        panic!("well-formed magic was rejected");
    };
    let mut buf = vec![0u8; input.read_size];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                assert_eq!(reader.bytes_produced(), reader.expected_size());
                break;
            }
            Ok(n) => assert!(n <= buf.len()),
            Err(_) => break,
        }
    }
});
