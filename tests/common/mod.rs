#![allow(dead_code)]

use lzindex::block::{write_block, write_sentinel};
use lzindex::format::{ChecksumCounts, REFERENCE_VERSION};
use lzindex::Header;

/// A header in the newest layout carrying `flags`, named like lzop would.
pub fn header(flags: u32) -> Header {
    let mut h = Header::new(REFERENCE_VERSION, flags);
    h.name = b"payload.bin".to_vec();
    h.mod_time = 1_600_000_000;
    h
}

/// Serialize `header` followed by one block per `(dst_len, src_len)` pair.
/// Payload bytes are filler; the scanner never looks at them.
pub fn archive(header: &Header, blocks: &[(u32, usize)], sentinel: bool) -> Vec<u8> {
    let counts = ChecksumCounts::from_flags(header.flags);
    let mut out = header.to_bytes().unwrap();
    for (i, &(dst, src)) in blocks.iter().enumerate() {
        write_block(&mut out, dst, &vec![i as u8; src], counts).unwrap();
    }
    if sentinel {
        write_sentinel(&mut out).unwrap();
    }
    out
}
