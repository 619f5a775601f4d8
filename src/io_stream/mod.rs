//! Checksumming tee over a byte stream.
//!
//! The lzop header checksum covers every header byte after the magic, and the
//! algorithm is only known once the flags word has been read.  [`ChecksumReader`]
//! therefore feeds every consumed byte into both a CRC-32 and an Adler-32
//! accumulator; the parser picks one at the end.
//!
//! The accumulators belong to one reader and one parse.  `reset()` is the only
//! way to restart them.  The wrapper does no buffering of its own, so the inner
//! stream position always equals the number of bytes handed out.

use std::io::{self, Read};

use adler2::Adler32;
use crc32fast::Hasher;

use crate::format::ChecksumKind;

pub struct ChecksumReader<R> {
    inner: R,
    crc32: Hasher,
    adler32: Adler32,
    consumed: u64,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, crc32: Hasher::new(), adler32: Adler32::new(), consumed: 0 }
    }

    /// Restart both accumulators.  The byte count keeps running.
    pub fn reset(&mut self) {
        self.crc32.reset();
        self.adler32 = Adler32::new();
    }

    pub fn crc32(&self) -> u32 {
        self.crc32.clone().finalize()
    }

    pub fn adler32(&self) -> u32 {
        self.adler32.checksum()
    }

    /// Running value of the requested algorithm.
    pub fn sum(&self, kind: ChecksumKind) -> u32 {
        match kind {
            ChecksumKind::Crc32 => self.crc32(),
            ChecksumKind::Adler32 => self.adler32(),
        }
    }

    /// Bytes handed out since construction.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Fill as much of `buf` as the stream allows; returns the count.  Unlike
    /// `read_exact` a short stream is not an error.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.crc32.update(&buf[..n]);
        self.adler32.write_slice(&buf[..n]);
        self.consumed += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn tee_matches_one_shot_checksums() {
        let data = b"lzop header bytes";
        let mut r = ChecksumReader::new(Cursor::new(&data[..]));
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(r.crc32(), crc32fast::hash(data));
        assert_eq!(r.adler32(), adler2::adler32_slice(data));
        assert_eq!(r.consumed(), data.len() as u64);
    }

    #[test]
    fn reset_restarts_both_sums() {
        let mut r = ChecksumReader::new(Cursor::new(b"skipped|kept".to_vec()));
        let mut head = [0u8; 8];
        r.read_exact(&mut head).unwrap();
        r.reset();
        let mut tail = [0u8; 4];
        r.read_exact(&mut tail).unwrap();
        assert_eq!(r.sum(ChecksumKind::Crc32), crc32fast::hash(b"kept"));
        assert_eq!(r.sum(ChecksumKind::Adler32), adler2::adler32_slice(b"kept"));
        assert_eq!(r.consumed(), 12);
    }

    #[test]
    fn empty_stream_checksums() {
        let r = ChecksumReader::new(Cursor::new(Vec::new()));
        assert_eq!(r.adler32(), 1);
        assert_eq!(r.crc32(), 0);
    }

    #[test]
    fn read_up_to_stops_at_eof() {
        let mut r = ChecksumReader::new(Cursor::new(vec![1u8, 2, 3]));
        let mut buf = [0u8; 9];
        assert_eq!(r.read_up_to(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }
}
