//! Block index file: one 8-byte big-endian absolute offset per block, in
//! block order.  No header, footer, separators or length prefix.  An archive
//! with no blocks has a zero-byte index.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use crate::error::{LzopError, Result};

/// Bytes per index entry.
pub const ENTRY_SIZE: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockIndex {
    offsets: Vec<u64>,
}

impl BlockIndex {
    pub fn new(offsets: Vec<u64>) -> Self {
        Self { offsets }
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn get(&self, block: usize) -> Option<u64> {
        self.offsets.get(block).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.offsets.iter().copied()
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        self.offsets.len() * ENTRY_SIZE
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for &offset in &self.offsets {
            writer.write_u64::<BigEndian>(offset)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        for &offset in &self.offsets {
            out.extend_from_slice(&offset.to_be_bytes());
        }
        out
    }

    /// Read entries until end of stream.  A trailing partial entry is an
    /// error.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % ENTRY_SIZE != 0 {
            return Err(LzopError::TruncatedIndex { len: bytes.len() as u64 });
        }
        let mut cur = bytes;
        let mut offsets = Vec::with_capacity(bytes.len() / ENTRY_SIZE);
        while !cur.is_empty() {
            offsets.push(cur.read_u64::<BigEndian>()?);
        }
        Ok(Self { offsets })
    }

    /// Position `source` at the size fields of block `block`.  `None` when the
    /// index has no such block.
    pub fn seek_to_block<S: Seek>(&self, source: &mut S, block: usize) -> io::Result<Option<u64>> {
        match self.get(block) {
            Some(offset) => source.seek(SeekFrom::Start(offset)).map(Some),
            None => Ok(None),
        }
    }

    /// Index of the last block starting at or before `offset`.
    pub fn block_at(&self, offset: u64) -> Option<usize> {
        match self.offsets.binary_search(&offset) {
            Ok(i) => Some(i),
            Err(0) => None,
            Err(i) => Some(i - 1),
        }
    }
}

impl From<Vec<u64>> for BlockIndex {
    fn from(offsets: Vec<u64>) -> Self {
        Self::new(offsets)
    }
}

/// Read an index file from disk.
pub fn load_index<P: AsRef<Path>>(path: P) -> Result<BlockIndex> {
    BlockIndex::read(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_index_is_zero_bytes() {
        let idx = BlockIndex::default();
        let mut out = Vec::new();
        idx.write(&mut out).unwrap();
        assert!(out.is_empty());
        assert!(idx.to_bytes().is_empty());
    }

    #[test]
    fn entries_are_big_endian_u64() {
        let idx = BlockIndex::new(vec![0x3a, 0x0102_0304_0506]);
        let mut out = Vec::new();
        idx.write(&mut out).unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(&out[..8], &[0, 0, 0, 0, 0, 0, 0, 0x3a]);
        assert_eq!(&out[8..], &[0, 0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(out, idx.to_bytes());
        assert_eq!(BlockIndex::read(Cursor::new(out)).unwrap(), idx);
    }

    #[test]
    fn partial_entry_rejected() {
        let err = BlockIndex::from_bytes(&[0u8; 12]).unwrap_err();
        assert!(matches!(err, LzopError::TruncatedIndex { len: 12 }));
    }

    #[test]
    fn block_lookup() {
        let idx = BlockIndex::new(vec![40, 100, 300]);
        assert_eq!(idx.block_at(10), None);
        assert_eq!(idx.block_at(40), Some(0));
        assert_eq!(idx.block_at(299), Some(1));
        assert_eq!(idx.block_at(10_000), Some(2));

        let mut cur = Cursor::new(vec![0u8; 400]);
        assert_eq!(idx.seek_to_block(&mut cur, 2).unwrap(), Some(300));
        assert_eq!(cur.position(), 300);
        assert_eq!(idx.seek_to_block(&mut cur, 3).unwrap(), None);
    }
}
