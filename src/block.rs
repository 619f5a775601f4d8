use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{LzopError, Result};
use crate::format::{ChecksumCounts, BLOCK_SIZES_LEN, CHECKSUM_FIELD_LEN};

/// `dst_len` value that terminates the block sequence.
pub const SENTINEL: u32 = 0;

/// The two size fields that open every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSizes {
    /// Decompressed payload length.
    pub dst_len: u32,
    /// Compressed (on-disk) payload length.
    pub src_len: u32,
}

impl BlockSizes {
    /// A block whose payload is carried verbatim.
    pub fn is_stored(&self) -> bool {
        self.dst_len == self.src_len
    }

    /// A block never expands and never has an empty payload.
    pub fn validate(&self, offset: u64) -> Result<()> {
        if self.src_len == 0 || self.src_len > self.dst_len {
            return Err(LzopError::DataCorruption {
                offset,
                dst_len: self.dst_len,
                src_len: self.src_len,
            });
        }
        Ok(())
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(self.dst_len)?;
        writer.write_u32::<BigEndian>(self.src_len)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            dst_len: reader.read_u32::<BigEndian>()?,
            src_len: reader.read_u32::<BigEndian>()?,
        })
    }
}

/// One block located by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    /// Absolute offset of the block's `dst_len` field.
    pub offset: u64,
    pub dst_len: u32,
    pub src_len: u32,
    /// 4-byte checksum fields between the size fields and the payload.
    pub checksum_fields: u32,
}

impl BlockEntry {
    pub fn new(offset: u64, sizes: BlockSizes, counts: ChecksumCounts) -> Self {
        Self {
            offset,
            dst_len: sizes.dst_len,
            src_len: sizes.src_len,
            checksum_fields: counts.fields_for(sizes.is_stored()),
        }
    }

    pub fn stored(&self) -> bool {
        self.dst_len == self.src_len
    }

    /// First payload byte.
    pub fn payload_offset(&self) -> u64 {
        self.offset + BLOCK_SIZES_LEN + CHECKSUM_FIELD_LEN * u64::from(self.checksum_fields)
    }

    /// Where the following block (or the sentinel) starts.
    pub fn next_offset(&self) -> u64 {
        self.payload_offset() + u64::from(self.src_len)
    }
}

/// Write one block with `payload` as its on-disk bytes.  Checksum fields are
/// opaque to this crate and written as zeros.
pub fn write_block<W: Write>(
    mut writer: W,
    dst_len: u32,
    payload: &[u8],
    counts: ChecksumCounts,
) -> io::Result<()> {
    let sizes = BlockSizes { dst_len, src_len: payload.len() as u32 };
    sizes.write(&mut writer)?;
    for _ in 0..counts.fields_for(sizes.is_stored()) {
        writer.write_u32::<BigEndian>(0)?;
    }
    writer.write_all(payload)
}

/// Terminate a block sequence.
pub fn write_sentinel<W: Write>(mut writer: W) -> io::Result<()> {
    writer.write_u32::<BigEndian>(SENTINEL)
}
