//! Block-boundary scanner: walk the block sequence that follows the header.
//!
//! # How it works
//!
//! Each block opens with two big-endian u32 size fields, followed by zero or
//! more 4-byte checksum fields and the payload:
//!
//! ```text
//! dst_len(4) src_len(4) [checksum(4) × n] payload(src_len)
//! ```
//!
//! The scanner reads the size fields, works out `n` from the header's
//! [`ChecksumCounts`] and whether the block is stored, records where the block
//! started and seeks straight past the payload.  Payloads are never read.
//! A `dst_len` of zero is the end-of-stream sentinel.
//!
//! ## Terminal conditions
//!
//! | Condition | Meaning |
//! |-----------|---------|
//! | `EndOfStream` | Sentinel reached; the offset list is complete |
//! | `Corruption` | `src_len` was 0 or larger than `dst_len` |
//! | `Io` | A read or seek failed (including a stream that ends early) |
//!
//! Every block costs one 8-byte read and one seek.  `BufReader` discards its
//! buffer on each seek, so hand the scanner the file itself.
//!
//! Once a terminal condition is reached the state is frozen.  Offsets
//! collected before a failure remain readable but do not form a usable index.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, trace};

use crate::block::{BlockEntry, BlockSizes, SENTINEL};
use crate::error::{LzopError, Result};
use crate::format::ChecksumCounts;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCondition {
    Running,
    /// Sentinel reached.  The only successful terminal.
    EndOfStream,
    Corruption,
    Io,
}

impl ScanCondition {
    pub fn is_terminal(self) -> bool {
        self != ScanCondition::Running
    }
}

/// Mutable state of one indexing pass.
#[derive(Debug, Clone)]
pub struct ScanState {
    pub counts: ChecksumCounts,
    offsets: Vec<u64>,
    condition: ScanCondition,
}

impl ScanState {
    pub fn new(counts: ChecksumCounts) -> Self {
        Self { counts, offsets: Vec::new(), condition: ScanCondition::Running }
    }

    /// Block-start offsets in block order.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn condition(&self) -> ScanCondition {
        self.condition
    }
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// Scans one stream.  Owns (or exclusively borrows) the reader, since every
/// step depends on its current position.
pub struct BlockScanner<R> {
    reader: R,
    state: ScanState,
    /// Offset of the next block once known.  Taken from the reader on the
    /// first step and advanced arithmetically after that.
    pos: Option<u64>,
}

impl<R: Read + Seek> BlockScanner<R> {
    /// `reader` must be positioned at the first block, i.e. just after the
    /// header.
    pub fn new(reader: R, counts: ChecksumCounts) -> Self {
        debug!(
            "scanning blocks: {} decompressed / {} compressed checksum field(s)",
            counts.decompressed, counts.compressed
        );
        Self { reader, state: ScanState::new(counts), pos: None }
    }

    /// Advance by one block.
    ///
    /// Returns the block found, or `None` once the sentinel has been read.
    /// After a failure every further call returns [`LzopError::ScanHalted`]
    /// without touching the stream.
    pub fn next_block(&mut self) -> Result<Option<BlockEntry>> {
        match self.state.condition {
            ScanCondition::Running => {}
            ScanCondition::EndOfStream => return Ok(None),
            halted => return Err(LzopError::ScanHalted(halted)),
        }
        let step = self.step();
        self.state.condition = match &step {
            Ok(Some(_)) => ScanCondition::Running,
            Ok(None) => ScanCondition::EndOfStream,
            Err(e) if e.is_corruption() => ScanCondition::Corruption,
            Err(_) => ScanCondition::Io,
        };
        step
    }

    fn step(&mut self) -> Result<Option<BlockEntry>> {
        let block_start = match self.pos {
            Some(p) => p,
            None => {
                let p = self.reader.stream_position()?;
                self.pos = Some(p);
                p
            }
        };

        let dst_len = self.reader.read_u32::<BigEndian>()?;
        if dst_len == SENTINEL {
            debug!("sentinel at offset {block_start}, {} block(s)", self.state.offsets.len());
            return Ok(None);
        }
        let src_len = self.reader.read_u32::<BigEndian>()?;
        let sizes = BlockSizes { dst_len, src_len };
        sizes.validate(block_start)?;

        let entry = BlockEntry::new(block_start, sizes, self.state.counts);
        self.state.offsets.push(block_start);
        trace!(
            "block {} at {}: dst_len={} src_len={} checksums={}",
            self.state.offsets.len() - 1,
            block_start,
            dst_len,
            src_len,
            entry.checksum_fields
        );

        self.reader.seek(SeekFrom::Start(entry.next_offset()))?;
        self.pos = Some(entry.next_offset());
        Ok(Some(entry))
    }

    /// Run to a terminal condition.  On success returns every block offset.
    pub fn scan_to_end(&mut self) -> Result<&[u64]> {
        while self.next_block()?.is_some() {}
        Ok(self.state.offsets())
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn offsets(&self) -> &[u64] {
        self.state.offsets()
    }

    pub fn condition(&self) -> ScanCondition {
        self.state.condition
    }

    /// Where the next block starts, or where the sentinel was found once the
    /// scan has ended.  `None` before the first step.
    pub fn position(&self) -> Option<u64> {
        self.pos
    }

    pub fn into_offsets(self) -> Vec<u64> {
        self.state.offsets
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> Iterator for BlockScanner<R> {
    type Item = Result<BlockEntry>;

    /// Yields each block, then the failure (if any) once, then stops.
    fn next(&mut self) -> Option<Self::Item> {
        if self.state.condition.is_terminal() {
            return None;
        }
        self.next_block().transpose()
    }
}
