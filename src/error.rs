use std::io;
use thiserror::Error;

use crate::scanner::ScanCondition;

/// Coarse category of an [`LzopError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The container header is not an acceptable lzop header.
    Format,
    /// The block sequence (or an index file) is structurally impossible.
    Corruption,
    /// The underlying stream failed.
    Io,
}

#[derive(Error, Debug)]
pub enum LzopError {
    #[error("invalid header: bad magic")]
    BadMagic,
    #[error("invalid header: unsupported format version {0:#06x}")]
    UnsupportedVersion(u16),
    #[error("incompatible version: {needed:#06x} needed, format is {format:#06x}")]
    IncompatibleVersion { needed: u16, format: u16 },
    #[error("invalid header: needed version {0:#06x} below minimum")]
    InvalidVersionNeeded(u16),
    #[error("invalid header: checksum mismatch (stored {expected:#010x}, computed {actual:#010x})")]
    HeaderChecksum { expected: u32, actual: u32 },
    #[error("incompatible method {0}")]
    IncompatibleMethod(u8),
    #[error("data corruption at offset {offset}: src_len {src_len}, dst_len {dst_len}")]
    DataCorruption { offset: u64, dst_len: u32, src_len: u32 },
    #[error("index file length {len} is not a multiple of 8")]
    TruncatedIndex { len: u64 },
    #[error("scan already halted ({0:?})")]
    ScanHalted(ScanCondition),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl LzopError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LzopError::BadMagic
            | LzopError::UnsupportedVersion(_)
            | LzopError::IncompatibleVersion { .. }
            | LzopError::InvalidVersionNeeded(_)
            | LzopError::HeaderChecksum { .. }
            | LzopError::IncompatibleMethod(_) => ErrorClass::Format,
            LzopError::DataCorruption { .. } | LzopError::TruncatedIndex { .. } => {
                ErrorClass::Corruption
            }
            LzopError::ScanHalted(ScanCondition::Io) => ErrorClass::Io,
            LzopError::ScanHalted(_) => ErrorClass::Corruption,
            LzopError::Io(_) => ErrorClass::Io,
        }
    }

    pub fn is_format(&self) -> bool {
        self.class() == ErrorClass::Format
    }

    pub fn is_corruption(&self) -> bool {
        self.class() == ErrorClass::Corruption
    }
}

pub type Result<T> = std::result::Result<T, LzopError>;
