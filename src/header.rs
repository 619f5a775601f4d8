//! lzop container header: parse and serialize.
//!
//! ```text
//! magic(9) version(2) lib_version(2) [version_needed(2)] method(1) [level(1)]
//! flags(4) [filter(4)] mode(4) mtime_low(4) [mtime_high(4)]
//! name_len(1) name(name_len) header_checksum(4)
//! ```
//!
//! Bracketed fields depend on the format revision (see
//! [`crate::format::VERSION_RULES`]) or, for `filter`, on `F_H_FILTER`.  The
//! checksum covers every byte between the magic and the checksum field.

use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::time::SystemTime;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};

use crate::error::{LzopError, Result};
use crate::format::{
    ChecksumCounts, ChecksumKind, HeaderLayout, VersionGate, EXTENDED_HEADER_VERSION, F_H_FILTER,
    MAGIC, MIN_VERSION,
};
use crate::io_stream::ChecksumReader;

/// `M_LZO1X_1`, the method lzop writes by default.
pub const DEFAULT_METHOD: u8 = 1;
/// Regular file, rw-r--r--.
pub const DEFAULT_MODE: u32 = 0o100644;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format_version: u16,
    pub library_version: u16,
    pub version_needed: Option<u16>,
    pub method: u8,
    pub level: Option<u8>,
    pub flags: u32,
    pub filter: Option<u32>,
    pub mode: u32,
    pub mod_time: u32,
    pub mod_time_high: Option<u32>,
    pub name: Vec<u8>,
    pub header_checksum: u32,
    /// Optional-field presence this header was parsed (or will be written) with.
    pub layout: HeaderLayout,
}

impl Header {
    /// A header in the layout `format_version` declares, with lzop's usual
    /// defaults for everything else.  `header_checksum` is filled by
    /// [`Header::write`].
    pub fn new(format_version: u16, flags: u32) -> Self {
        let layout = HeaderLayout::resolve(format_version);
        Self {
            format_version,
            library_version: format_version,
            version_needed: layout.version_needed.then_some(EXTENDED_HEADER_VERSION),
            method: DEFAULT_METHOD,
            level: layout.level.then_some(5),
            flags,
            filter: (flags & F_H_FILTER != 0).then_some(0),
            mode: DEFAULT_MODE,
            mod_time: 0,
            mod_time_high: layout.mod_time_high.then_some(0),
            name: Vec::new(),
            header_checksum: 0,
            layout,
        }
    }

    /// Parse a header from a stream positioned at offset 0.
    ///
    /// Reads strictly sequentially and leaves `reader` immediately after the
    /// header checksum.  Fails with a format-class [`LzopError`] when the
    /// bytes are not an acceptable header.
    pub fn read<R: Read>(reader: R, gate: VersionGate) -> Result<Self> {
        let mut r = ChecksumReader::new(reader);

        let mut magic = [0u8; MAGIC.len()];
        if r.read_up_to(&mut magic)? != MAGIC.len() || magic != MAGIC {
            return Err(LzopError::BadMagic);
        }
        r.reset();

        let format_version = r.read_u16::<BigEndian>()?;
        let gating = gate.gating_version(format_version);
        if gating < MIN_VERSION {
            return Err(LzopError::UnsupportedVersion(format_version));
        }
        let layout = HeaderLayout::resolve(gating);
        debug!("format version {format_version:#06x}, gating on {gating:#06x}: {layout:?}");

        let library_version = r.read_u16::<BigEndian>()?;
        let version_needed = if layout.version_needed {
            let needed = r.read_u16::<BigEndian>()?;
            if needed > format_version {
                return Err(LzopError::IncompatibleVersion { needed, format: format_version });
            }
            if needed < MIN_VERSION {
                return Err(LzopError::InvalidVersionNeeded(needed));
            }
            Some(needed)
        } else {
            None
        };

        let method = r.read_u8()?;
        let level = if layout.level { Some(r.read_u8()?) } else { None };

        let flags = r.read_u32::<BigEndian>()?;
        let filter = if flags & F_H_FILTER != 0 { Some(r.read_u32::<BigEndian>()?) } else { None };

        let mode = r.read_u32::<BigEndian>()?;
        let mod_time = r.read_u32::<BigEndian>()?;
        let mod_time_high =
            if layout.mod_time_high { Some(r.read_u32::<BigEndian>()?) } else { None };

        let name_len = r.read_u8()?;
        let mut name = vec![0u8; name_len as usize];
        r.read_exact(&mut name)?;

        let kind = ChecksumKind::for_flags(flags);
        let actual = r.sum(kind);
        let header_checksum = r.read_u32::<BigEndian>()?;
        r.reset();
        if header_checksum != actual {
            return Err(LzopError::HeaderChecksum { expected: header_checksum, actual });
        }
        if method == 0 {
            return Err(LzopError::IncompatibleMethod(method));
        }

        let header = Self {
            format_version,
            library_version,
            version_needed,
            method,
            level,
            flags,
            filter,
            mode,
            mod_time,
            mod_time_high,
            name,
            header_checksum,
            layout,
        };
        info!(
            "lzop header: version {:#06x}, method {}, flags {:#x}, name '{}', {} bytes",
            header.format_version,
            header.method,
            header.flags,
            header.name_lossy(),
            r.consumed()
        );
        Ok(header)
    }

    /// Serialize in `self.layout`, computing the checksum with the algorithm
    /// the flags select.  Returns the checksum written.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<u32> {
        let body = self.body_bytes()?;
        let checksum = match self.checksum_kind() {
            ChecksumKind::Crc32 => crc32fast::hash(&body),
            ChecksumKind::Adler32 => adler2::adler32_slice(&body),
        };
        writer.write_all(&MAGIC)?;
        writer.write_all(&body)?;
        writer.write_u32::<BigEndian>(checksum)?;
        Ok(checksum)
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write(&mut out)?;
        Ok(out)
    }

    fn body_bytes(&self) -> io::Result<Vec<u8>> {
        if self.name.len() > u8::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("name is {} bytes, at most 255 fit", self.name.len()),
            ));
        }
        let mut w = Vec::with_capacity(self.encoded_len());
        w.write_u16::<BigEndian>(self.format_version)?;
        w.write_u16::<BigEndian>(self.library_version)?;
        if self.layout.version_needed {
            w.write_u16::<BigEndian>(self.version_needed.unwrap_or(MIN_VERSION))?;
        }
        w.write_u8(self.method)?;
        if self.layout.level {
            w.write_u8(self.level.unwrap_or(0))?;
        }
        w.write_u32::<BigEndian>(self.flags)?;
        if self.flags & F_H_FILTER != 0 {
            w.write_u32::<BigEndian>(self.filter.unwrap_or(0))?;
        }
        w.write_u32::<BigEndian>(self.mode)?;
        w.write_u32::<BigEndian>(self.mod_time)?;
        if self.layout.mod_time_high {
            w.write_u32::<BigEndian>(self.mod_time_high.unwrap_or(0))?;
        }
        w.write_u8(self.name.len() as u8)?;
        w.write_all(&self.name)?;
        Ok(w)
    }

    /// Size of the serialized header, magic and checksum included.  This is
    /// also the offset of the first block.
    pub fn encoded_len(&self) -> usize {
        let opt = |present: bool, len: usize| if present { len } else { 0 };
        MAGIC.len()
            + 2
            + 2
            + opt(self.layout.version_needed, 2)
            + 1
            + opt(self.layout.level, 1)
            + 4
            + opt(self.flags & F_H_FILTER != 0, 4)
            + 4
            + 4
            + opt(self.layout.mod_time_high, 4)
            + 1
            + self.name.len()
            + 4
    }

    pub fn checksum_counts(&self) -> ChecksumCounts {
        ChecksumCounts::from_flags(self.flags)
    }

    pub fn checksum_kind(&self) -> ChecksumKind {
        ChecksumKind::for_flags(self.flags)
    }

    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Modification time of the original file.  The epoch when the format
    /// revision gives the stored time no meaning, or it is out of range.
    pub fn modified(&self) -> DateTime<Utc> {
        let epoch = DateTime::<Utc>::from(SystemTime::UNIX_EPOCH);
        if !self.layout.mod_time_defined {
            return epoch;
        }
        let secs = (u64::from(self.mod_time_high.unwrap_or(0)) << 32) | u64::from(self.mod_time);
        i64::try_from(secs)
            .ok()
            .and_then(|s| Utc.timestamp_opt(s, 0).single())
            .unwrap_or(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{F_ADLER32_D, F_CRC32_C, F_H_CRC32, REFERENCE_VERSION};
    use crate::error::ErrorClass;
    use std::io::Cursor;

    fn sample(version: u16, flags: u32) -> Header {
        let mut h = Header::new(version, flags);
        h.name = b"notes.txt".to_vec();
        h.mod_time = 1_700_000_000;
        h
    }

    fn parse(bytes: &[u8], gate: VersionGate) -> Result<Header> {
        Header::read(Cursor::new(bytes), gate)
    }

    #[test]
    fn parses_current_layout() {
        let h = sample(REFERENCE_VERSION, F_ADLER32_D);
        let bytes = h.to_bytes().unwrap();
        assert_eq!(bytes.len(), h.encoded_len());

        let mut cur = Cursor::new(&bytes[..]);
        let parsed = Header::read(&mut cur, VersionGate::Declared).unwrap();
        assert_eq!(cur.position() as usize, bytes.len());
        assert_eq!(parsed.name, b"notes.txt");
        assert_eq!(parsed.version_needed, Some(EXTENDED_HEADER_VERSION));
        assert_eq!(parsed.level, Some(5));
        assert_eq!(parsed.mod_time_high, Some(0));
        assert_eq!(parsed.header_checksum, adler2::adler32_slice(&bytes[9..bytes.len() - 4]));
        assert_eq!(parsed.checksum_counts(), ChecksumCounts { decompressed: 1, compressed: 0 });
        assert_eq!(parsed.modified().timestamp(), 1_700_000_000);
    }

    #[test]
    fn crc32_header_checksum() {
        let h = sample(REFERENCE_VERSION, F_H_CRC32 | F_CRC32_C);
        let bytes = h.to_bytes().unwrap();
        let parsed = parse(&bytes, VersionGate::Declared).unwrap();
        assert_eq!(parsed.header_checksum, crc32fast::hash(&bytes[9..bytes.len() - 4]));
        assert_eq!(parsed.checksum_kind(), ChecksumKind::Crc32);
    }

    #[test]
    fn wrong_algorithm_is_rejected() {
        // Adler-32 value stored but the flags ask for CRC-32.
        let h = sample(REFERENCE_VERSION, F_H_CRC32);
        let mut bytes = h.to_bytes().unwrap();
        let n = bytes.len();
        let adler = adler2::adler32_slice(&bytes[9..n - 4]);
        bytes[n - 4..].copy_from_slice(&adler.to_be_bytes());
        let err = parse(&bytes, VersionGate::Declared).unwrap_err();
        assert!(matches!(err, LzopError::HeaderChecksum { .. }));
    }

    #[test]
    fn bad_magic_in_every_position() {
        let good = sample(REFERENCE_VERSION, 0).to_bytes().unwrap();
        for i in 0..MAGIC.len() {
            let mut bytes = good.clone();
            bytes[i] ^= 0x01;
            let err = parse(&bytes, VersionGate::Declared).unwrap_err();
            assert!(matches!(err, LzopError::BadMagic), "byte {i}");
        }
    }

    #[test]
    fn short_stream_is_bad_magic() {
        assert!(matches!(parse(&[], VersionGate::Declared), Err(LzopError::BadMagic)));
        assert!(matches!(parse(&MAGIC[..4], VersionGate::Declared), Err(LzopError::BadMagic)));
    }

    #[test]
    fn truncated_after_magic_is_io() {
        let good = sample(REFERENCE_VERSION, 0).to_bytes().unwrap();
        let err = parse(&good[..20], VersionGate::Declared).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Io);
    }

    #[test]
    fn checksum_mismatch() {
        let mut bytes = sample(REFERENCE_VERSION, 0).to_bytes().unwrap();
        let n = bytes.len();
        bytes[n - 1] ^= 0xff;
        assert!(matches!(
            parse(&bytes, VersionGate::Declared),
            Err(LzopError::HeaderChecksum { .. })
        ));
    }

    #[test]
    fn method_zero_is_incompatible() {
        let mut h = sample(REFERENCE_VERSION, 0);
        h.method = 0;
        let bytes = h.to_bytes().unwrap();
        assert!(matches!(
            parse(&bytes, VersionGate::Declared),
            Err(LzopError::IncompatibleMethod(0))
        ));
    }

    #[test]
    fn version_needed_bounds() {
        let mut h = sample(REFERENCE_VERSION, 0);
        h.version_needed = Some(REFERENCE_VERSION + 1);
        let err = parse(&h.to_bytes().unwrap(), VersionGate::Declared).unwrap_err();
        assert!(matches!(err, LzopError::IncompatibleVersion { .. }));

        h.version_needed = Some(0x0800);
        let err = parse(&h.to_bytes().unwrap(), VersionGate::Declared).unwrap_err();
        assert!(matches!(err, LzopError::InvalidVersionNeeded(0x0800)));
    }

    #[test]
    fn old_version_rejected_only_when_declared() {
        let mut h = sample(REFERENCE_VERSION, 0);
        h.format_version = 0x0800;
        let bytes = h.to_bytes().unwrap();
        assert!(matches!(
            parse(&bytes, VersionGate::Declared),
            Err(LzopError::UnsupportedVersion(0x0800))
        ));
        // The reference build never rejects here; it then fails on version_needed.
        assert!(matches!(
            parse(&bytes, VersionGate::Reference),
            Err(LzopError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn pre_extended_layout_depends_on_gate() {
        let h = sample(0x0930, 0);
        assert!(!h.layout.level);
        let bytes = h.to_bytes().unwrap();

        let parsed = parse(&bytes, VersionGate::Declared).unwrap();
        assert_eq!(parsed.version_needed, None);
        assert_eq!(parsed.level, None);
        assert_eq!(parsed.mod_time_high, None);
        assert_eq!(parsed.name, b"notes.txt");

        // Parsed as the newest layout, the same bytes are misread.
        assert!(parse(&bytes, VersionGate::Reference).is_err());
    }

    #[test]
    fn filter_id_is_consumed() {
        let mut h = sample(REFERENCE_VERSION, F_H_FILTER);
        h.filter = Some(0x0000_0102);
        let bytes = h.to_bytes().unwrap();
        let parsed = parse(&bytes, VersionGate::Declared).unwrap();
        assert_eq!(parsed.filter, Some(0x0102));
        assert_eq!(bytes.len(), h.encoded_len());
    }

    #[test]
    fn high_mod_time_word() {
        let mut h = sample(REFERENCE_VERSION, 0);
        h.mod_time = 5;
        h.mod_time_high = Some(1);
        let parsed = parse(&h.to_bytes().unwrap(), VersionGate::Declared).unwrap();
        assert_eq!(parsed.modified().timestamp(), (1i64 << 32) + 5);
    }

    #[test]
    fn undefined_mod_time_is_epoch() {
        let mut h = sample(REFERENCE_VERSION, 0);
        h.layout.mod_time_defined = false;
        assert_eq!(h.modified().timestamp(), 0);
    }

    #[test]
    fn oversized_name_refused_on_write() {
        let mut h = sample(REFERENCE_VERSION, 0);
        h.name = vec![b'x'; 256];
        assert!(h.to_bytes().is_err());
    }
}
