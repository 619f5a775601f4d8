//! Frozen lzop container constants.
//!
//! Everything that the on-disk format fixes lives here: the signature, the
//! version floors, the header flag bits and the table describing which
//! optional header fields exist at which format revision.  Nothing in this
//! module is ever mutated at runtime.
//!
//! # Endianness
//! Every multi-byte integer in an lzop container is big-endian.

// ── Signature ────────────────────────────────────────────────────────────────

/// The 9-byte lzop signature that opens every container.
pub const MAGIC: [u8; 9] = [0x89, b'L', b'Z', b'O', 0x00, 0x0d, 0x0a, 0x1a, 0x0a];

// ── Versions ─────────────────────────────────────────────────────────────────

/// Oldest format (and needed-library) version accepted.
pub const MIN_VERSION: u16 = 0x0900;
/// Format revision that introduced the second library-version field, the
/// compression level byte and the high half of the modification time.
pub const EXTENDED_HEADER_VERSION: u16 = 0x0940;
/// Earliest revision with defined modification-time semantics.
pub const MOD_TIME_VERSION: u16 = 0x0120;
/// Version the reference indexer was built against.  Used for every layout
/// decision under [`VersionGate::Reference`].
pub const REFERENCE_VERSION: u16 = 0x1030;

// ── Header flags ─────────────────────────────────────────────────────────────

pub const F_ADLER32_D: u32 = 1 << 0;
pub const F_ADLER32_C: u32 = 1 << 1;
pub const F_STDIN: u32 = 1 << 2;
pub const F_STDOUT: u32 = 1 << 3;
pub const F_NAME_DEFAULT: u32 = 1 << 4;
pub const F_DOSISH: u32 = 1 << 5;
pub const F_H_EXTRA_FIELD: u32 = 1 << 6;
pub const F_H_GMTDIFF: u32 = 1 << 7;
pub const F_CRC32_D: u32 = 1 << 8;
pub const F_CRC32_C: u32 = 1 << 9;
pub const F_MULTIPART: u32 = 1 << 10;
/// A u32 filter id follows the flags word.
pub const F_H_FILTER: u32 = 1 << 11;
/// The header checksum is CRC-32 rather than Adler-32.
pub const F_H_CRC32: u32 = 1 << 12;
pub const F_H_PATH: u32 = 1 << 13;

const FLAG_NAMES: &[(u32, &str)] = &[
    (F_ADLER32_D, "ADLER32_D"),
    (F_ADLER32_C, "ADLER32_C"),
    (F_STDIN, "STDIN"),
    (F_STDOUT, "STDOUT"),
    (F_NAME_DEFAULT, "NAME_DEFAULT"),
    (F_DOSISH, "DOSISH"),
    (F_H_EXTRA_FIELD, "H_EXTRA_FIELD"),
    (F_H_GMTDIFF, "H_GMTDIFF"),
    (F_CRC32_D, "CRC32_D"),
    (F_CRC32_C, "CRC32_C"),
    (F_MULTIPART, "MULTIPART"),
    (F_H_FILTER, "H_FILTER"),
    (F_H_CRC32, "H_CRC32"),
    (F_H_PATH, "H_PATH"),
];

/// Names of the known bits set in `flags`, lowest bit first.
pub fn flag_names(flags: u32) -> Vec<&'static str> {
    FLAG_NAMES
        .iter()
        .filter(|(mask, _)| flags & mask != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Width of every per-block checksum field.
pub const CHECKSUM_FIELD_LEN: u64 = 4;
/// `dst_len` + `src_len`.
pub const BLOCK_SIZES_LEN: u64 = 8;

// ── Optional-field rules ─────────────────────────────────────────────────────

/// A header field whose presence depends on the format revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalField {
    /// Second u16 library-version field ("version needed to extract").
    VersionNeeded,
    /// One-byte compression level after the method.
    Level,
    /// High 32 bits of the modification time.
    ModTimeHigh,
    /// Whether the stored modification time means anything at all.
    ModTimeDefined,
}

/// `field` is present for every format version `>= since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRule {
    pub field: OptionalField,
    pub since: u16,
}

/// Ordered by position in the header.  Evaluated once per parse.
pub const VERSION_RULES: &[VersionRule] = &[
    VersionRule { field: OptionalField::VersionNeeded, since: EXTENDED_HEADER_VERSION },
    VersionRule { field: OptionalField::Level, since: EXTENDED_HEADER_VERSION },
    VersionRule { field: OptionalField::ModTimeDefined, since: MOD_TIME_VERSION },
    VersionRule { field: OptionalField::ModTimeHigh, since: EXTENDED_HEADER_VERSION },
];

/// Which version number drives the optional-field rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionGate {
    /// Gate on the `format_version` read from the stream.
    #[default]
    Declared,
    /// Gate on [`REFERENCE_VERSION`], as the reference indexer does.  Every
    /// input is then parsed as the newest layout regardless of what it declares.
    Reference,
}

impl VersionGate {
    /// The version the rule table is evaluated against.
    pub fn gating_version(self, declared: u16) -> u16 {
        match self {
            VersionGate::Declared => declared,
            VersionGate::Reference => REFERENCE_VERSION,
        }
    }
}

/// Resolved presence of every [`OptionalField`] for one header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct HeaderLayout {
    pub version_needed: bool,
    pub level: bool,
    pub mod_time_high: bool,
    pub mod_time_defined: bool,
}

impl HeaderLayout {
    /// Walk [`VERSION_RULES`] against `version`.
    pub fn resolve(version: u16) -> Self {
        let mut layout = HeaderLayout::default();
        for rule in VERSION_RULES {
            let present = version >= rule.since;
            match rule.field {
                OptionalField::VersionNeeded => layout.version_needed = present,
                OptionalField::Level => layout.level = present,
                OptionalField::ModTimeHigh => layout.mod_time_high = present,
                OptionalField::ModTimeDefined => layout.mod_time_defined = present,
            }
        }
        layout
    }
}

/// Number of 4-byte checksum fields each block carries, split by what they
/// cover.  Each is 0, 1 or 2 (Adler-32 and/or CRC-32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct ChecksumCounts {
    pub decompressed: u32,
    pub compressed: u32,
}

impl ChecksumCounts {
    pub fn from_flags(flags: u32) -> Self {
        let bit = |mask: u32| u32::from(flags & mask != 0);
        Self {
            decompressed: bit(F_ADLER32_D) + bit(F_CRC32_D),
            compressed: bit(F_ADLER32_C) + bit(F_CRC32_C),
        }
    }

    /// Checksum fields between the size fields and the payload of one block.
    /// A block stored verbatim also carries the compressed-data checksums.
    pub fn fields_for(self, stored: bool) -> u32 {
        self.decompressed + if stored { self.compressed } else { 0 }
    }
}

/// Algorithm protecting the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ChecksumKind {
    Adler32,
    Crc32,
}

impl ChecksumKind {
    pub fn for_flags(flags: u32) -> Self {
        if flags & F_H_CRC32 != 0 { ChecksumKind::Crc32 } else { ChecksumKind::Adler32 }
    }
}
