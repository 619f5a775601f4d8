//! High-level indexing API, the primary embedding surface.
//!
//! ```no_run
//! use lzindex::indexer::create_index;
//! use lzindex::index::load_index;
//!
//! let summary = create_index("access.log.lzo")?;
//! println!("{} blocks -> {}", summary.index.len(), summary.index_path.display());
//!
//! let index = load_index("access.log.lzo.index")?;
//! assert_eq!(index, summary.index);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! An index file is published only when the scan reaches the end-of-stream
//! sentinel.  It is written to a temporary file next to the source and renamed
//! into place, so readers never observe a partial index.  A failed run also
//! removes any index left over from an earlier run for the same source.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::format::VersionGate;
use crate::header::Header;
use crate::index::{load_index, BlockIndex};
use crate::scanner::BlockScanner;

/// Suffix appended to the source file name.
pub const DEFAULT_INDEX_SUFFIX: &str = ".index";

/// Mode of published index files.  Applied as is; the umask plays no part.
#[cfg(unix)]
pub const INDEX_FILE_MODE: u32 = 0o644;

// ── IndexOptions ──────────────────────────────────────────────────────────────

/// Configuration for [`create_index_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// Which version drives the optional header fields.
    pub gate: VersionGate,
    /// Appended to the full source file name to name the index file.
    pub suffix: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self { gate: VersionGate::Declared, suffix: DEFAULT_INDEX_SUFFIX.to_owned() }
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// A fully scanned stream.
#[derive(Debug, Clone)]
pub struct IndexedStream {
    pub header: Header,
    pub index: BlockIndex,
    /// Offset of the end-of-stream sentinel.
    pub sentinel_offset: u64,
}

/// Outcome of [`create_index_with`].
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub source: PathBuf,
    pub index_path: PathBuf,
    pub header: Header,
    pub index: BlockIndex,
}

// ── Operations ────────────────────────────────────────────────────────────────

/// Parse the header and scan every block of `reader`, which must be at
/// offset 0.
///
/// The scanner seeks once per block, so pass an unbuffered reader such as a
/// `File`.
pub fn index_stream<R: Read + Seek>(mut reader: R, gate: VersionGate) -> Result<IndexedStream> {
    let header = Header::read(&mut reader, gate)?;
    let mut scanner = BlockScanner::new(&mut reader, header.checksum_counts());
    scanner.scan_to_end()?;
    let sentinel_offset = scanner.position().unwrap_or(header.encoded_len() as u64);
    let index = BlockIndex::new(scanner.into_offsets());
    Ok(IndexedStream { header, index, sentinel_offset })
}

/// `a.lzo` → `a.lzo.index` (for the default suffix).
pub fn index_path_for<P: AsRef<Path>>(source: P, suffix: &str) -> PathBuf {
    let mut name: OsString = source.as_ref().as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn create_index<P: AsRef<Path>>(source: P) -> Result<IndexSummary> {
    create_index_with(source, &IndexOptions::default())
}

/// Index `source` and write `<source><suffix>`, replacing any existing file.
pub fn create_index_with<P: AsRef<Path>>(source: P, opts: &IndexOptions) -> Result<IndexSummary> {
    let source = source.as_ref();
    let index_path = index_path_for(source, &opts.suffix);

    match build_and_publish(source, &index_path, opts) {
        Ok(summary) => {
            info!(
                "indexed {}: {} block(s) -> {}",
                source.display(),
                summary.index.len(),
                index_path.display()
            );
            Ok(summary)
        }
        Err(e) => {
            warn!("indexing {} failed: {e}", source.display());
            discard_stale(&index_path);
            Err(e)
        }
    }
}

/// Rescan `source` and compare against its existing index file.
pub fn verify_index<P: AsRef<Path>>(source: P, opts: &IndexOptions) -> Result<bool> {
    let source = source.as_ref();
    let on_disk = load_index(index_path_for(source, &opts.suffix))?;
    let fresh = index_stream(File::open(source)?, opts.gate)?.index;
    if on_disk != fresh {
        warn!(
            "{}: index has {} entries, scan found {} block(s)",
            source.display(),
            on_disk.len(),
            fresh.len()
        );
    }
    Ok(on_disk == fresh)
}

/// Index several files.  Each file gets its own stream, so with the
/// `parallel` feature they are processed concurrently.
pub fn index_many(sources: &[PathBuf], opts: &IndexOptions) -> Vec<(PathBuf, Result<IndexSummary>)> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        sources
            .par_iter()
            .map(|src| (src.clone(), create_index_with(src, opts)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        sources
            .iter()
            .map(|src| (src.clone(), create_index_with(src, opts)))
            .collect()
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn build_and_publish(source: &Path, index_path: &Path, opts: &IndexOptions) -> Result<IndexSummary> {
    let stream = index_stream(File::open(source)?, opts.gate)?;
    publish(&stream.index, index_path)?;
    Ok(IndexSummary {
        source: source.to_owned(),
        index_path: index_path.to_owned(),
        header: stream.header,
        index: stream.index,
    })
}

fn publish(index: &BlockIndex, index_path: &Path) -> Result<()> {
    let dir = match index_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        index.write(&mut w)?;
        w.flush()?;
    }
    // Temp files are created owner-only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file().set_permissions(fs::Permissions::from_mode(INDEX_FILE_MODE))?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(index_path).map_err(|e| e.error)?;
    Ok(())
}

fn discard_stale(index_path: &Path) {
    match fs::remove_file(index_path) {
        Ok(()) => warn!("removed stale index {}", index_path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove stale index {}: {e}", index_path.display()),
    }
}
