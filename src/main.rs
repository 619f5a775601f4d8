use clap::{Parser, Subcommand};
use lzindex::format::{flag_names, ChecksumCounts, HeaderLayout, VersionGate};
use lzindex::indexer::{index_many, index_path_for, verify_index, IndexOptions, DEFAULT_INDEX_SUFFIX};
use lzindex::{load_index, BlockScanner, Header};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lzindex", about = "Build and inspect block indexes for lzop files")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Lay out every header as the newest revision, like the reference indexer
    #[arg(long, global = true)]
    reference_gating: bool,
    /// Index file suffix
    #[arg(long, global = true, default_value = DEFAULT_INDEX_SUFFIX)]
    suffix: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write <INPUT><suffix> for each input
    Index {
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Show the decoded container header
    Info {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List every block with its sizes
    Blocks {
        input: PathBuf,
    },
    /// Print the offsets stored in an index file
    Dump {
        index: PathBuf,
    },
    /// Check that an existing index matches a fresh scan
    Verify {
        input: PathBuf,
    },
}

#[derive(Serialize)]
struct HeaderReport {
    format_version: String,
    library_version: String,
    version_needed: Option<String>,
    method: u8,
    level: Option<u8>,
    flags: Vec<&'static str>,
    filter: Option<u32>,
    mode: String,
    modified: String,
    name: String,
    header_checksum: String,
    checksum_counts: ChecksumCounts,
    layout: HeaderLayout,
    header_len: usize,
}

impl From<&Header> for HeaderReport {
    fn from(h: &Header) -> Self {
        HeaderReport {
            format_version:  format!("{:#06x}", h.format_version),
            library_version: format!("{:#06x}", h.library_version),
            version_needed:  h.version_needed.map(|v| format!("{v:#06x}")),
            method:          h.method,
            level:           h.level,
            flags:           flag_names(h.flags),
            filter:          h.filter,
            mode:            format!("{:o}", h.mode),
            modified:        h.modified().to_rfc3339(),
            name:            h.name_lossy().into_owned(),
            header_checksum: format!("{:#010x}", h.header_checksum),
            checksum_counts: h.checksum_counts(),
            layout:          h.layout,
            header_len:      h.encoded_len(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let opts = IndexOptions {
        gate:   if cli.reference_gating { VersionGate::Reference } else { VersionGate::Declared },
        suffix: cli.suffix,
    };

    match cli.command {

        // ── Index ────────────────────────────────────────────────────────────
        Commands::Index { input } => {
            let mut failed = false;
            for (path, result) in index_many(&input, &opts) {
                match result {
                    Ok(s) => println!("  indexed  {} ({} blocks) -> {}",
                        path.display(), s.index.len(), s.index_path.display()),
                    Err(e) => {
                        failed = true;
                        eprintln!("  failed   {}: {e}", path.display());
                    }
                }
            }
            return Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS });
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let header = Header::read(BufReader::new(File::open(&input)?), opts.gate)?;
            let report = HeaderReport::from(&header);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("── lzop header ──────────────────────────────────────────");
                println!("  Path            {}", input.display());
                println!("  Format version  {}", report.format_version);
                println!("  Library version {}", report.library_version);
                if let Some(v) = &report.version_needed {
                    println!("  Version needed  {v}");
                }
                println!("  Method          {}", report.method);
                if let Some(l) = report.level {
                    println!("  Level           {l}");
                }
                println!("  Flags           {}", report.flags.join(" "));
                if let Some(f) = report.filter {
                    println!("  Filter          {f}");
                }
                println!("  Mode            {}", report.mode);
                println!("  Modified        {}", report.modified);
                println!("  Name            {}", report.name);
                println!("  Header checksum {} ({:?})", report.header_checksum, header.checksum_kind());
                println!("  Header length   {} B", report.header_len);
            }
        }

        // ── Blocks ───────────────────────────────────────────────────────────
        Commands::Blocks { input } => {
            let mut reader = File::open(&input)?;
            let header = Header::read(&mut reader, opts.gate)?;
            println!("{:>14} {:>10} {:>10} {:>10}  Checksums", "Offset", "Dst", "Src", "Kind");
            let mut count = 0usize;
            for entry in BlockScanner::new(&mut reader, header.checksum_counts()) {
                let entry = entry?;
                let kind = if entry.stored() { "stored" } else { "lzo" };
                println!("{:>14} {:>10} {:>10} {:>10}  {}",
                    entry.offset, entry.dst_len, entry.src_len, kind, entry.checksum_fields);
                count += 1;
            }
            println!("{count} block(s)");
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { index } => {
            for (i, offset) in load_index(&index)?.iter().enumerate() {
                println!("{i:>8}  {offset}");
            }
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input } => {
            let index_path = index_path_for(&input, &opts.suffix);
            if verify_index(&input, &opts)? {
                println!("OK        {}", index_path.display());
            } else {
                println!("MISMATCH  {}", index_path.display());
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
