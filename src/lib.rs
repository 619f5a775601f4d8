pub mod format;
pub mod error;
pub mod io_stream;
pub mod header;
pub mod block;
pub mod scanner;
pub mod index;
pub mod indexer;

pub use error::{ErrorClass, LzopError, Result};
pub use format::{ChecksumCounts, VersionGate};
pub use header::Header;
pub use block::{BlockEntry, BlockSizes};
pub use scanner::{BlockScanner, ScanCondition, ScanState};
pub use index::{BlockIndex, load_index};
pub use indexer::{create_index, create_index_with, index_stream, IndexOptions, IndexSummary};
