//! Constants shared by the page store, parser and spatial index.

/// Default frame size (64KB) - one page store load
pub const DEFAULT_FRAME_SIZE: usize = 64 * 1024;

/// Smallest accepted frame size
pub const MIN_FRAME_SIZE: usize = 512;

/// Default memory budget for resident frames (64MB)
pub const DEFAULT_MEMORY_BUDGET: usize = 64 * 1024 * 1024;

/// Default maximum number of entries/children per index node
pub const DEFAULT_NODE_CAPACITY: usize = 64;

/// Smallest branching factor that still forms a tree
pub const MIN_NODE_CAPACITY: usize = 2;

/// Hilbert curve order used when ordering records for bulk construction
pub const HILBERT_ORDER: u32 = 16;

/// Number of format errors kept verbatim in a parse report
pub const FORMAT_ERROR_SAMPLE: usize = 16;

/// Number of lines handed to the parse workers at once
pub const PARSE_BATCH_LINES: usize = 8192;

/// Batches smaller than this are parsed on the calling thread
pub const PARALLEL_PARSE_THRESHOLD: usize = 512;

/// Cursor value returned when a query has no further results
pub const CURSOR_END: i64 = -1;

/// Magic number for index cache files
pub const MAGIC: u32 = 0x4745_4F49; // "GEOI"

/// Index cache format version
pub const VERSION: u32 = 2;

/// Bytes hashed from each end of the source to fingerprint it for the index cache
pub const FINGERPRINT_BYTES: usize = 64 * 1024;
