//! Core types shared across the crate.
//!
//! This module defines:
//! - Error types and result types
//! - Records and their storage references
//! - Per-record format errors and the parse report
//! - Statistics structures

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::bounding_box::BoundingBox;
use crate::constants::FORMAT_ERROR_SAMPLE;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while opening or querying a geo file
#[derive(Debug, Error)]
pub enum GeoFileError {
    /// The source file cannot be opened or is structurally unreadable.
    /// Fatal: no handle is produced.
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Malformed query argument. Fatal to that call only.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Read failure while resolving bytes from the source file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The index cache file could not be decoded or does not match the source.
    #[error("Index cache error: {0}")]
    IndexCache(String),

    #[error("Geo file is closed")]
    Closed,
}

impl GeoFileError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        GeoFileError::Open {
            path: path.into(),
            source,
        }
    }

    /// Open error for a file that exists but cannot be interpreted.
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GeoFileError::Open {
            path: path.into(),
            source: io::Error::new(io::ErrorKind::InvalidData, reason.into()),
        }
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        GeoFileError::InvalidArgument(msg.into())
    }
}

/// Result type for geo file operations
pub type GeoFileResult<T> = Result<T, GeoFileError>;

// ============================================================================
// Records
// ============================================================================

/// Ordinal of a record in file-scan order
pub type RecordId = u64;

/// Location of a record's bytes in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRef {
    pub offset: u64,
    pub length: u32,
}

/// A parsed record: its id, bounding box and where its payload lives.
///
/// The payload itself is not kept; it is re-read through the page store when
/// the record is returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub bbox: BoundingBox,
    pub storage: StorageRef,
}

// ============================================================================
// Format errors
// ============================================================================

/// A single malformed line. Recoverable: the line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("line {line} (offset {offset}): {message}")]
pub struct FormatError {
    /// 1-based physical line number
    pub line: u64,
    /// Byte offset of the line in the source file
    pub offset: u64,
    pub message: String,
}

/// Outcome of parsing a source file.
///
/// Holds the number of accepted records, the number of skipped lines and a
/// bounded sample of the format errors that caused them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    pub records: u64,
    pub skipped: u64,
    pub samples: Vec<FormatError>,
}

impl ParseReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a skipped line, keeping it verbatim while the sample has room.
    /// Returns true when the error was sampled.
    pub fn push_error(&mut self, error: FormatError) -> bool {
        self.skipped += 1;
        if self.samples.len() < FORMAT_ERROR_SAMPLE {
            self.samples.push(error);
            true
        } else {
            false
        }
    }

    pub fn has_errors(&self) -> bool {
        self.skipped > 0
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Page store counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStoreStats {
    pub memory_budget: u64,
    pub frame_size: u64,
    pub resident_frames: u64,
    pub resident_bytes: u64,
    pub peak_resident_bytes: u64,
    pub frame_hits: u64,
    pub frame_misses: u64,
    pub frames_evicted: u64,
    pub disk_reads: u64,
    pub bytes_read: u64,
}

/// Statistics about an open geo file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoFileStats {
    pub records: u64,
    pub skipped_lines: u64,
    pub index_nodes: u64,
    pub index_height: u32,
    pub node_reads: u64,
    pub queries: u64,
    pub page_store: PageStoreStats,
}
