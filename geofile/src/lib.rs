//! # geofile - Bounding-Box Queries over Large Geo Files
//!
//! This crate answers bounding-box queries over line-oriented geo files
//! (GeoJSON lines or delimited text with coordinate columns) that may be far
//! larger than the memory available to the process.
//!
//! ## Features
//!
//! - **Single Pass Open**: the file is parsed once into a compact index of
//!   record boxes; record text stays on disk
//! - **Bounded Memory**: record bytes are read back through an LRU page
//!   cache that never holds more than the configured budget
//! - **Packed Hilbert R-Tree**: bulk-built index with subtree pruning
//! - **Stateless Cursors**: resumable pagination in ascending record order
//! - **Thread Safe**: one handle can serve concurrent queries
//! - **Index Cache**: optional sidecar file to skip parsing on reopen
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geofile::{GeoFile, GeoFileOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = GeoFileOptions::builder()
//!     .memory_budget(32 * 1024 * 1024)
//!     .index_cache("cities.csv.index")
//!     .build()?;
//! let file = GeoFile::open_with_options("cities.csv", options)?;
//!
//! for page in file.pages(&[5.0, 45.0, 15.0, 55.0], 500)? {
//!     for entry in page? {
//!         println!("{}", entry.as_str()?);
//!     }
//! }
//!
//! println!("{:?}", file.stats());
//! file.close();
//! # Ok(())
//! # }
//! ```

pub mod bounding_box;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod geo_file;
pub mod hilbert;
pub mod index;
pub mod page_store;
pub mod parser;
pub mod query;
pub mod types;

pub use bounding_box::BoundingBox;
pub use config::{Column, GeoFileOptions, GeoFileOptionsBuilder, SourceFormat};
pub use constants::CURSOR_END;
pub use geo_file::{GeoFile, Pages};
pub use query::{Entry, Page};
pub use types::{
    FormatError, GeoFileError, GeoFileResult, GeoFileStats, PageStoreStats, ParseReport,
    RecordId,
};
