//! Options for opening a geo file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_FRAME_SIZE, DEFAULT_MEMORY_BUDGET, DEFAULT_NODE_CAPACITY, MIN_FRAME_SIZE,
    MIN_NODE_CAPACITY,
};
use crate::types::{GeoFileError, GeoFileResult};

/// Layout of the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceFormat {
    /// One GeoJSON Feature (or bare geometry) object per line
    GeoJsonLines,
    /// Header row followed by delimited rows with coordinate columns
    Delimited,
}

/// A coordinate column of a delimited file, by position or header name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    Index(usize),
    Name(String),
}

impl From<usize> for Column {
    fn from(index: usize) -> Self {
        Column::Index(index)
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::Name(name.to_string())
    }
}

/// Options for [`GeoFile::open_with_options`](crate::GeoFile::open_with_options).
///
/// Every field has a default; format, separator and columns are detected
/// from the file when left unset.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFileOptions {
    memory_budget: usize,
    frame_size: usize,
    node_capacity: usize,
    parse_workers: usize,
    format: Option<SourceFormat>,
    separator: Option<char>,
    x_column: Option<Column>,
    y_column: Option<Column>,
    index_cache: Option<PathBuf>,
}

impl Default for GeoFileOptions {
    fn default() -> Self {
        Self {
            memory_budget: DEFAULT_MEMORY_BUDGET,
            frame_size: DEFAULT_FRAME_SIZE,
            node_capacity: DEFAULT_NODE_CAPACITY,
            parse_workers: default_parse_workers(),
            format: None,
            separator: None,
            x_column: None,
            y_column: None,
            index_cache: None,
        }
    }
}

fn default_parse_workers() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(4)
        .max(1)
}

impl GeoFileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder starting from the defaults.
    #[inline]
    pub fn builder() -> GeoFileOptionsBuilder {
        GeoFileOptionsBuilder::new()
    }

    /// Defaults with the given memory budget.
    pub fn with_memory_budget(memory_budget: usize) -> Self {
        Self {
            memory_budget,
            ..Self::default()
        }
    }

    /// Upper bound, in bytes, for resident page store frames
    pub fn memory_budget(&self) -> usize {
        self.memory_budget
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Maximum entries per leaf and children per internal index node
    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    pub fn parse_workers(&self) -> usize {
        self.parse_workers
    }

    pub fn format(&self) -> Option<SourceFormat> {
        self.format
    }

    pub fn separator(&self) -> Option<char> {
        self.separator
    }

    pub fn x_column(&self) -> Option<&Column> {
        self.x_column.as_ref()
    }

    pub fn y_column(&self) -> Option<&Column> {
        self.y_column.as_ref()
    }

    /// Sidecar file used to persist the built index between opens
    pub fn index_cache(&self) -> Option<&Path> {
        self.index_cache.as_deref()
    }

    pub fn validate(&self) -> GeoFileResult<()> {
        if self.frame_size < MIN_FRAME_SIZE {
            return Err(GeoFileError::invalid_argument(format!(
                "frame size must be at least {} bytes, got {}",
                MIN_FRAME_SIZE, self.frame_size
            )));
        }
        if self.node_capacity < MIN_NODE_CAPACITY {
            return Err(GeoFileError::invalid_argument(format!(
                "node capacity must be at least {}, got {}",
                MIN_NODE_CAPACITY, self.node_capacity
            )));
        }
        if self.parse_workers == 0 {
            return Err(GeoFileError::invalid_argument(
                "parse workers must be at least 1",
            ));
        }
        if let Some(sep) = self.separator {
            if matches!(sep, '\n' | '\r' | '"') {
                return Err(GeoFileError::invalid_argument(format!(
                    "{:?} cannot be used as a separator",
                    sep
                )));
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`GeoFileOptions`].
///
/// # Examples
///
/// ```rust
/// use geofile::{GeoFileOptions, SourceFormat};
///
/// let options = GeoFileOptions::builder()
///     .memory_budget(8 * 1024 * 1024)
///     .format(SourceFormat::Delimited)
///     .separator(';')
///     .x_column("lon")
///     .y_column("lat")
///     .build()
///     .unwrap();
/// assert_eq!(options.separator(), Some(';'));
/// ```
pub struct GeoFileOptionsBuilder {
    options: GeoFileOptions,
}

impl Default for GeoFileOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoFileOptionsBuilder {
    #[inline]
    pub fn new() -> GeoFileOptionsBuilder {
        GeoFileOptionsBuilder {
            options: GeoFileOptions::default(),
        }
    }

    pub fn memory_budget(mut self, bytes: usize) -> Self {
        self.options.memory_budget = bytes;
        self
    }

    pub fn frame_size(mut self, bytes: usize) -> Self {
        self.options.frame_size = bytes;
        self
    }

    pub fn node_capacity(mut self, capacity: usize) -> Self {
        self.options.node_capacity = capacity;
        self
    }

    pub fn parse_workers(mut self, workers: usize) -> Self {
        self.options.parse_workers = workers;
        self
    }

    pub fn format(mut self, format: SourceFormat) -> Self {
        self.options.format = Some(format);
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.options.separator = Some(separator);
        self
    }

    pub fn x_column(mut self, column: impl Into<Column>) -> Self {
        self.options.x_column = Some(column.into());
        self
    }

    pub fn y_column(mut self, column: impl Into<Column>) -> Self {
        self.options.y_column = Some(column.into());
        self
    }

    pub fn index_cache(mut self, path: impl AsRef<Path>) -> Self {
        self.options.index_cache = Some(path.as_ref().to_path_buf());
        self
    }

    /// Validates and returns the options.
    pub fn build(self) -> GeoFileResult<GeoFileOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}
