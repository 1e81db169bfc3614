//! The open-file handle.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::bounding_box::BoundingBox;
use crate::config::{GeoFileOptions, SourceFormat};
use crate::cursor;
use crate::index::persistence::{self, CacheKey};
use crate::index::{IndexBuilder, SpatialIndex};
use crate::page_store::PageStore;
use crate::parser;
use crate::query::{Page, QueryEngine};
use crate::types::{GeoFileError, GeoFileResult, GeoFileStats, ParseReport, Record};

/// A geo file opened for bounding-box queries.
///
/// Opening parses the file once and builds an in-memory index of record
/// boxes; record payloads stay on disk and are read back through a page
/// cache bounded by the memory budget. The handle is cheap to clone and can
/// be shared across threads; all clones refer to the same open file.
///
/// # Examples
///
/// ```rust,no_run
/// use geofile::{GeoFile, CURSOR_END};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let file = GeoFile::open("places.geojsonl", 16 * 1024 * 1024)?;
///
/// let mut cursor = 0;
/// while cursor != CURSOR_END {
///     let page = file.find(&[13.0, 52.0, 14.0, 53.0], cursor, 100)?;
///     for entry in &page.entries {
///         println!("{}: {}", entry.id, entry.as_str()?);
///     }
///     cursor = page.next_cursor;
/// }
///
/// file.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GeoFile {
    inner: Arc<GeoFileInner>,
}

struct GeoFileInner {
    path: PathBuf,
    format: SourceFormat,
    store: PageStore,
    /// `None` once closed
    state: RwLock<Option<Arc<IndexState>>>,
    report: ParseReport,
    index_nodes: u64,
    index_height: u32,
    queries: AtomicU64,
}

struct IndexState {
    index: SpatialIndex,
    records: Vec<Record>,
}

impl GeoFile {
    /// Opens `path` with default options and the given memory budget.
    pub fn open(path: impl AsRef<Path>, memory_budget: usize) -> GeoFileResult<GeoFile> {
        Self::open_with_options(path, GeoFileOptions::with_memory_budget(memory_budget))
    }

    /// Opens `path`, parses every record and builds the index.
    ///
    /// Malformed records are skipped and reported by
    /// [`parse_report`](Self::parse_report). Fails with
    /// [`GeoFileError::Open`] when the file cannot be opened or read.
    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: GeoFileOptions,
    ) -> GeoFileResult<GeoFile> {
        let path = path.as_ref();
        options.validate()?;

        let started = Instant::now();
        let store = PageStore::open(path, options.memory_budget(), options.frame_size())?;
        let format = parser::detect_format(&store, &options).map_err(|e| as_open_error(path, e))?;

        let cache = options
            .index_cache()
            .and_then(|cache| cache_key(cache, &store, &options).map(|key| (cache, key)));
        let cached = cache
            .as_ref()
            .and_then(|(cache, key)| load_cache(cache, key));

        let (index, records, report) = match cached {
            Some(cached) => (cached.index, cached.records, cached.report),
            None => {
                let parsed = parser::parse(&store, format, &options)
                    .map_err(|e| as_open_error(path, e))?;
                let parsed_at = started.elapsed();

                let index = IndexBuilder::new(options.node_capacity(), options.parse_workers())
                    .build(&parsed.records);
                log::debug!(
                    "Parsed {} records in {:?}, built index in {:?}",
                    parsed.records.len(),
                    parsed_at,
                    started.elapsed() - parsed_at
                );

                if let Some((cache, key)) = cache {
                    if let Err(e) =
                        persistence::save(cache, key, &index, &parsed.records, &parsed.report)
                    {
                        log::warn!("Failed to write index cache {}: {}", cache.display(), e);
                    }
                }
                (index, parsed.records, parsed.report)
            }
        };

        log::info!(
            "Opened {} ({:?}): {} records, {} skipped lines, {} index nodes, height {}, in {:?}",
            path.display(),
            format,
            records.len(),
            report.skipped,
            index.node_count(),
            index.height(),
            started.elapsed()
        );

        Ok(GeoFile {
            inner: Arc::new(GeoFileInner {
                path: path.to_path_buf(),
                format,
                store,
                index_nodes: index.node_count(),
                index_height: index.height(),
                state: RwLock::new(Some(Arc::new(IndexState { index, records }))),
                report,
                queries: AtomicU64::new(0),
            }),
        })
    }

    /// Returns records intersecting `bbox` (`[min_x, min_y, max_x, max_y]`),
    /// in ascending id order, starting after `cursor` candidates.
    ///
    /// Pass `0` for the first page and the returned
    /// [`next_cursor`](Page::next_cursor) afterwards; [`CURSOR_END`](crate::CURSOR_END)
    /// marks the last page. Fails with [`GeoFileError::InvalidArgument`] for
    /// a malformed box or a zero page size; the handle stays usable.
    pub fn find(&self, bbox: &[f64], cursor: i64, page_size: usize) -> GeoFileResult<Page> {
        let state = self.state()?;
        let bbox = BoundingBox::from_slice(bbox)?;
        self.find_in(&state, &bbox, cursor, page_size)
    }

    /// Typed variant of [`find`](Self::find).
    pub fn find_bbox(
        &self,
        bbox: &BoundingBox,
        cursor: i64,
        page_size: usize,
    ) -> GeoFileResult<Page> {
        let state = self.state()?;
        self.find_in(&state, bbox, cursor, page_size)
    }

    fn find_in(
        &self,
        state: &IndexState,
        bbox: &BoundingBox,
        cursor: i64,
        page_size: usize,
    ) -> GeoFileResult<Page> {
        self.inner.queries.fetch_add(1, Ordering::Relaxed);
        QueryEngine::new(&state.index, &state.records, &self.inner.store).find(
            bbox,
            cursor,
            page_size,
        )
    }

    /// Lazily iterates over the non-empty pages of a query.
    pub fn pages(&self, bbox: &[f64], page_size: usize) -> GeoFileResult<Pages> {
        self.state()?;
        let bbox = BoundingBox::from_slice(bbox)?;
        if page_size == 0 {
            return Err(GeoFileError::invalid_argument("page size must be at least 1"));
        }
        Ok(Pages {
            file: self.clone(),
            bbox,
            cursor: 0,
            page_size,
        })
    }

    /// Number of records intersecting `bbox`, without reading any payload.
    pub fn count(&self, bbox: &[f64]) -> GeoFileResult<u64> {
        let state = self.state()?;
        let bbox = BoundingBox::from_slice(bbox)?;
        self.inner.queries.fetch_add(1, Ordering::Relaxed);
        QueryEngine::new(&state.index, &state.records, &self.inner.store).count(&bbox)
    }

    /// Covering box of all records, `None` for a file without records.
    pub fn extent(&self) -> GeoFileResult<Option<BoundingBox>> {
        let state = self.state()?;
        let extent = state.index.root_bbox();
        Ok((!extent.is_empty()).then_some(extent))
    }

    /// Releases cached frames and the index. Later queries fail with
    /// [`GeoFileError::Closed`]; closing again does nothing.
    pub fn close(&self) {
        let released = self.inner.state.write().take();
        if released.is_some() {
            self.inner.store.close();
            log::debug!("Closed {}", self.inner.path.display());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.read().is_none()
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn format(&self) -> SourceFormat {
        self.inner.format
    }

    /// Accepted and skipped record counts, with a sample of format errors.
    pub fn parse_report(&self) -> &ParseReport {
        &self.inner.report
    }

    /// Number of indexed records
    pub fn len(&self) -> u64 {
        self.inner.report.records
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> GeoFileStats {
        let node_reads = self
            .inner
            .state
            .read()
            .as_ref()
            .map(|state| state.index.node_reads())
            .unwrap_or(0);

        GeoFileStats {
            records: self.inner.report.records,
            skipped_lines: self.inner.report.skipped,
            index_nodes: self.inner.index_nodes,
            index_height: self.inner.index_height,
            node_reads,
            queries: self.inner.queries.load(Ordering::Relaxed),
            page_store: self.inner.store.stats(),
        }
    }

    fn state(&self) -> GeoFileResult<Arc<IndexState>> {
        self.inner.state.read().clone().ok_or(GeoFileError::Closed)
    }
}

impl std::fmt::Debug for GeoFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoFile")
            .field("path", &self.inner.path)
            .field("format", &self.inner.format)
            .field("records", &self.inner.report.records)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Read failures while opening are open errors, not query errors.
fn as_open_error(path: &Path, error: GeoFileError) -> GeoFileError {
    match error {
        GeoFileError::Io(source) => GeoFileError::open(path, source),
        other => other,
    }
}

/// Key of the current source for the index cache, `None` (and no caching)
/// when the source cannot be fingerprinted.
fn cache_key(cache: &Path, store: &PageStore, options: &GeoFileOptions) -> Option<CacheKey> {
    match CacheKey::new(store.source(), options) {
        Ok(key) => Some(key),
        Err(e) => {
            log::warn!("Not using index cache {}: {}", cache.display(), e);
            None
        }
    }
}

fn load_cache(cache: &Path, key: &CacheKey) -> Option<persistence::CachedIndex> {
    match persistence::load(cache, key) {
        Ok(Some(cached)) => {
            log::debug!("Loaded index cache {}", cache.display());
            Some(cached)
        }
        Ok(None) => None,
        Err(e) => {
            log::warn!("Ignoring index cache {}: {}, rebuilding", cache.display(), e);
            None
        }
    }
}

/// Iterator over the pages of one query, driven by the cursor protocol.
///
/// Created by [`GeoFile::pages`]. Yields each non-empty page once; a failed
/// page ends the iteration after yielding the error.
pub struct Pages {
    file: GeoFile,
    bbox: BoundingBox,
    cursor: i64,
    page_size: usize,
}

impl Iterator for Pages {
    type Item = GeoFileResult<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if cursor::is_exhausted(self.cursor) {
            return None;
        }
        match self.file.find_bbox(&self.bbox, self.cursor, self.page_size) {
            Ok(page) => {
                self.cursor = page.next_cursor;
                (!page.is_empty()).then_some(Ok(page))
            }
            Err(e) => {
                self.cursor = cursor::CURSOR_END;
                Some(Err(e))
            }
        }
    }
}
