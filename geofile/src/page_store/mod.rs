//! Out-of-core byte-range access to the source file.
//!
//! The page store is the only component that touches the source file after
//! open. It serves arbitrary `(offset, length)` reads from fixed-size frames:
//! - frames are loaded lazily on first access, never preloaded
//! - an LRU policy keeps resident frame bytes within the memory budget
//! - frames too large for the budget are bypassed, not cached
//! - the frame table lock is never held during disk I/O

pub mod frame_cache;
pub mod storage;

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{GeoFileError, GeoFileResult, PageStoreStats};
use frame_cache::{FrameCache, FrameId};
pub use storage::SourceFile;

/// Internal counters
struct PageStoreStatistics {
    frame_hits: AtomicU64,
    frame_misses: AtomicU64,
    frames_evicted: AtomicU64,
    disk_reads: AtomicU64,
    bytes_read: AtomicU64,
}

impl PageStoreStatistics {
    fn new() -> Self {
        Self {
            frame_hits: AtomicU64::new(0),
            frame_misses: AtomicU64::new(0),
            frames_evicted: AtomicU64::new(0),
            disk_reads: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
        }
    }

    fn record_disk_read(&self, bytes: usize) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }
}

/// Bounded frame cache over a read-only source file.
///
/// Safe to share between threads: reads of disjoint frames proceed in
/// parallel, and only the frame table itself is synchronized.
pub struct PageStore {
    source: SourceFile,
    frame_size: usize,
    cache: Mutex<FrameCache>,
    stats: PageStoreStatistics,
    closed: AtomicBool,
}

impl PageStore {
    /// Opens `path` with the given memory budget and frame size (bytes).
    pub fn open(path: &Path, memory_budget: usize, frame_size: usize) -> GeoFileResult<Self> {
        let source = SourceFile::open(path)?;
        Ok(Self::new(source, memory_budget, frame_size))
    }

    pub fn new(source: SourceFile, memory_budget: usize, frame_size: usize) -> Self {
        log::debug!(
            "Page store over {:?}: {} bytes, budget {} bytes, frame size {}",
            source.path(),
            source.len(),
            memory_budget,
            frame_size
        );
        Self {
            source,
            frame_size: frame_size.max(1),
            cache: Mutex::new(FrameCache::new(memory_budget)),
            stats: PageStoreStatistics::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    /// Size of the source file in bytes
    pub fn len(&self) -> u64 {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn check_closed(&self) -> GeoFileResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(GeoFileError::Closed)
        } else {
            Ok(())
        }
    }

    /// Reads `length` bytes starting at `offset`.
    ///
    /// Non-resident frames covering the range are loaded first (evicting
    /// least recently used frames when over budget).
    pub fn read(&self, offset: u64, length: usize) -> GeoFileResult<Vec<u8>> {
        self.check_closed()?;

        let end = offset
            .checked_add(length as u64)
            .filter(|end| *end <= self.source.len())
            .ok_or_else(|| {
                GeoFileError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "range {}+{} is outside the source file ({} bytes)",
                        offset,
                        length,
                        self.source.len()
                    ),
                ))
            })?;

        let frame_size = self.frame_size as u64;
        let mut out = Vec::with_capacity(length);
        let mut pos = offset;

        while pos < end {
            let frame_id = pos / frame_size;
            let frame_start = frame_id * frame_size;
            let frame_end = (frame_start + frame_size).min(self.source.len());
            let chunk_end = end.min(frame_end);

            match self.load_frame(frame_id, frame_start, frame_end)? {
                Some(frame) => {
                    let from = (pos - frame_start) as usize;
                    let to = (chunk_end - frame_start) as usize;
                    out.extend_from_slice(&frame[from..to]);
                }
                None => {
                    // frame cannot be cached under this budget, read just the range
                    let start = out.len();
                    out.resize(start + (chunk_end - pos) as usize, 0);
                    self.source.read_exact_at(&mut out[start..], pos)?;
                    self.stats.record_disk_read(out.len() - start);
                }
            }
            pos = chunk_end;
        }

        Ok(out)
    }

    /// Returns the bytes of a frame, loading it on a miss.
    /// `None` means the frame is larger than the whole budget.
    fn load_frame(
        &self,
        frame_id: FrameId,
        frame_start: u64,
        frame_end: u64,
    ) -> GeoFileResult<Option<Arc<[u8]>>> {
        let frame_len = (frame_end - frame_start) as usize;
        {
            let mut cache = self.cache.lock();
            if let Some(frame) = cache.get(frame_id) {
                self.stats.frame_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Some(frame));
            }
            self.stats.frame_misses.fetch_add(1, Ordering::Relaxed);
            if !cache.fits(frame_len) {
                return Ok(None);
            }
        }

        let mut buf = vec![0u8; frame_len];
        self.source.read_exact_at(&mut buf, frame_start)?;
        self.stats.record_disk_read(frame_len);

        let mut cache = self.cache.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Ok(Some(buf.into()));
        }
        let (frame, evicted) = cache.insert(frame_id, buf.into());
        if evicted > 0 {
            self.stats
                .frames_evicted
                .fetch_add(evicted, Ordering::Relaxed);
        }
        Ok(Some(frame))
    }

    /// Bytes currently held by resident frames
    pub fn resident_bytes(&self) -> usize {
        self.cache.lock().resident_bytes()
    }

    pub fn memory_budget(&self) -> usize {
        self.cache.lock().budget()
    }

    pub fn stats(&self) -> PageStoreStats {
        let cache = self.cache.lock();
        PageStoreStats {
            memory_budget: cache.budget() as u64,
            frame_size: self.frame_size as u64,
            resident_frames: cache.len() as u64,
            resident_bytes: cache.resident_bytes() as u64,
            peak_resident_bytes: cache.peak_resident_bytes() as u64,
            frame_hits: self.stats.frame_hits.load(Ordering::Relaxed),
            frame_misses: self.stats.frame_misses.load(Ordering::Relaxed),
            frames_evicted: self.stats.frames_evicted.load(Ordering::Relaxed),
            disk_reads: self.stats.disk_reads.load(Ordering::Relaxed),
            bytes_read: self.stats.bytes_read.load(Ordering::Relaxed),
        }
    }

    /// Releases all resident frames. Idempotent; later reads fail with `Closed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = self.cache.lock().clear();
        log::debug!(
            "Page store over {:?} closed, released {} frames",
            self.source.path(),
            released
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
