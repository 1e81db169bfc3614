//! LRU cache of source file frames bounded by a byte budget.
//!
//! Frames are only inserted after they were read from disk; nothing is
//! preloaded. Inserting evicts least recently used frames until the new
//! frame fits, so `resident_bytes() <= budget()` holds after every call.

use lru::LruCache;
use std::sync::Arc;

/// Index of a frame: `offset / frame_size`
pub type FrameId = u64;

pub struct FrameCache {
    frames: LruCache<FrameId, Arc<[u8]>>,
    budget: usize,
    resident_bytes: usize,
    peak_resident_bytes: usize,
}

impl FrameCache {
    pub fn new(budget: usize) -> Self {
        Self {
            frames: LruCache::unbounded(),
            budget,
            resident_bytes: 0,
            peak_resident_bytes: 0,
        }
    }

    /// Looks a frame up, marking it most recently used.
    pub fn get(&mut self, frame_id: FrameId) -> Option<Arc<[u8]>> {
        self.frames.get(&frame_id).cloned()
    }

    /// True when a frame of `len` bytes can be cached at all.
    pub fn fits(&self, len: usize) -> bool {
        len <= self.budget
    }

    /// Inserts a loaded frame, evicting LRU frames to stay within budget.
    ///
    /// Returns the cached bytes (an earlier copy if another reader inserted
    /// the same frame first) and the number of evicted frames. Frames that
    /// can never fit are not cached.
    pub fn insert(&mut self, frame_id: FrameId, bytes: Arc<[u8]>) -> (Arc<[u8]>, u64) {
        if let Some(existing) = self.frames.get(&frame_id) {
            return (existing.clone(), 0);
        }
        if !self.fits(bytes.len()) {
            return (bytes, 0);
        }

        let mut evicted = 0;
        while self.resident_bytes + bytes.len() > self.budget {
            match self.frames.pop_lru() {
                Some((_, old)) => {
                    self.resident_bytes -= old.len();
                    evicted += 1;
                }
                None => break,
            }
        }

        self.resident_bytes += bytes.len();
        self.peak_resident_bytes = self.peak_resident_bytes.max(self.resident_bytes);
        self.frames.put(frame_id, bytes.clone());
        (bytes, evicted)
    }

    pub fn contains(&self, frame_id: FrameId) -> bool {
        self.frames.contains(&frame_id)
    }

    /// Drops every frame. Returns how many were resident.
    pub fn clear(&mut self) -> usize {
        let count = self.frames.len();
        self.frames.clear();
        self.resident_bytes = 0;
        count
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    pub fn peak_resident_bytes(&self) -> usize {
        self.peak_resident_bytes
    }
}
