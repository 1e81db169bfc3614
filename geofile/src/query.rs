//! Query engine: index search, ordering, pagination and payload resolution.

use std::str::Utf8Error;

use crate::bounding_box::BoundingBox;
use crate::cursor::{self, CURSOR_END};
use crate::index::SpatialIndex;
use crate::page_store::PageStore;
use crate::types::{GeoFileError, GeoFileResult, Record, RecordId};

/// A record returned by a query
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: RecordId,
    pub bbox: BoundingBox,
    /// Raw bytes of the record's line, without the line terminator
    pub payload: Vec<u8>,
}

impl Entry {
    /// The payload as text.
    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Up to `page_size` entries, ascending by id
    pub entries: Vec<Entry>,
    /// Cursor for the next call, [`CURSOR_END`] when the query is exhausted
    pub next_cursor: i64,
}

impl Page {
    /// The empty, final page.
    pub fn end() -> Self {
        Self {
            entries: Vec::new(),
            next_cursor: CURSOR_END,
        }
    }

    pub fn is_last(&self) -> bool {
        cursor::is_exhausted(self.next_cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}

impl IntoIterator for Page {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Runs queries against one index, its record table and the page store.
///
/// Holds no state of its own; every call recomputes the candidate list.
pub struct QueryEngine<'a> {
    index: &'a SpatialIndex,
    records: &'a [Record],
    store: &'a PageStore,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a SpatialIndex, records: &'a [Record], store: &'a PageStore) -> Self {
        Self {
            index,
            records,
            store,
        }
    }

    /// Returns up to `page_size` records intersecting `bbox`, skipping the
    /// first `cursor` candidates in ascending id order.
    pub fn find(&self, bbox: &BoundingBox, cursor: i64, page_size: usize) -> GeoFileResult<Page> {
        bbox.validate()?;
        if page_size == 0 {
            return Err(GeoFileError::invalid_argument("page size must be at least 1"));
        }
        let Some(start) = cursor::start_offset(cursor) else {
            return Ok(Page::end());
        };

        // The cursor is a plain offset, so each page walks the index again and
        // paging through N results costs O(N^2 / page_size) index work. Only
        // ids up to the end of this page are ordered.
        let (candidates, total) = self
            .index
            .lowest_ids(bbox, start.saturating_add(page_size));
        if start >= total {
            return Ok(Page::end());
        }

        let entries = candidates[start..]
            .iter()
            .map(|&id| self.resolve(id))
            .collect::<GeoFileResult<Vec<_>>>()?;

        Ok(Page {
            next_cursor: cursor::next_cursor(start, entries.len(), total),
            entries,
        })
    }

    /// Number of records intersecting `bbox`, without reading payloads.
    pub fn count(&self, bbox: &BoundingBox) -> GeoFileResult<u64> {
        bbox.validate()?;
        Ok(self.index.count(bbox))
    }

    fn resolve(&self, id: RecordId) -> GeoFileResult<Entry> {
        let record = self.records.get(id as usize).ok_or_else(|| {
            GeoFileError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("record {} is missing from the record table", id),
            ))
        })?;
        let payload = self
            .store
            .read(record.storage.offset, record.storage.length as usize)?;

        Ok(Entry {
            id,
            bbox: record.bbox,
            payload,
        })
    }
}
