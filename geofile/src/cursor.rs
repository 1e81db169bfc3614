//! Cursor protocol for paginated queries.
//!
//! A cursor is the number of candidates (in ascending record id order)
//! already returned for a query box. The first call passes `0`; each page
//! carries the cursor for the next call, or [`CURSOR_END`] once every
//! candidate has been returned. Nothing is stored between calls, so a cursor
//! stays valid for as long as the file is open and can be replayed.

pub use crate::constants::CURSOR_END;

/// Number of candidates to skip for `cursor`, `None` for an exhausted cursor.
pub fn start_offset(cursor: i64) -> Option<usize> {
    if cursor < 0 {
        return None;
    }
    Some(usize::try_from(cursor).unwrap_or(usize::MAX))
}

/// Cursor to hand back after emitting `emitted` candidates from `start`.
pub fn next_cursor(start: usize, emitted: usize, total: usize) -> i64 {
    let next = start.saturating_add(emitted);
    if next < total {
        i64::try_from(next).unwrap_or(CURSOR_END)
    } else {
        CURSOR_END
    }
}

/// True for the sentinel (or any negative cursor).
#[inline]
pub fn is_exhausted(cursor: i64) -> bool {
    cursor < 0
}
