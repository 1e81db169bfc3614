//! Sequential line scanning through the page store.
//!
//! The source file is read one frame-sized chunk at a time, so scanning a
//! file never holds more than one chunk plus the current partial line.

use crate::page_store::PageStore;
use crate::types::GeoFileResult;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One physical line of the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based physical line number
    pub number: u64,
    /// Byte offset of the first byte of `bytes`
    pub offset: u64,
    /// Line content without the terminating `\n` or `\r\n`
    pub bytes: Vec<u8>,
}

impl RawLine {
    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(u8::is_ascii_whitespace)
    }
}

/// Iterator over the lines of the source file, in file order.
///
/// A final line without a trailing newline is still yielded. A read failure
/// is yielded once and ends the iteration.
pub struct LineScanner<'a> {
    store: &'a PageStore,
    next_read: u64,
    chunk: Vec<u8>,
    chunk_start: u64,
    cursor: usize,
    partial: Vec<u8>,
    partial_start: u64,
    line_number: u64,
}

impl<'a> LineScanner<'a> {
    pub fn new(store: &'a PageStore) -> Self {
        Self {
            store,
            next_read: 0,
            chunk: Vec::new(),
            chunk_start: 0,
            cursor: 0,
            partial: Vec::new(),
            partial_start: 0,
            line_number: 0,
        }
    }

    fn make_line(&mut self, mut offset: u64, mut bytes: Vec<u8>) -> RawLine {
        self.line_number += 1;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        if offset == 0 && bytes.starts_with(UTF8_BOM) {
            bytes.drain(..UTF8_BOM.len());
            offset = UTF8_BOM.len() as u64;
        }
        RawLine {
            number: self.line_number,
            offset,
            bytes,
        }
    }

    fn read_next_chunk(&mut self) -> GeoFileResult<()> {
        let remaining = self.store.len() - self.next_read;
        let len = remaining.min(self.store.frame_size() as u64) as usize;
        self.chunk = self.store.read(self.next_read, len)?;
        self.chunk_start = self.next_read;
        self.cursor = 0;
        self.next_read += len as u64;
        Ok(())
    }
}

impl Iterator for LineScanner<'_> {
    type Item = GeoFileResult<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cursor < self.chunk.len() {
                let rest = &self.chunk[self.cursor..];
                match rest.iter().position(|&b| b == b'\n') {
                    Some(newline) => {
                        let (offset, bytes) = if self.partial.is_empty() {
                            (self.chunk_start + self.cursor as u64, rest[..newline].to_vec())
                        } else {
                            self.partial.extend_from_slice(&rest[..newline]);
                            (self.partial_start, std::mem::take(&mut self.partial))
                        };
                        self.cursor += newline + 1;
                        return Some(Ok(self.make_line(offset, bytes)));
                    }
                    None => {
                        if self.partial.is_empty() {
                            self.partial_start = self.chunk_start + self.cursor as u64;
                        }
                        self.partial.extend_from_slice(rest);
                        self.cursor = self.chunk.len();
                    }
                }
            }

            if self.next_read >= self.store.len() {
                if self.partial.is_empty() {
                    return None;
                }
                let bytes = std::mem::take(&mut self.partial);
                return Some(Ok(self.make_line(self.partial_start, bytes)));
            }

            if let Err(e) = self.read_next_chunk() {
                self.next_read = self.store.len();
                self.chunk.clear();
                self.cursor = 0;
                self.partial.clear();
                return Some(Err(e));
            }
        }
    }
}
