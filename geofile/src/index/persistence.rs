//! Index cache: persists a built index next to its source file.
//!
//! The cache file is a bincode-encoded [`CacheFile`]: a header describing
//! the source it was built from, followed by the encoded body (nodes, record
//! table and parse report) and a CRC32 of those body bytes. A cache is only
//! used when the header matches the current source and options exactly.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::node::{Node, NodeId};
use super::SpatialIndex;
use crate::config::{Column, GeoFileOptions, SourceFormat};
use crate::constants::{FINGERPRINT_BYTES, MAGIC, VERSION};
use crate::page_store::SourceFile;
use crate::types::{GeoFileError, GeoFileResult, ParseReport, Record};

/// Identifies the source and options an index was built from.
///
/// Besides length and mtime the key holds the canonical source path and a
/// CRC32 of the first and last [`FINGERPRINT_BYTES`] of the file, so a cache
/// shared between sources, or a same-length rewrite within the mtime
/// resolution, is not mistaken for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheKey {
    pub source_path: PathBuf,
    pub source_len: u64,
    pub source_modified: u64,
    pub fingerprint: u32,
    pub node_capacity: u32,
    pub format: Option<SourceFormat>,
    pub separator: Option<char>,
    pub x_column: Option<Column>,
    pub y_column: Option<Column>,
}

impl CacheKey {
    pub fn new(source: &SourceFile, options: &GeoFileOptions) -> GeoFileResult<Self> {
        let source_path =
            fs::canonicalize(source.path()).unwrap_or_else(|_| source.path().to_path_buf());
        Ok(Self {
            source_path,
            source_len: source.len(),
            source_modified: source.modified_nanos(),
            fingerprint: fingerprint(source)?,
            node_capacity: options.node_capacity() as u32,
            format: options.format(),
            separator: options.separator(),
            x_column: options.x_column().cloned(),
            y_column: options.y_column().cloned(),
        })
    }
}

/// CRC32 over the head and tail of the source. Short files are hashed whole.
fn fingerprint(source: &SourceFile) -> GeoFileResult<u32> {
    let len = source.len();
    let window = FINGERPRINT_BYTES as u64;

    let mut bytes = vec![0u8; len.min(window) as usize];
    source.read_exact_at(&mut bytes, 0)?;
    if len > window {
        let tail_start = (len - window).max(window);
        let mut tail = vec![0u8; (len - tail_start) as usize];
        source.read_exact_at(&mut tail, tail_start)?;
        bytes.extend_from_slice(&tail);
    }
    Ok(crc32(&bytes))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheHeader {
    magic: u32,
    version: u32,
    key: CacheKey,
    checksum: u32,
}

impl CacheHeader {
    fn validate(&self) -> GeoFileResult<()> {
        if self.magic != MAGIC {
            return Err(GeoFileError::IndexCache(
                "Invalid file format (bad magic)".into(),
            ));
        }
        if self.version != VERSION {
            return Err(GeoFileError::IndexCache(format!(
                "Unsupported cache version {} (expected {})",
                self.version, VERSION
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    header: CacheHeader,
    body: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheBody {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    records: Vec<Record>,
    report: ParseReport,
}

/// An index restored from a cache file together with its record table
#[derive(Debug)]
pub struct CachedIndex {
    pub index: SpatialIndex,
    pub records: Vec<Record>,
    pub report: ParseReport,
}

/// Writes the cache file, replacing any previous one.
///
/// The file is written next to `path` first and renamed into place, so a
/// crash never leaves a truncated cache behind.
pub fn save(
    path: &Path,
    key: CacheKey,
    index: &SpatialIndex,
    records: &[Record],
    report: &ParseReport,
) -> GeoFileResult<()> {
    let body = CacheBodyRef {
        nodes: index.nodes(),
        root: index.root(),
        records,
        report,
    };
    let body = bincode::serde::encode_to_vec(&body, bincode::config::legacy())
        .map_err(|e| GeoFileError::IndexCache(e.to_string()))?;
    let file = CacheFile {
        header: CacheHeader {
            magic: MAGIC,
            version: VERSION,
            key,
            checksum: crc32(&body),
        },
        body,
    };
    let bytes = bincode::serde::encode_to_vec(&file, bincode::config::legacy())
        .map_err(|e| GeoFileError::IndexCache(e.to_string()))?;

    let tmp = temp_path(path);
    let mut out = fs::File::create(&tmp)?;
    out.write_all(&bytes)?;
    out.sync_all()?;
    drop(out);
    fs::rename(&tmp, path)?;

    log::debug!(
        "Wrote index cache {} ({} bytes, {} nodes)",
        path.display(),
        bytes.len(),
        index.node_count()
    );
    Ok(())
}

/// Borrowing twin of [`CacheBody`] so saving does not clone the index
#[derive(Serialize)]
struct CacheBodyRef<'a> {
    nodes: &'a [Node],
    root: Option<NodeId>,
    records: &'a [Record],
    report: &'a ParseReport,
}

/// Loads the cache file if it exists and matches `key`.
///
/// Returns `Ok(None)` when there is no cache file, and an
/// [`GeoFileError::IndexCache`] error when it is stale or corrupt.
pub fn load(path: &Path, key: &CacheKey) -> GeoFileResult<Option<CachedIndex>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let (file, _): (CacheFile, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::legacy())
            .map_err(|e| GeoFileError::IndexCache(format!("cannot decode cache: {}", e)))?;
    file.header.validate()?;

    if file.header.key != *key {
        return Err(GeoFileError::IndexCache(
            "cache was built from a different source or options".into(),
        ));
    }

    let actual = crc32(&file.body);
    if actual != file.header.checksum {
        return Err(GeoFileError::IndexCache(format!(
            "checksum mismatch - possible corruption (expected: {:x}, got: {:x})",
            file.header.checksum, actual
        )));
    }

    let (body, _): (CacheBody, usize) =
        bincode::serde::decode_from_slice(&file.body, bincode::config::legacy())
            .map_err(|e| GeoFileError::IndexCache(format!("cannot decode cache body: {}", e)))?;

    if body.report.records != body.records.len() as u64 {
        return Err(GeoFileError::IndexCache(format!(
            "cache holds {} records but its report counts {}",
            body.records.len(),
            body.report.records
        )));
    }
    let out_of_place = |(i, r): (usize, &Record)| {
        r.id != i as u64
            || r.storage.offset.saturating_add(r.storage.length as u64) > key.source_len
    };
    if let Some(pos) = body.records.iter().enumerate().position(out_of_place) {
        return Err(GeoFileError::IndexCache(format!(
            "cache record {} is inconsistent with the source",
            pos
        )));
    }

    let index = SpatialIndex::from_nodes(body.nodes, body.root, body.records.len() as u64);
    index
        .validate()
        .map_err(|reason| GeoFileError::IndexCache(format!("invalid cached index: {}", reason)))?;

    Ok(Some(CachedIndex {
        index,
        records: body.records,
        report: body.report,
    }))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// CRC32-MPEG2
fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFFFFFF;
    const POLY: u32 = 0x04C11DB7;

    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x80000000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }

    crc ^ 0xFFFFFFFF
}
