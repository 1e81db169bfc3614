//! Record parser: turns the lines of a source file into records.
//!
//! The file is scanned once, in order, through the page store. Lines are
//! collected in batches; the geometry parse of a batch is spread over scoped
//! worker threads and record ids are assigned afterwards, in file order, so
//! the result does not depend on the number of workers.

pub mod delimited;
pub mod geojson;
pub mod scanner;

use std::path::Path;
use std::thread;

pub use delimited::DelimitedFormat;
pub use geojson::GeoJsonFormat;
pub use scanner::{LineScanner, RawLine};

use crate::bounding_box::BoundingBox;
use crate::config::{GeoFileOptions, SourceFormat};
use crate::constants::{PARALLEL_PARSE_THRESHOLD, PARSE_BATCH_LINES};
use crate::page_store::PageStore;
use crate::types::{
    FormatError, GeoFileError, GeoFileResult, ParseReport, Record, StorageRef,
};

/// Parses a single line of a source format into its bounding box.
///
/// Errors are plain messages; the parser wraps them with line and offset.
pub trait LineFormat: Send + Sync {
    fn parse_line(&self, line: &[u8]) -> Result<BoundingBox, String>;
}

/// Result of parsing a whole source file
#[derive(Debug)]
pub struct ParsedSource {
    pub format: SourceFormat,
    pub records: Vec<Record>,
    pub report: ParseReport,
}

/// Picks the source format: configured, else by extension, else sniffed
/// from the first non-blank byte.
pub fn detect_format(store: &PageStore, options: &GeoFileOptions) -> GeoFileResult<SourceFormat> {
    if let Some(format) = options.format() {
        return Ok(format);
    }
    if let Some(format) = extension(store.source().path())
        .as_deref()
        .and_then(format_for_extension)
    {
        return Ok(format);
    }

    let len = store.len().min(store.frame_size() as u64) as usize;
    let head = store.read(0, len)?;
    let first = head
        .iter()
        .copied()
        .find(|&b| !b.is_ascii_whitespace() && !matches!(b, 0xEF | 0xBB | 0xBF));
    Ok(match first {
        Some(b'{') | None => SourceFormat::GeoJsonLines,
        Some(_) => SourceFormat::Delimited,
    })
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn format_for_extension(extension: &str) -> Option<SourceFormat> {
    match extension {
        "csv" | "tsv" | "txt" => Some(SourceFormat::Delimited),
        "geojsonl" | "geojsons" | "ndjson" | "jsonl" | "geojson" => {
            Some(SourceFormat::GeoJsonLines)
        }
        _ => None,
    }
}

/// Parses every line of the source file as `format`.
///
/// Malformed lines are skipped and reported. Fails only when the file
/// cannot be read or a delimited header cannot be resolved.
pub fn parse(
    store: &PageStore,
    format: SourceFormat,
    options: &GeoFileOptions,
) -> GeoFileResult<ParsedSource> {
    log::debug!(
        "Parsing {} as {:?} with {} workers",
        store.source().path().display(),
        format,
        options.parse_workers()
    );

    let mut parser = RecordParser::new(options.parse_workers());
    let mut line_format: Option<Box<dyn LineFormat>> = match format {
        SourceFormat::GeoJsonLines => Some(Box::new(GeoJsonFormat::new())),
        SourceFormat::Delimited => None,
    };

    let mut batch: Vec<RawLine> = Vec::with_capacity(PARSE_BATCH_LINES);
    for line in LineScanner::new(store) {
        let line = line?;
        if line.is_blank() {
            continue;
        }

        let Some(current) = line_format.as_deref() else {
            // first non-blank line of a delimited file is its header
            let header = DelimitedFormat::from_header(
                &line.bytes,
                options.separator(),
                extension(store.source().path()).as_deref(),
                options.x_column(),
                options.y_column(),
            )
            .map_err(|reason| GeoFileError::unreadable(store.source().path(), reason))?;
            line_format = Some(Box::new(header));
            continue;
        };

        batch.push(line);
        if batch.len() >= PARSE_BATCH_LINES {
            parser.parse_batch(current, &batch);
            batch.clear();
        }
    }
    if let Some(current) = line_format.as_deref() {
        parser.parse_batch(current, &batch);
    }

    let (records, report) = parser.finish();
    Ok(ParsedSource {
        format,
        records,
        report,
    })
}

struct RecordParser {
    workers: usize,
    records: Vec<Record>,
    report: ParseReport,
}

impl RecordParser {
    fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            records: Vec::new(),
            report: ParseReport::new(),
        }
    }

    fn parse_batch(&mut self, format: &dyn LineFormat, lines: &[RawLine]) {
        if lines.is_empty() {
            return;
        }
        let results = parse_lines(format, lines, self.workers);
        for (line, result) in lines.iter().zip(results) {
            let result = result.and_then(|bbox| {
                u32::try_from(line.bytes.len())
                    .map(|length| (bbox, length))
                    .map_err(|_| format!("line of {} bytes is too long", line.bytes.len()))
            });

            match result {
                Ok((bbox, length)) => {
                    self.records.push(Record {
                        id: self.records.len() as u64,
                        bbox,
                        storage: StorageRef {
                            offset: line.offset,
                            length,
                        },
                    });
                }
                Err(message) => {
                    let error = FormatError {
                        line: line.number,
                        offset: line.offset,
                        message,
                    };
                    if self.report.push_error(error.clone()) {
                        log::warn!("Skipping malformed {}", error);
                    }
                }
            }
        }
    }

    fn finish(mut self) -> (Vec<Record>, ParseReport) {
        self.report.records = self.records.len() as u64;
        (self.records, self.report)
    }
}

/// Parses `lines` in order, splitting into contiguous chunks across scoped
/// threads when the batch is large enough to be worth it.
fn parse_lines(
    format: &dyn LineFormat,
    lines: &[RawLine],
    workers: usize,
) -> Vec<Result<BoundingBox, String>> {
    if workers <= 1 || lines.len() < PARALLEL_PARSE_THRESHOLD {
        return lines.iter().map(|l| format.parse_line(&l.bytes)).collect();
    }

    let chunk_size = lines.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = lines
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|l| format.parse_line(&l.bytes))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}
