use geofile::{BoundingBox, Entry, GeoFile, GeoFileOptions, GeoFileResult, CURSOR_END};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test with retry logic and error handling.
/// `after` runs even when the test fails, so temporary files are removed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> GeoFileResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> GeoFileResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> GeoFileResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx)
                        .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        let (error, backtrace) = match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => (e, bt),
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    format!("Unknown panic: {:?}", panic_err.type_id())
                };
                (format!("Panic: {}", err_msg), Backtrace::capture().to_string())
            }
        };

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("Error: {}", error);
            eprintln!("Retrying in {}ms...\n", 100 * attempt);
            thread::sleep(Duration::from_millis(100 * attempt as u64));
        }
        last_error = Some(error);
        last_backtrace = Some(backtrace);
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

/// An open geo file over a generated source, with the boxes it was written
/// from (indexed by record id) for brute-force comparison.
#[derive(Clone)]
pub struct TestContext {
    dir: PathBuf,
    source: PathBuf,
    file: GeoFile,
    expected: Arc<Vec<BoundingBox>>,
}

impl TestContext {
    pub fn new(dir: PathBuf, source: PathBuf, file: GeoFile, expected: Vec<BoundingBox>) -> Self {
        Self {
            dir,
            source,
            file,
            expected: Arc::new(expected),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn file(&self) -> GeoFile {
        self.file.clone()
    }

    pub fn expected(&self) -> &[BoundingBox] {
        &self.expected
    }

    /// Ids of the expected boxes intersecting `bbox`, ascending
    pub fn brute_force(&self, bbox: &BoundingBox) -> Vec<u64> {
        self.expected
            .iter()
            .enumerate()
            .filter(|(_, b)| b.intersects(bbox))
            .map(|(id, _)| id as u64)
            .collect()
    }
}

pub fn random_dir() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("geofile-{}", id))
}

/// Writes `content` to `name` inside a fresh temporary directory.
pub fn write_source(name: &str, content: &str) -> GeoFileResult<(PathBuf, PathBuf)> {
    let dir = random_dir();
    fs::create_dir_all(&dir)?;
    let source = dir.join(name);
    fs::write(&source, content)?;
    Ok((dir, source))
}

pub fn point_feature(id: usize, x: f64, y: f64) -> String {
    format!(
        r#"{{"type":"Feature","properties":{{"id":{}}},"geometry":{{"type":"Point","coordinates":[{},{}]}}}}"#,
        id, x, y
    )
}

/// The three points used throughout the query contract tests.
pub fn create_scenario_context() -> GeoFileResult<TestContext> {
    let points = [(13.0, 52.0), (13.5, 52.5), (14.0, 53.0)];
    let mut content = String::new();
    for (id, (x, y)) in points.iter().enumerate() {
        writeln!(content, "{}", point_feature(id, *x, *y)).ok();
    }

    let (dir, source) = write_source("scenario.geojsonl", &content)?;
    let file = GeoFile::open(&source, 1024 * 1024)?;
    let expected = points.iter().map(|(x, y)| BoundingBox::point(*x, *y)).collect();
    Ok(TestContext::new(dir, source, file, expected))
}

/// GeoJSON lines of random points, lines and polygons around the globe.
///
/// Returns the file content and each feature's bounding box.
pub fn random_features(count: usize, seed: u64) -> (String, Vec<BoundingBox>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut content = String::new();
    let mut boxes = Vec::with_capacity(count);

    for id in 0..count {
        let x: f64 = rng.random_range(-179.0..179.0);
        let y: f64 = rng.random_range(-89.0..89.0);
        let (geometry, bbox) = match rng.random_range(0..3) {
            0 => (
                format!(r#"{{"type":"Point","coordinates":[{},{}]}}"#, x, y),
                BoundingBox::point(x, y),
            ),
            1 => {
                let (x2, y2) = (x + rng.random_range(0.0..1.0), y + rng.random_range(0.0..1.0));
                (
                    format!(r#"{{"type":"LineString","coordinates":[[{},{}],[{},{}]]}}"#, x, y, x2, y2),
                    BoundingBox::new(x, y, x2, y2),
                )
            }
            _ => {
                let d: f64 = rng.random_range(0.01..0.5);
                (
                    format!(
                        r#"{{"type":"Polygon","coordinates":[[[{x},{y}],[{x2},{y}],[{x2},{y2}],[{x},{y2}],[{x},{y}]]]}}"#,
                        x = x,
                        y = y,
                        x2 = x + d,
                        y2 = y + d
                    ),
                    BoundingBox::new(x, y, x + d, y + d),
                )
            }
        };
        writeln!(
            content,
            r#"{{"type":"Feature","properties":{{"id":{},"name":"feature-{}"}},"geometry":{}}}"#,
            id, id, geometry
        )
        .ok();
        boxes.push(bbox);
    }

    (content, boxes)
}

/// A random GeoJSON lines file opened with `options`.
pub fn create_random_context(
    count: usize,
    seed: u64,
    options: GeoFileOptions,
) -> GeoFileResult<TestContext> {
    let (content, expected) = random_features(count, seed);
    let (dir, source) = write_source("random.geojsonl", &content)?;
    let file = GeoFile::open_with_options(&source, options)?;
    Ok(TestContext::new(dir, source, file, expected))
}

/// Follows the cursor until it is exhausted, collecting every entry.
pub fn collect_all(file: &GeoFile, bbox: &[f64], page_size: usize) -> GeoFileResult<Vec<Entry>> {
    let mut entries = Vec::new();
    let mut cursor = 0;
    while cursor != CURSOR_END {
        let page = file.find(bbox, cursor, page_size)?;
        entries.extend(page.entries);
        cursor = page.next_cursor;
    }
    Ok(entries)
}

pub fn ids(entries: &[Entry]) -> Vec<u64> {
    entries.iter().map(|e| e.id).collect()
}

pub fn cleanup(ctx: TestContext) -> GeoFileResult<()> {
    ctx.file().close();
    if ctx.dir().exists() {
        fs::remove_dir_all(ctx.dir())?;
        log::debug!("Removed test directory {}", ctx.dir().display());
    }
    Ok(())
}
