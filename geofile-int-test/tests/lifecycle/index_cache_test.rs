use geofile::{GeoFile, GeoFileOptions};
use geofile_int_test::test_util::{
    cleanup, collect_all, point_feature, random_features, run_test, write_source, TestContext,
};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

const QUERY: [f64; 4] = [-120.0, -60.0, 120.0, 60.0];

fn cached_options(cache: &Path) -> GeoFileOptions {
    GeoFileOptions::builder()
        .memory_budget(256 * 1024)
        .index_cache(cache)
        .build()
        .expect("valid options")
}

fn cached_context() -> geofile::GeoFileResult<TestContext> {
    let (content, expected) = random_features(2500, 53);
    let (dir, source) = write_source("cached.geojsonl", &content)?;
    let file = GeoFile::open_with_options(&source, cached_options(&dir.join("cached.idx")))?;
    Ok(TestContext::new(dir, source, file, expected))
}

#[test]
fn test_reopen_from_cache_gives_identical_results() {
    run_test(
        cached_context,
        |ctx| {
            let cache = ctx.dir().join("cached.idx");
            assert!(cache.exists());

            let first = ctx.file();
            let reopened = GeoFile::open_with_options(ctx.source(), cached_options(&cache))?;

            assert_eq!(reopened.len(), first.len());
            assert_eq!(reopened.parse_report(), first.parse_report());
            assert_eq!(reopened.stats().index_nodes, first.stats().index_nodes);
            assert_eq!(reopened.extent()?, first.extent()?);
            assert_eq!(collect_all(&reopened, &QUERY, 64)?, collect_all(&first, &QUERY, 64)?);
            reopened.close();
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_modified_source_is_rebuilt() {
    run_test(
        cached_context,
        |ctx| {
            let cache = ctx.dir().join("cached.idx");
            ctx.file().close();

            let mut source = OpenOptions::new().append(true).open(ctx.source())?;
            writeln!(source, "{}", point_feature(2500, 170.5, 85.5))?;
            drop(source);

            let reopened = GeoFile::open_with_options(ctx.source(), cached_options(&cache))?;
            assert_eq!(reopened.len(), 2501);
            let page = reopened.find(&[170.4, 85.4, 170.6, 85.6], 0, 10)?;
            assert!(page.ids().contains(&2500));
            reopened.close();
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_corrupt_cache_is_rebuilt() {
    run_test(
        cached_context,
        |ctx| {
            let cache = ctx.dir().join("cached.idx");
            let mut bytes = fs::read(&cache)?;
            let middle = bytes.len() / 2;
            bytes[middle] ^= 0xFF;
            fs::write(&cache, &bytes)?;

            let reopened = GeoFile::open_with_options(ctx.source(), cached_options(&cache))?;
            let ids: Vec<u64> = collect_all(&reopened, &QUERY, 100)?
                .iter()
                .map(|e| e.id)
                .collect();
            let bbox = geofile::BoundingBox::from_slice(&QUERY)?;
            assert_eq!(ids, ctx.brute_force(&bbox));
            reopened.close();

            // rebuilt cache replaced the damaged one
            assert_ne!(fs::read(&cache)?, bytes);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_truncated_cache_is_rebuilt() {
    run_test(
        cached_context,
        |ctx| {
            let cache = ctx.dir().join("cached.idx");
            let len = fs::metadata(&cache)?.len();
            OpenOptions::new().write(true).open(&cache)?.set_len(len / 3)?;

            let reopened = GeoFile::open_with_options(ctx.source(), cached_options(&cache))?;
            assert_eq!(reopened.len(), 2500);
            reopened.close();
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unwritable_cache_path_does_not_fail_open() {
    run_test(
        || {
            let (dir, source) = write_source("plain.geojsonl", &point_feature(0, 1.0, 2.0))?;
            // the cache's parent directory does not exist
            let options = cached_options(&dir.join("missing").join("plain.idx"));
            let file = GeoFile::open_with_options(&source, options)?;
            Ok(TestContext::new(dir, source, file, vec![]))
        },
        |ctx| {
            assert_eq!(ctx.file().len(), 1);
            assert!(!ctx.dir().join("missing").exists());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_different_options_do_not_reuse_cache() {
    run_test(
        cached_context,
        |ctx| {
            let cache = ctx.dir().join("cached.idx");
            let options = GeoFileOptions::builder()
                .node_capacity(8)
                .index_cache(&cache)
                .build()?;
            let reopened = GeoFile::open_with_options(ctx.source(), options)?;

            // a smaller capacity means a taller tree than the cached one
            assert!(reopened.stats().index_height > ctx.file().stats().index_height);
            assert_eq!(
                collect_all(&reopened, &QUERY, 50)?,
                collect_all(&ctx.file(), &QUERY, 50)?
            );
            reopened.close();
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_shared_cache_is_not_reused_for_another_source() {
    run_test(
        || {
            let (dir, first) = write_source("a.csv", "x,y\n1,1\n")?;
            let cache = dir.join("shared.idx");
            let file = GeoFile::open_with_options(&first, cached_options(&cache))?;
            Ok(TestContext::new(dir, first, file, vec![]))
        },
        |ctx| {
            let cache = ctx.dir().join("shared.idx");
            let second = ctx.dir().join("b.csv");
            fs::write(&second, "x,y\n9,9\n")?;
            // same length and mtime as the source the cache was built from
            let modified = fs::metadata(ctx.source())?.modified()?;
            OpenOptions::new().write(true).open(&second)?.set_modified(modified)?;

            let other = GeoFile::open_with_options(&second, cached_options(&cache))?;
            assert!(other.find(&[0.0, 0.0, 2.0, 2.0], 0, 10)?.is_empty());
            let page = other.find(&[8.0, 8.0, 10.0, 10.0], 0, 10)?;
            assert_eq!(page.entries[0].as_str().unwrap(), "9,9");
            other.close();
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_same_length_rewrite_with_same_mtime_is_rebuilt() {
    run_test(
        || {
            let (dir, source) = write_source("rewrite.csv", "x,y\n1,1\n")?;
            let file = GeoFile::open_with_options(&source, cached_options(&dir.join("rewrite.idx")))?;
            Ok(TestContext::new(dir, source, file, vec![]))
        },
        |ctx| {
            let cache = ctx.dir().join("rewrite.idx");
            ctx.file().close();

            let modified = fs::metadata(ctx.source())?.modified()?;
            fs::write(ctx.source(), "x,y\n5,5\n")?;
            OpenOptions::new().write(true).open(ctx.source())?.set_modified(modified)?;

            let reopened = GeoFile::open_with_options(ctx.source(), cached_options(&cache))?;
            assert!(reopened.find(&[0.0, 0.0, 2.0, 2.0], 0, 10)?.is_empty());
            assert_eq!(reopened.find(&[4.0, 4.0, 6.0, 6.0], 0, 10)?.ids(), vec![0]);
            reopened.close();
            Ok(())
        },
        cleanup,
    )
}
