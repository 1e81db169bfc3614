use geofile::{GeoFile, GeoFileOptions};
use geofile_int_test::test_util::{
    cleanup, collect_all, create_random_context, ids, run_test, TestContext,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BUDGET: usize = 16 * 1024;

fn small_budget_context() -> geofile::GeoFileResult<TestContext> {
    let options = GeoFileOptions::builder()
        .memory_budget(BUDGET)
        .frame_size(4096)
        .build()?;
    create_random_context(20_000, 17, options)
}

#[test]
fn test_resident_bytes_stay_within_budget() {
    run_test(
        small_budget_context,
        |ctx| {
            let file = ctx.file();
            let size = std::fs::metadata(ctx.source())?.len();
            assert!(size > 50 * BUDGET as u64);

            let mut rng = StdRng::seed_from_u64(4);
            for _ in 0..30 {
                let x: f64 = rng.random_range(-180.0..150.0);
                let y: f64 = rng.random_range(-90.0..60.0);
                let query = [x, y, x + 30.0, y + 30.0];
                let mut cursor = 0;
                while cursor >= 0 {
                    let page = file.find(&query, cursor, 64)?;
                    let stats = file.stats().page_store;
                    assert!(stats.resident_bytes <= BUDGET as u64);
                    cursor = page.next_cursor;
                }
            }

            let stats = file.stats().page_store;
            assert!(stats.peak_resident_bytes <= BUDGET as u64);
            assert!(stats.frames_evicted > 0);
            assert!(stats.frame_misses > 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_zero_budget_still_answers_queries() {
    run_test(
        || {
            let options = GeoFileOptions::builder().memory_budget(0).build()?;
            create_random_context(500, 23, options)
        },
        |ctx| {
            let file = ctx.file();
            let entries = collect_all(&file, &[-180.0, -90.0, 180.0, 90.0], 100)?;
            assert_eq!(entries.len(), 500);
            for entry in &entries {
                assert!(entry.as_str().unwrap().starts_with("{\"type\":\"Feature\""));
            }

            let stats = file.stats().page_store;
            assert_eq!(stats.resident_bytes, 0);
            assert_eq!(stats.resident_frames, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_budget_does_not_change_results() {
    run_test(
        small_budget_context,
        |ctx| {
            let roomy = GeoFile::open(ctx.source(), 64 * 1024 * 1024)?;
            let query = [-30.0, -30.0, 30.0, 30.0];
            let tight = collect_all(&ctx.file(), &query, 100)?;
            let loose = collect_all(&roomy, &query, 100)?;
            assert_eq!(ids(&tight), ids(&loose));
            assert_eq!(tight, loose);
            roomy.close();
            Ok(())
        },
        cleanup,
    )
}
