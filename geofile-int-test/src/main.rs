use geofile::{GeoFileOptions, GeoFileResult};
use geofile_int_test::test_util::{cleanup, collect_all, create_random_context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;

fn main() -> GeoFileResult<()> {
    colog::init();
    println!("Starting stress test...");

    let count = 1_000_000;
    let options = GeoFileOptions::builder()
        .memory_budget(4 * 1024 * 1024)
        .frame_size(64 * 1024)
        .build()?;

    let start = std::time::Instant::now();
    let ctx = create_random_context(count, 7, options)?;
    let file = ctx.file();
    let size = std::fs::metadata(ctx.source())?.len();
    println!(
        "Generated and opened {} features ({} bytes) in {:?}",
        count,
        size,
        start.elapsed()
    );

    let mut rng = StdRng::seed_from_u64(1);
    let start = std::time::Instant::now();
    let mut returned = 0;
    for _ in 0..1000 {
        let x: f64 = rng.random_range(-180.0..170.0);
        let y: f64 = rng.random_range(-90.0..80.0);
        let page = file.find(&[x, y, x + 10.0, y + 10.0], 0, 100)?;
        returned += page.len();
    }
    println!(
        "Ran 1000 first-page queries returning {} entries in {:?}",
        returned,
        start.elapsed()
    );

    let start = std::time::Instant::now();
    let all = collect_all(&file, &[-180.0, -90.0, 180.0, 90.0], 10_000)?;
    println!("Paged through all {} features in {:?}", all.len(), start.elapsed());
    drop(all);

    let start = std::time::Instant::now();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let file = file.clone();
            thread::spawn(move || {
                let x = -180.0 + 45.0 * i as f64;
                collect_all(&file, &[x, -90.0, x + 45.0, 90.0], 1000).map(|e| e.len())
            })
        })
        .collect();
    let mut total = 0;
    for handle in handles {
        total += handle.join().unwrap_or_else(|p| std::panic::resume_unwind(p))?;
    }
    println!(
        "Collected {} features from 8 threads in {:?}",
        total,
        start.elapsed()
    );

    println!("{:#?}", file.stats());
    cleanup(ctx)
}
