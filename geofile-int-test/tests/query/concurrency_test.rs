use geofile::{GeoFileOptions, Page};
use geofile_int_test::test_util::{cleanup, collect_all, create_random_context, ids, run_test};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_concurrent_finds_return_identical_pages() {
    run_test(
        || {
            let options = GeoFileOptions::builder()
                .memory_budget(64 * 1024)
                .frame_size(4096)
                .build()?;
            create_random_context(10_000, 31, options)
        },
        |ctx| {
            let query = [-100.0, -50.0, 100.0, 50.0];
            let expected = ctx.file().find(&query, 0, 200)?;

            let num_threads = 8;
            let barrier = Arc::new(Barrier::new(num_threads));
            let mut handles = vec![];

            for _ in 0..num_threads {
                let file = ctx.file();
                let barrier = Arc::clone(&barrier);
                handles.push(thread::spawn(move || {
                    barrier.wait();
                    (0..20)
                        .map(|_| file.find(&query, 0, 200))
                        .collect::<Result<Vec<Page>, _>>()
                }));
            }

            for handle in handles {
                let pages = handle.join().expect("query thread panicked")?;
                for page in pages {
                    assert_eq!(page, expected);
                }
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_full_iterations_over_different_boxes() {
    run_test(
        || create_random_context(6000, 37, GeoFileOptions::with_memory_budget(32 * 1024)),
        |ctx| {
            let boxes: Vec<[f64; 4]> = (0..6)
                .map(|i| {
                    let x = -180.0 + 60.0 * i as f64;
                    [x, -90.0, x + 60.0, 90.0]
                })
                .collect();

            let handles: Vec<_> = boxes
                .iter()
                .map(|query| {
                    let file = ctx.file();
                    let query = *query;
                    thread::spawn(move || collect_all(&file, &query, 37).map(|e| ids(&e)))
                })
                .collect();

            for (query, handle) in boxes.iter().zip(handles) {
                let found = handle.join().expect("query thread panicked")?;
                let bbox = geofile::BoundingBox::from_slice(query)?;
                assert_eq!(found, ctx.brute_force(&bbox));
            }
            Ok(())
        },
        cleanup,
    )
}
