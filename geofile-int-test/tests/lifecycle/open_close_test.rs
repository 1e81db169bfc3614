use geofile::{GeoFile, GeoFileError, GeoFileOptions};
use geofile_int_test::test_util::{
    cleanup, create_random_context, create_scenario_context, random_dir, run_test, write_source,
    TestContext,
};
use std::fs::OpenOptions;
use std::thread;

#[test]
fn test_open_missing_paths() {
    let dir = random_dir();
    let result = GeoFile::open(dir.join("missing.geojsonl"), 1024);
    match result {
        Err(GeoFileError::Open { path, .. }) => assert!(path.ends_with("missing.geojsonl")),
        other => panic!("expected open error, got {:?}", other),
    }
}

#[test]
fn test_open_directory_fails() {
    let dir = random_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let result = GeoFile::open(&dir, 1024);
    assert!(matches!(result, Err(GeoFileError::Open { .. })));
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn test_invalid_options_rejected() {
    let options = GeoFileOptions::builder().node_capacity(1).build();
    assert!(matches!(options, Err(GeoFileError::InvalidArgument(_))));

    let options = GeoFileOptions::builder().frame_size(16).build();
    assert!(matches!(options, Err(GeoFileError::InvalidArgument(_))));
}

#[test]
fn test_close_is_idempotent() {
    run_test(
        create_scenario_context,
        |ctx| {
            let file = ctx.file();
            assert!(!file.is_closed());
            file.find(&[-180.0, -90.0, 180.0, 90.0], 0, 10)?;
            assert!(file.stats().page_store.resident_bytes > 0);

            file.close();
            file.close();
            assert!(file.is_closed());
            assert_eq!(file.stats().page_store.resident_bytes, 0);
            assert_eq!(file.stats().records, 3);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_queries_after_close_fail() {
    run_test(
        create_scenario_context,
        |ctx| {
            let file = ctx.file();
            file.close();

            assert!(matches!(
                file.find(&[0.0, 0.0, 1.0, 1.0], 0, 10),
                Err(GeoFileError::Closed)
            ));
            // closed is reported before argument validation
            assert!(matches!(file.find(&[1.0], 0, 0), Err(GeoFileError::Closed)));
            assert!(matches!(file.count(&[0.0, 0.0, 1.0, 1.0]), Err(GeoFileError::Closed)));
            assert!(matches!(file.extent(), Err(GeoFileError::Closed)));
            assert!(file.pages(&[0.0, 0.0, 1.0, 1.0], 10).is_err());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_clones_share_closed_state() {
    run_test(
        create_scenario_context,
        |ctx| {
            let file = ctx.file();
            let clone = file.clone();
            clone.close();
            assert!(file.is_closed());
            assert!(matches!(
                file.find(&[-180.0, -90.0, 180.0, 90.0], 0, 10),
                Err(GeoFileError::Closed)
            ));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_close_while_querying() {
    run_test(
        || create_random_context(3000, 41, GeoFileOptions::with_memory_budget(16 * 1024)),
        |ctx| {
            let file = ctx.file();
            let worker = {
                let file = file.clone();
                thread::spawn(move || {
                    let mut ok = 0u32;
                    loop {
                        match file.find(&[-180.0, -90.0, 180.0, 90.0], 0, 50) {
                            Ok(page) => {
                                assert_eq!(page.len(), 50);
                                ok += 1;
                            }
                            Err(GeoFileError::Closed) => return ok,
                            Err(e) => panic!("unexpected error {:?}", e),
                        }
                    }
                })
            };

            thread::sleep(std::time::Duration::from_millis(20));
            file.close();
            worker.join().expect("query thread panicked");
            assert!(file.is_closed());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stats_track_queries() {
    run_test(
        create_scenario_context,
        |ctx| {
            let file = ctx.file();
            let before = file.stats();
            assert_eq!(before.records, 3);
            assert_eq!(before.skipped_lines, 0);
            assert!(before.index_nodes >= 1);

            file.find(&[13.0, 52.0, 13.0, 52.0], 0, 1)?;
            file.count(&[13.0, 52.0, 14.0, 53.0])?;
            let after = file.stats();
            assert_eq!(after.queries, before.queries + 2);
            assert!(after.node_reads > before.node_reads);
            assert!(after.page_store.bytes_read > 0);

            let debug = format!("{:?}", file);
            assert!(debug.contains("scenario.geojsonl"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_read_failure_fails_only_that_query() {
    run_test(
        || {
            let (dir, source) = write_source("shrinking.csv", "x,y\n1,1\n2,2\n")?;
            // nothing cached, every payload is read from disk
            let file = GeoFile::open(&source, 0)?;
            Ok(TestContext::new(dir, source, file, vec![]))
        },
        |ctx| {
            let file = ctx.file();
            assert_eq!(file.len(), 2);

            // drop the second row from under the open handle
            OpenOptions::new().write(true).open(ctx.source())?.set_len(8)?;

            let lost = file.find(&[1.5, 1.5, 2.5, 2.5], 0, 10);
            assert!(matches!(lost, Err(GeoFileError::Io(_))));
            assert!(!file.is_closed());

            let page = file.find(&[0.5, 0.5, 1.5, 1.5], 0, 10)?;
            assert_eq!(page.ids(), vec![0]);
            assert_eq!(page.entries[0].as_str().unwrap(), "1,1");
            assert_eq!(file.count(&[0.0, 0.0, 3.0, 3.0])?, 2);
            Ok(())
        },
        cleanup,
    )
}
