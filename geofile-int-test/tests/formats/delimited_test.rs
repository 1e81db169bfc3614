use geofile::{BoundingBox, GeoFile, GeoFileError, GeoFileOptions, SourceFormat};
use geofile_int_test::test_util::{cleanup, run_test, write_source, TestContext};

fn open_with(
    name: &str,
    content: &str,
    options: GeoFileOptions,
) -> geofile::GeoFileResult<TestContext> {
    let (dir, source) = write_source(name, content)?;
    let file = GeoFile::open_with_options(&source, options)?;
    Ok(TestContext::new(dir, source, file, vec![]))
}

#[test]
fn test_csv_with_detected_columns() {
    run_test(
        || {
            open_with(
                "cities.csv",
                "name,Latitude,Longitude\nBerlin,52.52,13.405\n\"Paris, FR\",48.8566,2.3522\nRome,41.9028,12.4964\n",
                GeoFileOptions::default(),
            )
        },
        |ctx| {
            let file = ctx.file();
            assert_eq!(file.format(), SourceFormat::Delimited);
            assert_eq!(file.len(), 3);

            let page = file.find(&[10.0, 40.0, 15.0, 55.0], 0, 10)?;
            assert_eq!(page.ids(), vec![0, 2]);
            assert_eq!(page.entries[0].as_str().unwrap(), "Berlin,52.52,13.405");
            assert_eq!(page.entries[0].bbox, BoundingBox::point(13.405, 52.52));

            let paris = file.find(&[2.0, 48.0, 3.0, 49.0], 0, 10)?;
            assert_eq!(paris.entries[0].as_str().unwrap(), "\"Paris, FR\",48.8566,2.3522");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_tsv_and_semicolon_separators() {
    run_test(
        || open_with("points.tsv", "id\tx\ty\n1\t1.5\t2.5\n", GeoFileOptions::default()),
        |ctx| {
            assert_eq!(ctx.file().find(&[1.0, 2.0, 2.0, 3.0], 0, 10)?.len(), 1);
            Ok(())
        },
        cleanup,
    );

    run_test(
        || open_with("points.txt", "lon;lat\n7,5;1\n8;9\n", GeoFileOptions::default()),
        |ctx| {
            let file = ctx.file();
            // "7,5" is not a number with ';' as separator
            assert_eq!(file.len(), 1);
            assert_eq!(file.parse_report().skipped, 1);
            assert_eq!(file.parse_report().samples[0].line, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_explicit_separator_and_columns() {
    run_test(
        || {
            let options = GeoFileOptions::builder()
                .format(SourceFormat::Delimited)
                .separator('|')
                .x_column(2)
                .y_column("northing")
                .build()?;
            open_with(
                "survey.dat",
                "station|northing|easting\nA|100|200\nB|150|250\nC|x|300\n",
                options,
            )
        },
        |ctx| {
            let file = ctx.file();
            assert_eq!(file.len(), 2);
            assert_eq!(file.parse_report().skipped, 1);

            let page = file.find(&[240.0, 140.0, 260.0, 160.0], 0, 10)?;
            assert_eq!(page.ids(), vec![1]);
            assert_eq!(page.entries[0].as_str().unwrap(), "B|150|250");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_short_rows_are_format_errors() {
    run_test(
        || open_with("short.csv", "x,y,name\n1,2,a\n3\n\n4,5,b\n", GeoFileOptions::default()),
        |ctx| {
            let file = ctx.file();
            let report = file.parse_report();
            assert_eq!(report.records, 2);
            assert_eq!(report.skipped, 1);
            assert_eq!(report.samples[0].line, 3);
            assert_eq!(report.samples[0].offset, 15);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_header_without_coordinates_fails_open() {
    let (dir, source) = write_source("bad.csv", "id,name\n1,a\n").unwrap();
    let result = GeoFile::open(&source, 1024);
    assert!(matches!(result, Err(GeoFileError::Open { .. })));

    let missing_column = GeoFileOptions::builder().x_column("easting").build().unwrap();
    let (_, other) = write_source("xy.csv", "x,y\n1,2\n").unwrap();
    let result = GeoFile::open_with_options(&other, missing_column);
    assert!(matches!(result, Err(GeoFileError::Open { .. })));

    std::fs::remove_dir_all(dir).unwrap();
    std::fs::remove_dir_all(other.parent().unwrap()).unwrap();
}
