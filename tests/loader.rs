use chrono::NaiveDateTime;
use std::{fs, fs::File, io::BufWriter, path::PathBuf};
use tpa_analysis::omni::{LoadError, MonthFile, OmniStore, TimeWindow, month_file_name};
use tpa_analysis::variable::{COLUMN_COUNT, Variable};

fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("valid test timestamp")
}

/// A store directory under the target tmpdir, fresh per test.
fn store_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
    fs::remove_dir_all(&dir).ok();
    fs::create_dir_all(&dir).expect("failed to create store dir");
    dir
}

/// Write a monthly file with `n` samples spaced `step` seconds apart.
///
/// Every column holds its own index as a constant, except the BxGSE column
/// which counts samples so that slices are recognizable.
fn write_month(dir: &PathBuf, year: i32, month: u32, n: usize, step: f64) {
    let offsets: Vec<f64> = (0..n).map(|i| i as f64 * step).collect();
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..COLUMN_COUNT)
                .map(|col| {
                    if col == Variable::BxGse.column() {
                        i as f64
                    } else {
                        col as f64
                    }
                })
                .collect()
        })
        .collect();
    let month_file = MonthFile {
        epoch: format!("{year:04}-{month:02}-01"),
        offsets,
        rows,
    };

    let file = File::create(dir.join(month_file_name(year, month))).expect("create month file");
    let mut writer = BufWriter::new(file);
    rmp_serde::encode::write(&mut writer, &month_file).expect("encode month file");
}

#[test]
fn load_concatenates_months_in_order() {
    let dir = store_dir("loader_concat");
    write_month(&dir, 2015, 12, 744, 3600.0); // full month at 1-h cadence
    write_month(&dir, 2016, 1, 744, 3600.0);
    let store = OmniStore::new(&dir);

    let window = TimeWindow::new(dt("2015-12-31 23:00"), dt("2016-01-01 01:00")).unwrap();
    let series = store
        .load_window(&window, &[Variable::BxGse, Variable::Vel])
        .unwrap();

    assert!(!series.is_empty());
    assert_eq!(series.timestamps().first().copied(), Some(dt("2015-12-31 23:00")));
    assert!(series.timestamps().windows(2).all(|pair| pair[0] < pair[1]));
    // Samples from both months made it in.
    assert!(series.timestamps().iter().any(|&t| t >= dt("2016-01-01 00:00")));

    let bx = series.values(Variable::BxGse).unwrap();
    let vel = series.values(Variable::Vel).unwrap();
    assert_eq!(bx.len(), series.len());
    assert_eq!(vel.len(), series.len());
    assert!(vel.iter().all(|&v| v == Variable::Vel.column() as f64));
}

#[test]
fn repeated_loads_are_bit_identical() {
    let dir = store_dir("loader_idempotent");
    write_month(&dir, 1999, 1, 1000, 60.0);
    let store = OmniStore::new(&dir);

    let window = TimeWindow::new(dt("1999-01-01 01:00"), dt("1999-01-01 09:00")).unwrap();
    let variables = [Variable::BxGsm, Variable::BzGsm, Variable::Vel];
    let first = store.load_window(&window, &variables).unwrap();
    let second = store.load_window(&window, &variables).unwrap();

    assert_eq!(first, second);
}

#[test]
fn bx_gsm_alias_reads_the_gse_column() {
    let dir = store_dir("loader_alias");
    write_month(&dir, 1999, 1, 100, 60.0);
    let store = OmniStore::new(&dir);

    let window = TimeWindow::new(dt("1999-01-01 00:00"), dt("1999-01-01 01:00")).unwrap();
    let series = store
        .load_window(&window, &[Variable::BxGsm, Variable::BxGse, Variable::ByGsm])
        .unwrap();

    assert_eq!(
        series.values(Variable::BxGsm).unwrap(),
        series.values(Variable::BxGse).unwrap()
    );
    assert_ne!(
        series.values(Variable::BxGsm).unwrap(),
        series.values(Variable::ByGsm).unwrap()
    );
}

#[test]
fn window_end_is_exclusive() {
    let dir = store_dir("loader_exclusive");
    write_month(&dir, 1999, 1, 100, 60.0);
    let store = OmniStore::new(&dir);

    // Samples at 0 s and 60 s fall in the window; the sample at the 120 s
    // boundary is excluded.
    let window = TimeWindow::new(dt("1999-01-01 00:00"), dt("1999-01-01 00:02")).unwrap();
    let series = store.load_window(&window, &[Variable::Vel]).unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series.timestamps().last().copied(), Some(dt("1999-01-01 00:01")));
}

#[test]
fn boundary_end_takes_nothing_from_the_next_month() {
    let dir = store_dir("loader_boundary");
    write_month(&dir, 2015, 12, 744, 3600.0);
    // No January file: the plan must not need it.
    let store = OmniStore::new(&dir);

    let window = TimeWindow::new(dt("2015-12-30 00:00"), dt("2016-01-01 00:00")).unwrap();
    let series = store.load_window(&window, &[Variable::Vel]).unwrap();

    assert!(!series.is_empty());
    assert!(series.timestamps().iter().all(|&t| t < dt("2016-01-01 00:00")));
}

#[test]
fn missing_month_aborts_the_load() {
    let dir = store_dir("loader_missing");
    write_month(&dir, 1999, 1, 100, 60.0);
    let store = OmniStore::new(&dir);

    let window = TimeWindow::new(dt("1999-01-01 00:00"), dt("1999-02-15 00:00")).unwrap();
    let err = store.load_window(&window, &[Variable::Vel]).unwrap_err();

    assert!(matches!(err, LoadError::DataUnavailable { year: 1999, month: 2, .. }));
}

#[test]
fn undecodable_file_is_malformed() {
    let dir = store_dir("loader_garbage");
    fs::write(dir.join(month_file_name(1999, 1)), b"not msgpack at all").unwrap();
    let store = OmniStore::new(&dir);

    let window = TimeWindow::new(dt("1999-01-01 00:00"), dt("1999-01-02 00:00")).unwrap();
    let err = store.load_window(&window, &[Variable::Vel]).unwrap_err();

    assert!(matches!(err, LoadError::MalformedSource { .. }));
}

#[test]
fn ragged_matrix_is_malformed() {
    let dir = store_dir("loader_ragged");
    let month_file = MonthFile {
        epoch: "1999-01-01".to_string(),
        offsets: vec![0.0, 60.0],
        rows: vec![vec![0.0; COLUMN_COUNT], vec![0.0; COLUMN_COUNT - 1]],
    };
    let file = File::create(dir.join(month_file_name(1999, 1))).unwrap();
    let mut writer = BufWriter::new(file);
    rmp_serde::encode::write(&mut writer, &month_file).unwrap();
    drop(writer); // flush the BufWriter so the file is complete before reading
    let store = OmniStore::new(&dir);

    let window = TimeWindow::new(dt("1999-01-01 00:00"), dt("1999-01-02 00:00")).unwrap();
    let err = store.load_window(&window, &[Variable::Vel]).unwrap_err();

    match err {
        LoadError::MalformedSource { reason, .. } => assert!(reason.contains("columns")),
        other => panic!("expected MalformedSource, got {other:?}"),
    }
}

#[test]
fn nan_samples_pass_through() {
    let dir = store_dir("loader_nan");
    let mut rows = vec![vec![1.0; COLUMN_COUNT]; 3];
    rows[1][Variable::Vel.column()] = f64::NAN;
    let month_file = MonthFile {
        epoch: "1999-01-01".to_string(),
        offsets: vec![0.0, 60.0, 120.0],
        rows,
    };
    let file = File::create(dir.join(month_file_name(1999, 1))).unwrap();
    let mut writer = BufWriter::new(file);
    rmp_serde::encode::write(&mut writer, &month_file).unwrap();
    drop(writer); // flush the BufWriter so the file is complete before reading
    let store = OmniStore::new(&dir);

    let window = TimeWindow::new(dt("1999-01-01 00:00"), dt("1999-01-01 00:30")).unwrap();
    let series = store.load_window(&window, &[Variable::Vel]).unwrap();

    let vel = series.values(Variable::Vel).unwrap();
    assert_eq!(vel.len(), 2);
    assert!(vel[1].is_nan());
    assert_eq!(vel[0], 1.0);
}
