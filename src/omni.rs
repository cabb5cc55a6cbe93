//! Windowed loader for the month-partitioned OMNI solar-wind store.
//!
//! The store holds one MessagePack file per calendar month, each carrying an
//! epoch date, a column of per-sample second-offsets from that epoch, and a
//! fixed-width sample matrix. [`OmniStore::plan`] translates a time window
//! into the ordered file spans that cover it; [`OmniStore::load`] reads the
//! planned slices and concatenates the requested variables into index-aligned
//! arrays tagged with absolute timestamps.

use crate::variable::{COLUMN_COUNT, Variable};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("window start {start} is after end {end}")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("no data file for {year:04}-{month:02} in {dir:?}")]
    DataUnavailable {
        year: i32,
        month: u32,
        dir: PathBuf,
    },
    #[error("malformed data file {path:?}: {reason}")]
    MalformedSource { path: PathBuf, reason: String },
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A closed time interval over which solar-wind data is requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, LoadError> {
        if start > end {
            return Err(LoadError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }
}

/// One planned read: a monthly file and the offset range needed from it.
///
/// Offsets are seconds from the first instant of the file's month. An
/// `end_offset` of `None` means "to the end of the file".
#[derive(Debug, Clone, PartialEq)]
pub struct FileSpan {
    pub year: i32,
    pub month: u32,
    pub path: PathBuf,
    pub start_offset: f64,
    pub end_offset: Option<f64>,
}

/// On-disk layout of a monthly file.
#[derive(Debug, Serialize, Deserialize)]
pub struct MonthFile {
    /// First day of the month, `%Y-%m-%d`.
    pub epoch: String,
    /// Seconds since the epoch, one per sample, ascending.
    pub offsets: Vec<f64>,
    /// One row per sample, [`COLUMN_COUNT`] columns wide.
    pub rows: Vec<Vec<f64>>,
}

pub fn month_file_name(year: i32, month: u32) -> String {
    format!("omni_1min_{year:04}{month:02}.mpk")
}

fn month_start(year: i32, month: u32) -> NaiveDateTime {
    // Day 1 of a month in 1..=12 always exists.
    NaiveDate::from_ymd_opt(year, month, 1)
        .expect("month must be in 1..=12")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
}

fn seconds_between(t: NaiveDateTime, origin: NaiveDateTime) -> f64 {
    (t - origin).num_seconds() as f64
}

/// Loaded solar-wind samples: a timestamp array plus one equally long value
/// array per requested variable, index-aligned. Missing samples are NaN,
/// never omitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolarWindSeries {
    timestamps: Vec<NaiveDateTime>,
    values: BTreeMap<Variable, Vec<f64>>,
}

impl SolarWindSeries {
    fn new(variables: &[Variable]) -> Self {
        Self {
            timestamps: Vec::new(),
            values: variables.iter().map(|&var| (var, Vec::new())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Samples of one variable, or `None` if it was not requested.
    pub fn values(&self, var: Variable) -> Option<&[f64]> {
        self.values.get(&var).map(Vec::as_slice)
    }

    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.values.keys().copied()
    }
}

/// Read-only handle on a directory of monthly OMNI files.
pub struct OmniStore {
    dir: PathBuf,
}

impl OmniStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Translate a window into the ordered monthly spans that cover it.
    ///
    /// One span per calendar month intersecting the window, except that a
    /// window ending exactly on a month boundary does not produce an empty
    /// span for that month. Every planned file must exist; a missing month is
    /// reported rather than skipped, since skipping would corrupt downstream
    /// averages.
    pub fn plan(&self, window: &TimeWindow) -> Result<Vec<FileSpan>, LoadError> {
        let start = window.start();
        let end = window.end();
        let n_months =
            (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;

        let mut spans = Vec::with_capacity(n_months as usize + 1);
        let mut year = start.year();
        let mut month = start.month();
        for i in 0..=n_months {
            let origin = month_start(year, month);
            let (start_offset, end_offset) = if n_months == 0 {
                (seconds_between(start, origin), Some(seconds_between(end, origin)))
            } else if i == 0 {
                (seconds_between(start, origin), None)
            } else if i == n_months {
                (0.0, Some(seconds_between(end, origin)))
            } else {
                (0.0, None)
            };

            // A window ending at the first instant of its last month takes
            // nothing from that month.
            if i == n_months && i > 0 && end == origin {
                break;
            }

            let path = self.dir.join(month_file_name(year, month));
            if !path.is_file() {
                return Err(LoadError::DataUnavailable {
                    year,
                    month,
                    dir: self.dir.clone(),
                });
            }
            spans.push(FileSpan {
                year,
                month,
                path,
                start_offset,
                end_offset,
            });

            month += 1;
            if month > 12 {
                month = 1;
                year += 1;
            }
        }

        Ok(spans)
    }

    /// Load the planned slices of the requested variables, in chronological
    /// order. Each file is opened, sliced and closed in turn; any unreadable
    /// or malformed file aborts the whole load.
    pub fn load(
        &self,
        plan: &[FileSpan],
        variables: &[Variable],
    ) -> Result<SolarWindSeries, LoadError> {
        let mut series = SolarWindSeries::new(variables);

        for span in plan {
            let month = read_month_file(&span.path)?;
            let epoch = NaiveDate::parse_from_str(&month.epoch, "%Y-%m-%d")
                .map_err(|err| LoadError::MalformedSource {
                    path: span.path.clone(),
                    reason: format!("invalid epoch date {:?}: {err}", month.epoch),
                })?
                .and_hms_opt(0, 0, 0)
                .expect("midnight is a valid time");

            // First sample at or after the span start; the end is exclusive
            // of the last sample at or before the span stop.
            let lo = month
                .offsets
                .partition_point(|&off| off < span.start_offset);
            let hi = match span.end_offset {
                None => month.offsets.len(),
                Some(stop) => month
                    .offsets
                    .partition_point(|&off| off <= stop)
                    .saturating_sub(1),
            };
            if lo >= hi {
                continue;
            }

            for &offset in &month.offsets[lo..hi] {
                series
                    .timestamps
                    .push(epoch + Duration::milliseconds((offset * 1e3).round() as i64));
            }
            for (&var, column) in series.values.iter_mut() {
                let idx = var.column();
                column.extend(month.rows[lo..hi].iter().map(|row| row[idx]));
            }
        }

        Ok(series)
    }

    /// Plan and load in one call.
    pub fn load_window(
        &self,
        window: &TimeWindow,
        variables: &[Variable],
    ) -> Result<SolarWindSeries, LoadError> {
        let plan = self.plan(window)?;
        self.load(&plan, variables)
    }
}

fn read_month_file(path: &Path) -> Result<MonthFile, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let month: MonthFile =
        rmp_serde::decode::from_read(reader).map_err(|err| LoadError::MalformedSource {
            path: path.to_path_buf(),
            reason: format!("failed to decode: {err}"),
        })?;

    if month.rows.len() != month.offsets.len() {
        return Err(LoadError::MalformedSource {
            path: path.to_path_buf(),
            reason: format!(
                "offset column has {} entries but the matrix has {} rows",
                month.offsets.len(),
                month.rows.len()
            ),
        });
    }
    if let Some(row) = month.rows.iter().find(|row| row.len() != COLUMN_COUNT) {
        return Err(LoadError::MalformedSource {
            path: path.to_path_buf(),
            reason: format!("matrix row has {} columns, expected {COLUMN_COUNT}", row.len()),
        });
    }
    // Ascending offsets are what makes the index search valid.
    if month.offsets.windows(2).any(|pair| pair[0] > pair[1]) {
        return Err(LoadError::MalformedSource {
            path: path.to_path_buf(),
            reason: "offsets are not ascending".to_string(),
        });
    }

    Ok(month)
}
