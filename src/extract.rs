//! Extraction of transpolar arc events from the published datasets.
//!
//! Each source has its own grammar, selected once per file through
//! [`SourceFormat`]. Comment and trailer rows are recognized explicitly;
//! a data row that fails its grammar is an error, not a silent skip.

use crate::event::{Hemisphere, Motion, Sector, TpaEvent};
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

/// Known dataset file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Kullen et al. (2002) arc-location `.dat` table.
    Kullen,
    /// Fear & Milan (2012) event table as published.
    Fear,
    /// Reidy et al. (2018) event list.
    Reidy,
    /// Cumnock et al. (2009) arc list, CSV export of the original sheet.
    Cumnock2009,
    /// Cumnock (2005) list of times, CSV export of the original sheet.
    Cumnock2005,
}

impl SourceFormat {
    pub fn extract(self, path: &Path) -> Result<Vec<TpaEvent>> {
        let file = File::open(path).with_context(|| format!("failed to open {path:?}"))?;
        let reader = BufReader::new(file);
        let events = match self {
            Self::Kullen => kullen_events(reader),
            Self::Fear => fear_events(reader),
            Self::Reidy => reidy_events(reader),
            Self::Cumnock2009 => cumnock_2009_events(reader),
            Self::Cumnock2005 => cumnock_2005_events(reader),
        }
        .with_context(|| format!("failed to extract events from {path:?}"))?;

        log::info!("extracted {} events from {path:?}", events.len());
        Ok(events)
    }
}

/// An arc that drifted more than two hours of magnetic local time is moving.
/// MLT wraps at 24 h, so the drift is the short way around.
fn motion_from_drift(mlt_start: f64, mlt_end: f64) -> Motion {
    let mut drift = (mlt_end - mlt_start).abs();
    if drift > 12.0 {
        drift = 24.0 - drift;
    }
    if drift > 2.0 { Motion::Moving } else { Motion::OvalAligned }
}

fn sector_from_mlt(mlt: f64) -> Sector {
    if mlt > 0.0 && mlt <= 12.0 { Sector::Dawn } else { Sector::Dusk }
}

fn sector_from_str(s: &str) -> Sector {
    match s.trim().to_ascii_lowercase().as_str() {
        "dawn" => Sector::Dawn,
        "dusk" => Sector::Dusk,
        _ => Sector::Unknown,
    }
}

/// Two-digit-year day-of-year date (`yyddd`), with the usual %y pivot.
fn date_from_yyddd(s: &str) -> Result<NaiveDate> {
    if s.len() != 5 || !s.bytes().all(|b| b.is_ascii_digit()) {
        bail!("expected a 5-digit yyddd date, got {s:?}");
    }
    let yy: i32 = s[..2].parse()?;
    let ddd: u32 = s[2..].parse()?;
    let year = if yy >= 69 { 1900 + yy } else { 2000 + yy };
    NaiveDate::from_yo_opt(year, ddd)
        .with_context(|| format!("day-of-year {ddd} is out of range for {year}"))
}

/// Kullen rows: `yymmdd class hhmm mlt1 .. .. mlt2 ..`, comments start with
/// `;`. Only single-arc classifications (third character `1`) count, and
/// `bd`-prefixed rows only in their `bd1h` variant.
fn kullen_events<R: BufRead>(reader: R) -> Result<Vec<TpaEvent>> {
    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("failed to read line")?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 7 {
            bail!("line {}: expected at least 7 fields, got {}", line_no + 1, tokens.len());
        }

        let class = tokens[1];
        if class.as_bytes().get(2) != Some(&b'1') {
            continue;
        }
        if class.starts_with("bd") && !class.starts_with("bd1h") {
            continue;
        }

        let time = NaiveDateTime::parse_from_str(
            &format!("{}{}", tokens[0], tokens[2]),
            "%y%m%d%H%M",
        )
        .with_context(|| format!("line {}: invalid date or time", line_no + 1))?;
        let mlt_start: f64 = tokens[3]
            .parse()
            .with_context(|| format!("line {}: invalid start MLT", line_no + 1))?;
        let mlt_end: f64 = tokens[6]
            .parse()
            .with_context(|| format!("line {}: invalid end MLT", line_no + 1))?;

        events.push(
            TpaEvent::new(time, Hemisphere::North)
                .with_motion(motion_from_drift(mlt_start, mlt_end))
                .with_sector(sector_from_mlt(mlt_start)),
        );
    }
    Ok(events)
}

/// Fear rows: `idx dd-Mon-YYYY HH:MM .. mlt .. hem Y|N`; header and
/// continuation lines have a non-numeric first field.
fn fear_events<R: BufRead>(reader: R) -> Result<Vec<TpaEvent>> {
    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("failed to read line")?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first().is_none_or(|tok| tok.parse::<u32>().is_err()) {
            continue;
        }
        if tokens.len() < 11 {
            bail!("line {}: expected at least 11 fields, got {}", line_no + 1, tokens.len());
        }

        let time = NaiveDateTime::parse_from_str(
            &format!("{} {}", tokens[1], tokens[2]),
            "%d-%b-%Y %H:%M",
        )
        .with_context(|| format!("line {}: invalid date or time", line_no + 1))?;

        let motion = match tokens[10] {
            "Y" => Motion::Moving,
            "N" => Motion::OvalAligned,
            other => {
                log::warn!("line {}: motion is neither Y nor N but {other:?}", line_no + 1);
                Motion::Unknown
            }
        };
        let mlt: f64 = tokens[7]
            .parse()
            .with_context(|| format!("line {}: invalid MLT", line_no + 1))?;
        let Some(hemisphere) = Hemisphere::from_letter(tokens[9]) else {
            bail!("line {}: invalid hemisphere {:?}", line_no + 1, tokens[9]);
        };

        events.push(
            TpaEvent::new(time, hemisphere)
                .with_motion(motion)
                .with_sector(sector_from_mlt(mlt)),
        );
    }
    Ok(events)
}

/// Reidy rows: `idx dd Mon YYYY HH:MM .. hem`, comments start with `#`.
/// `NS` rows were seen in both hemispheres and yield one conjugate event per
/// hemisphere.
fn reidy_events<R: BufRead>(reader: R) -> Result<Vec<TpaEvent>> {
    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("failed to read line")?;
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 10 {
            bail!("line {}: expected at least 10 fields, got {}", line_no + 1, tokens.len());
        }

        let time = NaiveDateTime::parse_from_str(
            &format!("{}{}{}{}", tokens[1], tokens[2], tokens[3], tokens[4]),
            "%d%b%Y%H:%M",
        )
        .with_context(|| format!("line {}: invalid date or time", line_no + 1))?;

        match tokens[9] {
            "NS" => {
                events.push(TpaEvent::new(time, Hemisphere::North).conjugate());
                events.push(TpaEvent::new(time, Hemisphere::South).conjugate());
            }
            letter => {
                let Some(hemisphere) = Hemisphere::from_letter(letter) else {
                    bail!("line {}: invalid hemisphere {letter:?}", line_no + 1);
                };
                events.push(TpaEvent::new(time, hemisphere));
            }
        }
    }
    Ok(events)
}

/// Cumnock (2009) CSV columns: `yyddd date, hemisphere, HHMMSS-HHMMSS times,
/// dawn/dusk`. The sheet ends at its "Single..." trailer; annotation rows
/// in between are skipped with a warning.
fn cumnock_2009_events<R: Read>(reader: R) -> Result<Vec<TpaEvent>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut events = Vec::new();
    for (row_no, record) in csv_reader.records().enumerate() {
        let record = record.context("failed to read CSV record")?;
        let date_field = record.get(0).unwrap_or("").trim();
        if date_field.contains("Single") {
            break;
        }
        if date_field.is_empty() || !date_field.bytes().all(|b| b.is_ascii_digit()) {
            log::warn!("row {}: skipping non-data row {date_field:?}", row_no + 1);
            continue;
        }

        let date = date_from_yyddd(date_field)
            .with_context(|| format!("row {}: invalid date", row_no + 1))?;
        let times = record.get(2).unwrap_or("").trim();
        let start = times.split('-').next().unwrap_or("");
        let time = NaiveTime::parse_from_str(start, "%H%M%S")
            .with_context(|| format!("row {}: invalid start time {start:?}", row_no + 1))?;

        let hemisphere_field = record.get(1).unwrap_or("").trim();
        let Some(hemisphere) = Hemisphere::from_letter(hemisphere_field) else {
            bail!("row {}: invalid hemisphere {hemisphere_field:?}", row_no + 1);
        };

        events.push(
            TpaEvent::new(date.and_time(time), hemisphere)
                .with_motion(Motion::Moving)
                .with_sector(sector_from_str(record.get(3).unwrap_or(""))),
        );
    }
    Ok(events)
}

/// Cumnock (2005) CSV columns: `yyddd date, HH:MM:SS time, dawn/dusk`. The
/// date column loses leading zeros in the export and is re-padded; the sheet
/// ends at its "Do not..." trailer.
fn cumnock_2005_events<R: Read>(reader: R) -> Result<Vec<TpaEvent>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut events = Vec::new();
    for (row_no, record) in csv_reader.records().enumerate() {
        let record = record.context("failed to read CSV record")?;
        let date_field = record.get(0).unwrap_or("").trim();
        if date_field.contains("Do not") {
            break;
        }
        if date_field.is_empty() || !date_field.bytes().all(|b| b.is_ascii_digit()) {
            log::warn!("row {}: skipping non-data row {date_field:?}", row_no + 1);
            continue;
        }

        let date = date_from_yyddd(&format!("{date_field:0>5}"))
            .with_context(|| format!("row {}: invalid date", row_no + 1))?;
        let time_field = record.get(1).unwrap_or("").trim();
        let time = NaiveTime::parse_from_str(time_field, "%H:%M:%S")
            .with_context(|| format!("row {}: invalid time {time_field:?}", row_no + 1))?;

        events.push(
            TpaEvent::new(date.and_time(time), Hemisphere::North)
                .with_motion(Motion::Moving)
                .with_sector(sector_from_str(record.get(2).unwrap_or(""))),
        );
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").expect("valid test timestamp")
    }

    #[test]
    fn motion_wraps_at_midnight_mlt() {
        assert_eq!(motion_from_drift(23.0, 1.0), Motion::OvalAligned);
        assert_eq!(motion_from_drift(6.0, 9.5), Motion::Moving);
        assert_eq!(motion_from_drift(10.0, 11.0), Motion::OvalAligned);
    }

    #[test]
    fn kullen_filters_classifications() {
        let data = "\
; arc locations, single arcs only
981203 n1p 0510 6.0 78.0 80.0 9.0 0\n\
981204 n2p 0200 6.0 78.0 80.0 6.5 0\n\
981205 bd1h 1200 14.0 78.0 80.0 13.0 0\n\
981206 bd2h 1200 14.0 78.0 80.0 13.0 0\n";
        let events = kullen_events(Cursor::new(data)).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, dt("1998-12-03 05:10"));
        assert_eq!(events[0].motion, Motion::Moving);
        assert_eq!(events[0].sector, Sector::Dawn);
        assert_eq!(events[1].time, dt("1998-12-05 12:00"));
        assert_eq!(events[1].sector, Sector::Dusk);
    }

    #[test]
    fn fear_skips_headers_and_reads_motion() {
        let data = "\
No. Date Time ... MLT ... Hem Moving
1 12-Jun-2001 03:40 x x x x 7.5 x N Y\n\
2 01-Oct-2002 22:05 x x x x 18.0 x S N\n";
        let events = fear_events(Cursor::new(data)).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, dt("2001-06-12 03:40"));
        assert_eq!(events[0].hemisphere, Hemisphere::North);
        assert_eq!(events[0].motion, Motion::Moving);
        assert_eq!(events[0].sector, Sector::Dawn);
        assert_eq!(events[1].motion, Motion::OvalAligned);
        assert_eq!(events[1].sector, Sector::Dusk);
    }

    #[test]
    fn reidy_fans_out_conjugate_rows() {
        let data = "\
# event list
1 15 Dec 2015 08:33 x x x x N\n\
2 20 Dec 2015 17:02 x x x x NS\n";
        let events = reidy_events(Cursor::new(data)).unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].time, dt("2015-12-15 08:33"));
        assert!(!events[0].conjugate);
        assert!(events[1].conjugate && events[2].conjugate);
        assert_eq!(events[1].hemisphere, Hemisphere::North);
        assert_eq!(events[2].hemisphere, Hemisphere::South);
    }

    #[test]
    fn cumnock_2009_stops_at_trailer() {
        let data = "\
date,hem,times,sector
96032,n,035959-041523,dawn
96045,s,120000-121500,dusk
Single arcs below,,,
96050,n,000000-000100,dawn
";
        let events = cumnock_2009_events(Cursor::new(data)).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, dt("1996-02-01 03:59") + chrono::Duration::seconds(59));
        assert_eq!(events[0].sector, Sector::Dawn);
        assert_eq!(events[1].hemisphere, Hemisphere::South);
    }

    #[test]
    fn cumnock_2005_pads_short_dates() {
        let data = "\
date,time,sector
96060,06:30:00,dusk
4121,01:00:00,dawn
Do not use rows below,,
96061,07:00:00,dawn
";
        let events = cumnock_2005_events(Cursor::new(data)).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, dt("1996-02-29 06:30"));
        // 04121 is day 121 of 2004.
        assert_eq!(events[1].time, dt("2004-04-30 01:00"));
    }

    #[test]
    fn yyddd_pivot_and_range() {
        assert_eq!(date_from_yyddd("96032").unwrap(), NaiveDate::from_ymd_opt(1996, 2, 1).unwrap());
        assert_eq!(date_from_yyddd("00001").unwrap(), NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert!(date_from_yyddd("96400").is_err());
        assert!(date_from_yyddd("123").is_err());
    }
}
