//! Transpolar arc event records.

use crate::omni::{LoadError, TimeWindow};
use crate::variable::Quantity;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    pub fn from_letter(s: &str) -> Option<Self> {
        match s {
            "n" | "N" => Some(Self::North),
            "s" | "S" => Some(Self::South),
            _ => None,
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::North => "north",
            Self::South => "south",
        })
    }
}

/// Whether the arc drifted across the polar cap during its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Motion {
    Moving,
    OvalAligned,
    Unknown,
}

/// Side of the polar cap where the arc formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Dawn,
    Dusk,
    Unknown,
}

/// A single transpolar arc observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpaEvent {
    pub time: NaiveDateTime,
    pub hemisphere: Hemisphere,
    pub motion: Motion,
    pub sector: Sector,
    /// Arc observed simultaneously in both hemispheres.
    pub conjugate: bool,
    /// Window-averaged solar-wind quantities, attached by the dataset.
    pub means: BTreeMap<Quantity, f64>,
}

impl TpaEvent {
    pub fn new(time: NaiveDateTime, hemisphere: Hemisphere) -> Self {
        Self {
            time,
            hemisphere,
            motion: Motion::Unknown,
            sector: Sector::Unknown,
            conjugate: false,
            means: BTreeMap::new(),
        }
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_sector(mut self, sector: Sector) -> Self {
        self.sector = sector;
        self
    }

    pub fn conjugate(mut self) -> Self {
        self.conjugate = true;
        self
    }

    /// Solar-wind averaging window for this event: the `avg_window_min`
    /// minutes ending `time_shift_min` minutes before the arc was seen, so
    /// the averaged wind had time to propagate and drive the arc.
    pub fn observation_window(
        &self,
        time_shift_min: i64,
        avg_window_min: i64,
    ) -> Result<TimeWindow, LoadError> {
        let end = self.time - Duration::minutes(time_shift_min);
        let start = end - Duration::minutes(avg_window_min);
        TimeWindow::new(start, end)
    }

    pub fn mean(&self, quantity: Quantity) -> Option<f64> {
        self.means.get(&quantity).copied()
    }
}

impl fmt::Display for TpaEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:?} {:?}{}",
            self.time.format("%Y-%m-%d %H:%M"),
            self.hemisphere,
            self.motion,
            self.sector,
            if self.conjugate { " conjugate" } else { "" }
        )
    }
}
