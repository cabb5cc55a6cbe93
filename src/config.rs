//! Analysis configuration.
//!
//! Loaded from a TOML file and validated before use. All paths and analysis
//! parameters travel inside the [`Config`] value; nothing is read from
//! ambient state. See [`Config::from_file`] for loading.

use crate::extract::SourceFormat;
use crate::stats::{linear_edges, log_edges};
use crate::variable::{Quantity, Variable};
use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug, fs, ops::RangeBounds, path::Path, path::PathBuf};

/// Histogram bin specification for one quantity.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct BinSpec {
    pub min: f64,
    pub max: f64,
    pub bins: usize,
    /// Logarithmically spaced edges instead of linear ones.
    #[serde(default)]
    pub log: bool,
}

impl BinSpec {
    pub fn edges(&self) -> Vec<f64> {
        if self.log {
            log_edges(self.min, self.max, self.bins)
        } else {
            linear_edges(self.min, self.max, self.bins)
        }
    }
}

/// One TPA dataset to analyze.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub format: SourceFormat,
    /// Source file, relative to `tpa_dir`.
    pub file: PathBuf,
    /// Period of the dataset, ISO 8601 (e.g. `"1998-12-01T00:00:00"`).
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Override of the global time shift for this dataset.
    pub time_shift_min: Option<i64>,
}

/// Analysis configuration parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory of monthly OMNI files.
    pub omni_dir: PathBuf,
    /// Directory of TPA dataset source files.
    pub tpa_dir: PathBuf,

    /// Length of the solar-wind averaging window per event, minutes.
    pub avg_window_min: i64,
    /// Delay between the averaging window and the arc observation, minutes.
    pub time_shift_min: i64,

    /// Flip BxGSM/ByGSM means of southern-hemisphere events.
    #[serde(default)]
    pub hemisphere_adjust: bool,

    /// Extra delta degrees of freedom for the chi-square test.
    #[serde(default)]
    pub ddof: usize,

    /// Quantities to histogram and compare.
    pub quantities: Vec<Quantity>,

    /// Per-quantity bin overrides; quantities without a built-in default
    /// must appear here.
    #[serde(default)]
    pub histogram: BTreeMap<Quantity, BinSpec>,

    #[serde(rename = "dataset")]
    pub datasets: Vec<DatasetConfig>,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or deserialized, or if
    /// the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.avg_window_min, 1..=1440).context("invalid averaging window")?;
        check_num(self.time_shift_min, 0..=10_080).context("invalid time shift")?;
        check_num(self.ddof, 0..10).context("invalid ddof")?;

        if self.quantities.is_empty() {
            bail!("at least one quantity must be configured");
        }
        if self.datasets.is_empty() {
            bail!("at least one dataset must be configured");
        }

        for dataset in &self.datasets {
            if dataset.start > dataset.end {
                bail!(
                    "dataset {:?} starts at {} but ends at {}",
                    dataset.name,
                    dataset.start,
                    dataset.end
                );
            }
            if let Some(shift) = dataset.time_shift_min {
                check_num(shift, 0..=10_080)
                    .with_context(|| format!("invalid time shift for dataset {:?}", dataset.name))?;
            }
        }

        for (quantity, spec) in &self.histogram {
            check_bin_spec(spec).with_context(|| format!("invalid bins for {quantity}"))?;
        }
        for &quantity in &self.quantities {
            if !self.histogram.contains_key(&quantity) && default_bins(quantity).is_none() {
                bail!("no bin specification for {quantity}, add a [histogram] entry");
            }
        }

        Ok(())
    }

    /// Bin specification for a quantity: the configured override, or the
    /// built-in default.
    pub fn bin_spec(&self, quantity: Quantity) -> Option<BinSpec> {
        self.histogram
            .get(&quantity)
            .cloned()
            .or_else(|| default_bins(quantity))
    }

    /// Effective time shift for one dataset.
    pub fn time_shift_for(&self, dataset: &DatasetConfig) -> i64 {
        dataset.time_shift_min.unwrap_or(self.time_shift_min)
    }
}

/// Built-in bin ranges for the routinely compared quantities.
fn default_bins(quantity: Quantity) -> Option<BinSpec> {
    let spec = match quantity {
        Quantity::Measured(
            Variable::BxGse
            | Variable::ByGse
            | Variable::BzGse
            | Variable::BxGsm
            | Variable::ByGsm
            | Variable::BzGsm,
        ) => BinSpec {
            min: -20.0,
            max: 20.0,
            bins: 40,
            log: false,
        },
        Quantity::Measured(Variable::Vel) => BinSpec {
            min: 0.0,
            max: 1000.0,
            bins: 40,
            log: false,
        },
        Quantity::FieldMagnitude | Quantity::Measured(Variable::BAvg | Variable::Bt) => BinSpec {
            min: 0.0,
            max: 20.0,
            bins: 40,
            log: false,
        },
        Quantity::VBSquared => BinSpec {
            min: 1e2,
            max: 1e6,
            bins: 40,
            log: true,
        },
        _ => return None,
    };
    Some(spec)
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_bin_spec(spec: &BinSpec) -> Result<()> {
    check_num(spec.bins, 2..=10_000).context("invalid bin count")?;
    if spec.min >= spec.max {
        bail!("bin range must satisfy min < max, but is {}..{}", spec.min, spec.max);
    }
    if spec.log && spec.min <= 0.0 {
        bail!("logarithmic bins need min > 0, but min is {}", spec.min);
    }
    Ok(())
}
