//! Orchestration of the analysis over a data directory.
//!
//! The data directory holds `config.toml`, the OMNI store and the TPA source
//! files (unless the configured paths are absolute), and receives
//! `results.msgpack`.

use crate::config::{Config, DatasetConfig};
use crate::dataset::TpaDataset;
use crate::omni::{LoadError, OmniStore, TimeWindow};
use crate::stats::{Histogram, compare_counts, scale_to_total};
use crate::variable::Quantity;
use anyhow::{Context, Result};
use glob::glob;
use serde::Serialize;
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

pub struct Manager {
    data_dir: PathBuf,
    cfg: Config,
}

#[derive(Debug, Serialize)]
pub struct ComparisonReport {
    pub p_value: f64,
    pub statistic: f64,
    pub observed: Vec<u64>,
    pub expected: Vec<u64>,
    pub edges: Vec<f64>,
}

/// Outcome of one dataset/quantity comparison. A comparison that cannot be
/// made validly is recorded as its failure message, never as a placeholder
/// number.
#[derive(Debug, Serialize)]
pub struct QuantityReport {
    pub quantity: Quantity,
    pub events_used: usize,
    pub comparison: Option<ComparisonReport>,
    pub failure: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatasetReport {
    pub name: String,
    pub events_total: usize,
    pub events_valid: usize,
    pub quantities: Vec<QuantityReport>,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(data_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { data_dir, cfg })
    }

    /// Run the full pipeline and write `results.msgpack`.
    pub fn run_analysis(&self) -> Result<()> {
        let store = self.omni_store();

        let mut reports = Vec::with_capacity(self.cfg.datasets.len());
        for dataset_cfg in &self.cfg.datasets {
            let dataset = self
                .build_dataset(dataset_cfg, &store)
                .with_context(|| format!("failed to prepare dataset {:?}", dataset_cfg.name))?;
            reports.push(self.compare_dataset(&dataset)?);
        }

        let results_file = self.data_dir.join("results.msgpack");
        let file = File::create(&results_file)
            .with_context(|| format!("failed to create {results_file:?}"))?;
        let mut writer = BufWriter::new(file);
        rmp_serde::encode::write(&mut writer, &reports).context("failed to serialize results")?;
        log::info!("wrote {results_file:?}");

        Ok(())
    }

    /// Extract and print the event lists without touching the OMNI store.
    pub fn list_events(&self) -> Result<()> {
        for dataset_cfg in &self.cfg.datasets {
            let events = dataset_cfg
                .format
                .extract(&self.tpa_file(dataset_cfg))
                .with_context(|| format!("failed to extract dataset {:?}", dataset_cfg.name))?;

            println!("{}: {} events", dataset_cfg.name, events.len());
            for event in &events {
                println!("  {event}");
            }
        }
        Ok(())
    }

    /// Report which months the OMNI store holds and whether each dataset's
    /// window is covered.
    pub fn report_status(&self) -> Result<()> {
        let store = self.omni_store();

        let pattern = store.dir().join("omni_1min_*.mpk");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let months: Vec<PathBuf> = glob(pattern)
            .context("failed to glob OMNI store")?
            .filter_map(Result::ok)
            .collect();
        match (months.first(), months.last()) {
            (Some(first), Some(last)) => {
                log::info!(
                    "OMNI store holds {} monthly file(s), {:?} to {:?}",
                    months.len(),
                    first.file_name().unwrap_or_default(),
                    last.file_name().unwrap_or_default()
                );
            }
            _ => log::warn!("OMNI store at {:?} holds no monthly files", store.dir()),
        }

        for dataset_cfg in &self.cfg.datasets {
            let window = TimeWindow::new(dataset_cfg.start, dataset_cfg.end)?;
            match store.plan(&window) {
                Ok(plan) => log::info!(
                    "{:?}: window covered by {} file(s)",
                    dataset_cfg.name,
                    plan.len()
                ),
                Err(LoadError::DataUnavailable { year, month, .. }) => log::warn!(
                    "{:?}: missing OMNI file for {year:04}-{month:02}",
                    dataset_cfg.name
                ),
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn build_dataset(&self, dataset_cfg: &DatasetConfig, store: &OmniStore) -> Result<TpaDataset> {
        let window = TimeWindow::new(dataset_cfg.start, dataset_cfg.end)?;
        let mut dataset = TpaDataset::new(
            dataset_cfg.name.clone(),
            window,
            self.cfg.time_shift_for(dataset_cfg),
            self.cfg.avg_window_min,
        );

        dataset.load_background(store, &self.cfg.quantities)?;
        dataset.events = dataset_cfg.format.extract(&self.tpa_file(dataset_cfg))?;
        dataset
            .attach_event_means(store, &self.cfg.quantities)
            .context("failed to attach event means")?;
        if self.cfg.hemisphere_adjust {
            dataset.hemisphere_adjust();
        }

        let valid = dataset.valid_event_count(&self.cfg.quantities);
        log::info!(
            "{:?}: {} of {} events have solar-wind coverage",
            dataset.name,
            valid,
            dataset.events.len()
        );
        Ok(dataset)
    }

    fn compare_dataset(&self, dataset: &TpaDataset) -> Result<DatasetReport> {
        let mut quantity_reports = Vec::with_capacity(self.cfg.quantities.len());
        for &quantity in &self.cfg.quantities {
            let spec = self
                .cfg
                .bin_spec(quantity)
                .with_context(|| format!("no bin specification for {quantity}"))?;
            let edges = spec.edges();

            let background = dataset
                .background_samples(quantity)
                .with_context(|| format!("background variables for {quantity} were not loaded"))?;
            let means = dataset.event_means(quantity);
            let events_used = means.iter().filter(|mean| !mean.is_nan()).count();

            let observed = Histogram::from_samples(&means, &edges);
            let observed_total: u64 = observed.counts.iter().sum();
            let expected =
                scale_to_total(&Histogram::from_samples(&background, &edges).counts, observed_total);

            let report = match compare_counts(&observed.counts, &expected, &edges, self.cfg.ddof) {
                Ok(cmp) => {
                    log::info!(
                        "{:?} {quantity}: p = {:.4} over {} merged bin(s)",
                        dataset.name,
                        cmp.p_value,
                        cmp.expected.len()
                    );
                    QuantityReport {
                        quantity,
                        events_used,
                        comparison: Some(ComparisonReport {
                            p_value: cmp.p_value,
                            statistic: cmp.statistic,
                            observed: cmp.observed,
                            expected: cmp.expected,
                            edges: cmp.edges,
                        }),
                        failure: None,
                    }
                }
                Err(err) => {
                    log::warn!("{:?} {quantity}: comparison not possible: {err}", dataset.name);
                    QuantityReport {
                        quantity,
                        events_used,
                        comparison: None,
                        failure: Some(err.to_string()),
                    }
                }
            };
            quantity_reports.push(report);
        }

        Ok(DatasetReport {
            name: dataset.name.clone(),
            events_total: dataset.events.len(),
            events_valid: dataset.valid_event_count(&self.cfg.quantities),
            quantities: quantity_reports,
        })
    }

    fn omni_store(&self) -> OmniStore {
        OmniStore::new(self.resolve(&self.cfg.omni_dir))
    }

    fn tpa_file(&self, dataset_cfg: &DatasetConfig) -> PathBuf {
        self.resolve(&self.cfg.tpa_dir).join(&dataset_cfg.file)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}
