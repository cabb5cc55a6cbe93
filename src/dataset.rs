//! A TPA dataset: its events and the background solar wind over its period.

use crate::event::{Hemisphere, TpaEvent};
use crate::omni::{OmniStore, SolarWindSeries, TimeWindow};
use crate::stats::nan_mean;
use crate::variable::{Quantity, Variable};
use anyhow::{Context, Result};
use std::collections::BTreeSet;

/// Per-sample values of a quantity, computed from a loaded series.
///
/// Returns `None` when a required variable was not loaded.
pub fn quantity_samples(series: &SolarWindSeries, quantity: Quantity) -> Option<Vec<f64>> {
    match quantity {
        Quantity::Measured(var) => series.values(var).map(<[f64]>::to_vec),
        Quantity::FieldMagnitude => {
            let bx = series.values(Variable::BxGsm)?;
            let by = series.values(Variable::ByGsm)?;
            let bz = series.values(Variable::BzGsm)?;
            Some(
                bx.iter()
                    .zip(by)
                    .zip(bz)
                    .map(|((&x, &y), &z)| (x * x + y * y + z * z).sqrt())
                    .collect(),
            )
        }
        Quantity::VBSquared => {
            let vel = series.values(Variable::Vel)?;
            let bmag = quantity_samples(series, Quantity::FieldMagnitude)?;
            Some(vel.iter().zip(&bmag).map(|(&v, &b)| v * b * b).collect())
        }
    }
}

/// Union of the measured variables needed for a set of quantities.
pub fn required_variables(quantities: &[Quantity]) -> Vec<Variable> {
    let set: BTreeSet<Variable> = quantities
        .iter()
        .flat_map(|q| q.variables().iter().copied())
        .collect();
    set.into_iter().collect()
}

pub struct TpaDataset {
    pub name: String,
    pub window: TimeWindow,
    pub time_shift_min: i64,
    pub avg_window_min: i64,
    pub background: SolarWindSeries,
    pub events: Vec<TpaEvent>,
}

impl TpaDataset {
    pub fn new(
        name: String,
        window: TimeWindow,
        time_shift_min: i64,
        avg_window_min: i64,
    ) -> Self {
        Self {
            name,
            window,
            time_shift_min,
            avg_window_min,
            background: SolarWindSeries::default(),
            events: Vec::new(),
        }
    }

    /// Load the background solar wind for the dataset's whole period.
    pub fn load_background(&mut self, store: &OmniStore, quantities: &[Quantity]) -> Result<()> {
        let variables = required_variables(quantities);
        self.background = store
            .load_window(&self.window, &variables)
            .with_context(|| format!("failed to load background for {:?}", self.name))?;
        log::info!(
            "{:?}: background loaded, {} samples of {} variables",
            self.name,
            self.background.len(),
            variables.len()
        );
        Ok(())
    }

    /// Attach window-averaged quantities to every event.
    ///
    /// Each event gets the requested solar wind loaded over its own
    /// observation window and averaged NaN-aware. A loader failure for any
    /// event aborts the whole call.
    pub fn attach_event_means(
        &mut self,
        store: &OmniStore,
        quantities: &[Quantity],
    ) -> Result<()> {
        let variables = required_variables(quantities);
        for event in &mut self.events {
            let window = event.observation_window(self.time_shift_min, self.avg_window_min)?;
            let series = store.load_window(&window, &variables).with_context(|| {
                format!("failed to load solar wind for event at {}", event.time)
            })?;
            for &quantity in quantities {
                let samples = quantity_samples(&series, quantity)
                    .with_context(|| format!("variables for {quantity} were not loaded"))?;
                event.means.insert(quantity, nan_mean(&samples));
            }
        }
        Ok(())
    }

    /// Flip the sign of the BxGSM/ByGSM means of southern-hemisphere events,
    /// mapping both hemispheres onto one magnetic geometry.
    pub fn hemisphere_adjust(&mut self) {
        for event in &mut self.events {
            if event.hemisphere != Hemisphere::South {
                continue;
            }
            for var in [Variable::BxGsm, Variable::ByGsm] {
                if let Some(mean) = event.means.get_mut(&Quantity::Measured(var)) {
                    *mean = -*mean;
                }
            }
        }
    }

    /// Background per-sample values of one quantity.
    pub fn background_samples(&self, quantity: Quantity) -> Option<Vec<f64>> {
        quantity_samples(&self.background, quantity)
    }

    /// Per-event means of one quantity, in event order. Events without a
    /// valid average contribute NaN.
    pub fn event_means(&self, quantity: Quantity) -> Vec<f64> {
        self.events
            .iter()
            .map(|event| event.mean(quantity).unwrap_or(f64::NAN))
            .collect()
    }

    /// Events whose every requested mean is valid.
    pub fn valid_event_count(&self, quantities: &[Quantity]) -> usize {
        self.events
            .iter()
            .filter(|event| {
                quantities
                    .iter()
                    .all(|&q| event.mean(q).is_some_and(|mean| !mean.is_nan()))
            })
            .count()
    }
}
