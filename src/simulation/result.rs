//! Trajectory data structures.
//!
//! A [`Trajectory`] is the sole output of a simulation: time-ordered
//! samples of every requested species, with columns in initial-state key
//! order. External consumers (plotting, animation, tabulation) read it
//! through the accessors here; intermediates are never removed from the
//! trajectory itself, only filtered by such consumers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::system::State;

/// Time series of species concentrations over the simulation horizon.
///
/// Time is strictly increasing and spans the full horizon contiguously;
/// segment boundaries contribute exactly one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    time: Vec<f64>,
    species: IndexMap<String, Vec<f64>>,
}

impl Trajectory {
    /// An empty trajectory whose column order is fixed by `species_order`.
    pub(crate) fn new(species_order: impl IntoIterator<Item = String>) -> Self {
        Self {
            time: Vec::new(),
            species: species_order
                .into_iter()
                .map(|species| (species, Vec::new()))
                .collect(),
        }
    }

    /// Appends one sample; `y` must follow the trajectory's column order.
    pub(crate) fn push_sample(&mut self, time: f64, y: &State) {
        self.time.push(time);
        for (i, series) in self.species.values_mut().enumerate() {
            series.push(y[i]);
        }
    }

    /// Sample times, strictly increasing.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Species names in column order.
    pub fn species_names(&self) -> impl Iterator<Item = &str> {
        self.species.keys().map(String::as_str)
    }

    /// The concentration series of one species.
    pub fn concentrations(&self, species: &str) -> Option<&[f64]> {
        self.species.get(species).map(Vec::as_slice)
    }

    /// The last sampled concentration of one species.
    pub fn final_concentration(&self, species: &str) -> Option<f64> {
        self.species
            .get(species)
            .and_then(|series| series.last())
            .copied()
    }

    /// The last sample as a species-to-concentration map, preserving
    /// column order.
    pub fn final_state(&self) -> IndexMap<String, f64> {
        self.species
            .iter()
            .filter_map(|(species, series)| {
                series.last().map(|value| (species.clone(), *value))
            })
            .collect()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}
