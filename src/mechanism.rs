//! Multi-step reaction mechanisms.
//!
//! A [`ReactionMechanism`] is an ordered sequence of
//! [`SimpleStep`](crate::step::SimpleStep)s. Order only matters for
//! associating positional rate-constant assignments; the aggregated rate
//! expressions are order-independent because contributions are summed.

use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use num_rational::Rational64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expression::RateExpr;
use crate::model::RateModel;
use crate::step::{ratio_to_f64, SimpleStep};
use crate::validation::check_mass_balance;

/// A species is an intermediate when the magnitude of its net coefficient
/// across the whole mechanism stays below this tolerance.
const INTERMEDIATE_EPSILON: f64 = 1e-4;

#[derive(Error, Debug)]
pub enum MechanismError {
    #[error("mechanism is not mass balanced:\n{0}")]
    Unbalanced(String),
}

/// A positional rate-constant assignment for one step.
///
/// Fields left at their default assign 0 to that constant, replacing the
/// step's previous value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateConstants {
    pub kf: f64,
    pub kr: f64,
}

impl From<(f64, f64)> for RateConstants {
    fn from((kf, kr): (f64, f64)) -> Self {
        Self { kf, kr }
    }
}

/// An ordered collection of elementary steps.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionMechanism {
    steps: Vec<SimpleStep>,
}

impl ReactionMechanism {
    /// Creates a mechanism from its steps. No diagnostics run here; use
    /// [`check_mass_balance`] for the advisory query or
    /// [`ReactionMechanism::new_strict`] to make imbalance fatal.
    pub fn new(steps: Vec<SimpleStep>) -> Self {
        Self { steps }
    }

    /// Creates a mechanism and aborts with [`MechanismError::Unbalanced`]
    /// when the mass-balance check finds a mismatch.
    pub fn new_strict(steps: Vec<SimpleStep>) -> Result<Self, MechanismError> {
        let mechanism = Self::new(steps);
        let report = check_mass_balance(&mechanism);
        if report.has_warnings() {
            return Err(MechanismError::Unbalanced(
                report
                    .results()
                    .iter()
                    .map(|result| format!("{}: {}", result.location(), result.message()))
                    .join("\n"),
            ));
        }
        Ok(mechanism)
    }

    pub fn steps(&self) -> &[SimpleStep] {
        &self.steps
    }

    /// Assigns `(kf, kr)` pairs positionally to the steps. Each assignment
    /// replaces both constants of its step; extra assignments are ignored.
    pub fn set_rate_constants(&mut self, rates: &[RateConstants]) {
        for (step, rate) in self.steps.iter_mut().zip(rates) {
            step.set_rate_constants(rate.kf, rate.kr);
        }
    }

    /// Species produced and fully consumed across the mechanism: their net
    /// coefficient (product occurrences minus reactant occurrences, summed
    /// exactly over all steps) is zero within tolerance.
    pub fn intermediates(&self) -> Vec<String> {
        let mut net: IndexMap<String, Rational64> = IndexMap::new();
        for step in &self.steps {
            for (species, coefficient) in step.products() {
                *net.entry(species.clone()).or_insert_with(Rational64::zero) += coefficient;
            }
            for (species, coefficient) in step.reactants() {
                *net.entry(species.clone()).or_insert_with(Rational64::zero) -= coefficient;
            }
        }

        net.into_iter()
            .filter(|(_, coefficient)| ratio_to_f64(coefficient).abs() < INTERMEDIATE_EPSILON)
            .map(|(species, _)| species)
            .collect()
    }
}

impl RateModel for ReactionMechanism {
    /// Aggregates per-species contributions across all steps. Species
    /// missing from a step contribute nothing for that step; each group is
    /// summed symbolically into one combined expression.
    fn differential_equations(&self) -> IndexMap<String, RateExpr> {
        let mut grouped: IndexMap<String, Vec<RateExpr>> = IndexMap::new();
        for step in &self.steps {
            for (species, ode) in step.differential_equations() {
                grouped.entry(species).or_default().push(ode);
            }
        }

        grouped
            .into_iter()
            .map(|(species, odes)| (species, RateExpr::sum(odes)))
            .collect()
    }
}

impl fmt::Display for ReactionMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.steps.iter().join("\n"))
    }
}
