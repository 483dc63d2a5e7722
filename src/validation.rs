//! Mass-balance diagnostics for mechanisms.
//!
//! The check is advisory: [`check_mass_balance`] returns a [`Report`] the
//! caller can inspect, and nothing is raised automatically. Strict callers
//! use [`ReactionMechanism::new_strict`](crate::mechanism::ReactionMechanism::new_strict),
//! which turns any finding into a construction error.
//!
//! Species names are tentatively decomposed into element counts
//! (`H2O` -> `{H: 2, O: 1}`, phase markers stripped). Names that are not
//! element formulas make their step unverifiable, which is reported as an
//! informational result rather than a mismatch.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use num_rational::Rational64;
use num_traits::Zero;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mechanism::ReactionMechanism;
use crate::step::{SimpleStep, StoichiometricMap};

lazy_static! {
    static ref ELEMENT_RE: Regex = Regex::new(r"^([A-Z][a-z]?)([0-9]*)").unwrap();
}

/// Severity of a single validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// One finding of the mass-balance check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    location: String,
    message: String,
    severity: Severity,
}

impl ValidationResult {
    pub fn new(location: String, message: String, severity: Severity) -> Self {
        Self {
            location,
            message,
            severity,
        }
    }

    /// Which step the finding refers to, e.g. `steps/1`.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// The collected results of a mass-balance check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    is_valid: bool,
    results: Vec<ValidationResult>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            results: Vec::new(),
        }
    }

    pub fn add_result(&mut self, result: ValidationResult) {
        if result.severity == Severity::Error {
            self.is_valid = false;
        }
        self.results.push(result);
    }

    /// False only when an [`Severity::Error`] finding was recorded.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub fn has_warnings(&self) -> bool {
        self.results
            .iter()
            .any(|result| result.severity != Severity::Info)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks every step of a mechanism for elemental balance.
///
/// Mismatches are recorded as warnings naming the step and element;
/// steps containing undecomposable species names are skipped with an
/// informational result.
pub fn check_mass_balance(mechanism: &ReactionMechanism) -> Report {
    let mut report = Report::new();
    for (index, step) in mechanism.steps().iter().enumerate() {
        check_step(index, step, &mut report);
    }
    report
}

fn check_step(index: usize, step: &SimpleStep, report: &mut Report) {
    let location = format!("steps/{}", index);

    let lhs = side_elements(&[step.reactants(), step.liquid_solid_reactants()]);
    let rhs = side_elements(&[step.products(), step.liquid_solid_products()]);
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        report.add_result(ValidationResult::new(
            location,
            format!(
                "step '{}' contains species without a recognizable element formula; \
                 balance not checked",
                step
            ),
            Severity::Info,
        ));
        return;
    };

    let mut elements: Vec<&String> = lhs.keys().chain(rhs.keys()).collect();
    elements.sort();
    elements.dedup();

    for element in elements {
        let left = lhs.get(element).copied().unwrap_or_else(Rational64::zero);
        let right = rhs.get(element).copied().unwrap_or_else(Rational64::zero);
        if left != right {
            let message = format!(
                "step '{}' is unbalanced in element {}: {} on the left, {} on the right",
                step, element, left, right
            );
            log::warn!("{}: {}", location, message);
            report.add_result(ValidationResult::new(
                location.clone(),
                message,
                Severity::Warning,
            ));
        }
    }
}

/// Total element counts of one side, weighted by stoichiometric
/// coefficients. `None` when any species is not an element formula.
fn side_elements(maps: &[&StoichiometricMap]) -> Option<BTreeMap<String, Rational64>> {
    let mut totals: BTreeMap<String, Rational64> = BTreeMap::new();
    for map in maps {
        for (species, coefficient) in map.iter() {
            for (element, count) in element_counts(species)? {
                *totals.entry(element).or_insert_with(Rational64::zero) +=
                    *coefficient * Rational64::from_integer(count);
            }
        }
    }
    Some(totals)
}

/// Decomposes a species name into element counts; phase markers are
/// ignored. Returns `None` when the name is not a plain element formula.
fn element_counts(species: &str) -> Option<BTreeMap<String, i64>> {
    let name = species.replace("(l)", "").replace("(s)", "");
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();

    let mut rest = name.as_str();
    while !rest.is_empty() {
        let captures = ELEMENT_RE.captures(rest)?;
        let matched = captures.get(0)?;
        let element = captures.get(1)?.as_str().to_string();
        let count: i64 = match captures.get(2) {
            Some(digits) if !digits.as_str().is_empty() => digits.as_str().parse().ok()?,
            _ => 1,
        };
        *counts.entry(element).or_insert(0) += count;
        rest = &rest[matched.as_str().len()..];
    }

    Some(counts)
}
