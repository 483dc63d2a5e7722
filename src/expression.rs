//! Symbolic rate expressions.
//!
//! A [`RateExpr`] represents the instantaneous derivative of one species'
//! concentration as an expression tree over named concentrations. Trees from
//! several elementary steps are composed symbolically with [`RateExpr::sum`]
//! before anything is evaluated, so individual rate terms stay inspectable
//! and unit-testable.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("species '{species}' is not bound to a concentration value")]
    UnboundSpecies { species: String },
}

/// A symbolic expression over species concentrations.
#[derive(Debug, Clone, PartialEq)]
pub enum RateExpr {
    /// A numeric constant, e.g. a signed `coefficient * rate constant` factor
    Constant(f64),
    /// The concentration of a named species
    Concentration(String),
    /// A subexpression raised to a fixed exponent
    Power(Box<RateExpr>, f64),
    /// The product of subexpressions
    Product(Vec<RateExpr>),
    /// The sum of subexpressions
    Sum(Vec<RateExpr>),
}

impl RateExpr {
    /// The zero expression, the additive identity of [`RateExpr::sum`].
    pub fn zero() -> Self {
        RateExpr::Constant(0.0)
    }

    /// References the concentration of `species`.
    pub fn concentration(species: impl Into<String>) -> Self {
        RateExpr::Concentration(species.into())
    }

    /// Sums expressions symbolically, flattening nested sums.
    ///
    /// This is pure AST composition: nothing is evaluated until
    /// [`RateExpr::evaluate`] is called with a concentration binding.
    pub fn sum(terms: impl IntoIterator<Item = RateExpr>) -> Self {
        let mut flat: Vec<RateExpr> = Vec::new();
        for term in terms {
            match term {
                RateExpr::Sum(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.is_empty() {
            Self::zero()
        } else if flat.len() == 1 {
            flat.swap_remove(0)
        } else {
            RateExpr::Sum(flat)
        }
    }

    /// Evaluates the expression against a complete binding of species
    /// concentrations.
    ///
    /// Every species referenced in the tree must be present in `bindings`;
    /// otherwise evaluation fails with [`ExpressionError::UnboundSpecies`].
    pub fn evaluate(&self, bindings: &IndexMap<String, f64>) -> Result<f64, ExpressionError> {
        match self {
            RateExpr::Constant(value) => Ok(*value),
            RateExpr::Concentration(species) => {
                bindings
                    .get(species)
                    .copied()
                    .ok_or_else(|| ExpressionError::UnboundSpecies {
                        species: species.clone(),
                    })
            }
            RateExpr::Power(base, exponent) => Ok(base.evaluate(bindings)?.powf(*exponent)),
            RateExpr::Product(terms) => terms
                .iter()
                .try_fold(1.0, |acc, term| Ok(acc * term.evaluate(bindings)?)),
            RateExpr::Sum(terms) => terms
                .iter()
                .try_fold(0.0, |acc, term| Ok(acc + term.evaluate(bindings)?)),
        }
    }

    /// The set of species referenced anywhere in the tree.
    pub fn species(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_species(&mut out);
        out
    }

    fn collect_species<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            RateExpr::Constant(_) => {}
            RateExpr::Concentration(species) => {
                out.insert(species.as_str());
            }
            RateExpr::Power(base, _) => base.collect_species(out),
            RateExpr::Product(terms) | RateExpr::Sum(terms) => {
                for term in terms {
                    term.collect_species(out);
                }
            }
        }
    }
}

impl fmt::Display for RateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateExpr::Constant(value) => write!(f, "{}", value),
            RateExpr::Concentration(species) => write!(f, "[{}]", species),
            RateExpr::Power(base, exponent) => write!(f, "{}^{}", base, exponent),
            RateExpr::Product(terms) => {
                let rendered = terms
                    .iter()
                    .map(|term| match term {
                        RateExpr::Sum(_) => format!("({})", term),
                        other => other.to_string(),
                    })
                    .join("*");
                write!(f, "{}", rendered)
            }
            RateExpr::Sum(terms) => write!(f, "{}", terms.iter().join(" + ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn bindings(values: &[(&str, f64)]) -> IndexMap<String, f64> {
        values
            .iter()
            .map(|(species, value)| (species.to_string(), *value))
            .collect()
    }

    #[test]
    fn test_evaluate_mass_action_term() {
        // -2 * [A]^2 * [B]
        let expr = RateExpr::Product(vec![
            RateExpr::Constant(-2.0),
            RateExpr::Power(Box::new(RateExpr::concentration("A")), 2.0),
            RateExpr::Power(Box::new(RateExpr::concentration("B")), 1.0),
        ]);

        let value = expr.evaluate(&bindings(&[("A", 3.0), ("B", 4.0)])).unwrap();
        assert_relative_eq!(value, -72.0);
    }

    #[test]
    fn test_unbound_species_fails() {
        let expr = RateExpr::concentration("A");
        let err = expr.evaluate(&bindings(&[("B", 1.0)])).unwrap_err();
        assert_eq!(
            err,
            ExpressionError::UnboundSpecies {
                species: "A".to_string()
            }
        );
    }

    #[test]
    fn test_sum_is_symbolic_composition() {
        let left = RateExpr::concentration("A");
        let right = RateExpr::Sum(vec![RateExpr::concentration("B"), RateExpr::Constant(1.0)]);

        let combined = RateExpr::sum([left, right]);

        // Nested sums are flattened, not evaluated
        assert_eq!(
            combined,
            RateExpr::Sum(vec![
                RateExpr::concentration("A"),
                RateExpr::concentration("B"),
                RateExpr::Constant(1.0),
            ])
        );
    }

    #[test]
    fn test_empty_sum_is_zero() {
        let expr = RateExpr::sum([]);
        assert_eq!(expr, RateExpr::zero());
        assert_relative_eq!(expr.evaluate(&IndexMap::new()).unwrap(), 0.0);
    }

    #[test]
    fn test_species_collection() {
        let expr = RateExpr::Sum(vec![
            RateExpr::Product(vec![
                RateExpr::Constant(0.5),
                RateExpr::concentration("A"),
                RateExpr::Power(Box::new(RateExpr::concentration("B")), 2.0),
            ]),
            RateExpr::concentration("C"),
        ]);

        let species: Vec<&str> = expr.species().into_iter().collect();
        assert_eq!(species, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_display() {
        let expr = RateExpr::Product(vec![
            RateExpr::Constant(-1.0),
            RateExpr::Power(Box::new(RateExpr::concentration("A")), 1.0),
        ]);
        assert_eq!(expr.to_string(), "-1*[A]^1");
    }
}
