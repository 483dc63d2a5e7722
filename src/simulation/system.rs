//! The compiled ODE system handed to the numerical steppers.
//!
//! Symbolic [`RateExpr`](crate::expression::RateExpr) trees are compiled
//! against the initial-state key order so that every concentration lookup
//! becomes an index into the state vector. Compilation fails up front when
//! an equation references a species missing from the initial state, which
//! keeps the stepper callback itself infallible.

use indexmap::IndexMap;
use ode_solvers::{DVector, System};

use crate::expression::RateExpr;

use super::error::SimulationError;

/// State vector of species concentrations, in initial-state key order.
pub(crate) type State = DVector<f64>;

/// A rate expression with species references resolved to state indices.
#[derive(Debug, Clone)]
enum CompiledExpr {
    Constant(f64),
    Concentration(usize),
    Power(Box<CompiledExpr>, f64),
    Product(Vec<CompiledExpr>),
    Sum(Vec<CompiledExpr>),
}

impl CompiledExpr {
    fn compile(
        expr: &RateExpr,
        index: &IndexMap<String, usize>,
        owner: &str,
    ) -> Result<Self, SimulationError> {
        match expr {
            RateExpr::Constant(value) => Ok(CompiledExpr::Constant(*value)),
            RateExpr::Concentration(species) => index
                .get(species)
                .map(|i| CompiledExpr::Concentration(*i))
                .ok_or_else(|| SimulationError::UnboundSpecies {
                    species: owner.to_string(),
                    unbound: species.clone(),
                }),
            RateExpr::Power(base, exponent) => Ok(CompiledExpr::Power(
                Box::new(Self::compile(base, index, owner)?),
                *exponent,
            )),
            RateExpr::Product(terms) => Ok(CompiledExpr::Product(
                terms
                    .iter()
                    .map(|term| Self::compile(term, index, owner))
                    .collect::<Result<_, _>>()?,
            )),
            RateExpr::Sum(terms) => Ok(CompiledExpr::Sum(
                terms
                    .iter()
                    .map(|term| Self::compile(term, index, owner))
                    .collect::<Result<_, _>>()?,
            )),
        }
    }

    fn eval(&self, y: &State) -> f64 {
        match self {
            CompiledExpr::Constant(value) => *value,
            CompiledExpr::Concentration(i) => y[*i],
            CompiledExpr::Power(base, exponent) => base.eval(y).powf(*exponent),
            CompiledExpr::Product(terms) => terms.iter().map(|term| term.eval(y)).product(),
            CompiledExpr::Sum(terms) => terms.iter().map(|term| term.eval(y)).sum(),
        }
    }
}

/// One compiled derivative per state-vector entry.
#[derive(Debug, Clone)]
pub(crate) struct MechanismSystem {
    odes: Vec<CompiledExpr>,
}

impl MechanismSystem {
    /// Compiles an ordered equation map; the map's key order defines the
    /// state-vector layout.
    pub(crate) fn new(equations: &IndexMap<String, RateExpr>) -> Result<Self, SimulationError> {
        let index: IndexMap<String, usize> = equations
            .keys()
            .enumerate()
            .map(|(i, species)| (species.clone(), i))
            .collect();

        let odes = equations
            .iter()
            .map(|(species, expr)| CompiledExpr::compile(expr, &index, species))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { odes })
    }
}

impl System<f64, State> for MechanismSystem {
    fn system(&self, _t: f64, y: &State, dy: &mut State) {
        for (i, ode) in self.odes.iter().enumerate() {
            dy[i] = ode.eval(y);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::model::RateModel;
    use crate::step::SimpleStep;

    use super::*;

    #[test]
    fn test_compiled_system_matches_symbolic_evaluation() {
        let mut step: SimpleStep = "A+B->C".parse().unwrap();
        step.set_rate_constants(2.0, 0.5);

        let equations = step.differential_equations();
        let system = MechanismSystem::new(&equations).unwrap();

        let y = DVector::from_vec(vec![3.0, 4.0, 5.0]);
        let mut dy = DVector::from_vec(vec![0.0; 3]);
        system.system(0.0, &y, &mut dy);

        let bindings: IndexMap<String, f64> = equations
            .keys()
            .cloned()
            .zip(y.iter().copied())
            .collect();
        for (i, (_, expr)) in equations.iter().enumerate() {
            assert_relative_eq!(dy[i], expr.evaluate(&bindings).unwrap());
        }
    }

    #[test]
    fn test_unbound_reference_fails_compilation() {
        let mut step: SimpleStep = "A+B->C".parse().unwrap();
        step.set_rate_constants(1.0, 0.0);

        // Only A and C in the system: the equations still reference B.
        let mut equations = step.differential_equations();
        equations.swap_remove("B");

        let err = MechanismSystem::new(&equations).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::UnboundSpecies { ref unbound, .. } if unbound == "B"
        ));
    }
}
