//! The capability surface shared by [`SimpleStep`](crate::step::SimpleStep)
//! and [`ReactionMechanism`](crate::mechanism::ReactionMechanism).
//!
//! The piecewise integrator only needs a system of per-species rate
//! expressions, so it is generic over this trait rather than inspecting
//! concrete model types.

use indexmap::IndexMap;

use crate::expression::RateExpr;

/// Anything that can derive a first-order differential equation system for
/// the time evolution of its species.
pub trait RateModel {
    /// One [`RateExpr`] per mass-action participant, keyed by species.
    fn differential_equations(&self) -> IndexMap<String, RateExpr>;

    /// The equation of a single species; the zero expression if the species
    /// takes no part in the model.
    fn differential_equation_of(&self, species: &str) -> RateExpr {
        let mut odes = self.differential_equations();
        odes.swap_remove(species).unwrap_or_else(RateExpr::zero)
    }
}
