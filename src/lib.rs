//! Reaction Mechanizer
//!
//! This library models chemical reaction kinetics under mass-action law:
//! - Parsing chemical equations and multi-step mechanisms
//! - Deriving systems of first-order differential equations
//! - Simulating concentration trajectories, including scheduled
//!   mid-simulation perturbations (events)
//! - Diagnosing mass-balance issues in a mechanism
//!
//! Rendering, tabulation and I/O are left to consumers of the produced
//! [`Trajectory`](crate::simulation::result::Trajectory).

#![warn(unused_imports)]

/// Commonly used types and functionality re-exported for convenience
pub mod prelude {
    pub use crate::expression::*;
    pub use crate::mechanism::*;
    pub use crate::model::*;
    pub use crate::parse::*;
    pub use crate::step::*;
    pub use crate::validation::*;

    pub use crate::simulation::error::*;
    pub use crate::simulation::events::*;
    pub use crate::simulation::result::*;
    pub use crate::simulation::runner::*;
    pub use crate::simulation::setup::*;
}

/// Symbolic rate expressions and their evaluation
pub mod expression;

/// Parsing of the chemical equation grammar
pub mod parse;

/// The capability surface shared by steps and mechanisms
pub mod model;

/// Single elementary reaction steps
pub mod step;

/// Multi-step reaction mechanisms
pub mod mechanism;

/// Mass-balance diagnostics
pub mod validation;

/// Event-driven piecewise ODE integration
pub mod simulation {
    /// Error types for simulation failures
    pub mod error;
    /// Mid-simulation perturbation events
    pub mod events;
    /// Trajectory data structures
    pub mod result;
    /// The piecewise integration loop
    pub mod runner;
    /// Simulation configuration
    pub mod setup;
    /// Compiled ODE system fed to the numerical steppers
    pub(crate) mod system;
}
