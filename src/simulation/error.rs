//! Error types for the piecewise integrator.
//!
//! Every variant names the step, species or time range that caused the
//! failure; there is no silent coercion of invalid arguments or missing
//! species, and a solver failure aborts the whole call rather than
//! returning a truncated trajectory.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("species '{species}' is not present in the initial state")]
    KeyMissing { species: String },
    #[error("no rate equation is available for species '{species}'")]
    UnknownSpecies { species: String },
    #[error(
        "rate equation for '{species}' references '{unbound}', \
         which is not in the initial state"
    )]
    UnboundSpecies { species: String, unbound: String },
    #[error("integration failed over [{start}, {end}]: {reason}")]
    IntegrationFailure {
        start: f64,
        end: f64,
        reason: String,
    },
    #[error("smooth concentration changes are not implemented")]
    NotImplemented,
}
