//! Simulation configuration.
//!
//! [`SimulationSetup`] carries the time horizon, the fixed-grid resolution
//! and the error tolerances of the adaptive stepper. Adaptive mode is the
//! recommended default for event-heavy simulations because fixed-grid mode
//! discretizes event times onto the sample grid (see
//! [`runner`](crate::simulation::runner)).

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use super::error::SimulationError;

/// Which numerical strategy advances a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Method {
    /// Classic fixed-step Runge-Kutta on a uniform sample grid of
    /// `resolution` steps over the horizon. Event times are rounded to the
    /// nearest grid multiple.
    #[default]
    FixedStep,
    /// Adaptive Dormand-Prince stepping controlled by `rtol`/`atol`;
    /// `resolution` only sets the output sample spacing, and event times
    /// are honored exactly.
    Adaptive,
}

/// Configuration for one `simulate` call.
///
/// # Examples
///
/// ```
/// use reaction_mechanizer::prelude::{Method, SimulationSetupBuilder};
///
/// let setup = SimulationSetupBuilder::default()
///     .t_end(1000.0)
///     .resolution(1000_usize)
///     .method(Method::Adaptive)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct SimulationSetup {
    /// End of the simulation horizon; integration always starts at 0.
    #[builder(default = "10.0")]
    pub t_end: f64,
    /// Number of uniform grid steps over the horizon.
    #[builder(default = "1000")]
    pub resolution: usize,
    /// Relative tolerance of the adaptive stepper.
    #[builder(default = "1e-6")]
    pub rtol: f64,
    /// Absolute tolerance of the adaptive stepper.
    #[builder(default = "1e-8")]
    pub atol: f64,
    #[builder(default)]
    pub method: Method,
}

impl Default for SimulationSetup {
    fn default() -> Self {
        Self {
            t_end: 10.0,
            resolution: 1000,
            rtol: 1e-6,
            atol: 1e-8,
            method: Method::default(),
        }
    }
}

impl SimulationSetup {
    /// The global sample grid spacing, `t_end / resolution`.
    pub(crate) fn grid_spacing(&self) -> f64 {
        self.t_end / self.resolution as f64
    }

    pub(crate) fn validate(&self) -> Result<(), SimulationError> {
        if !self.t_end.is_finite() || self.t_end <= 0.0 {
            return Err(SimulationError::InvalidArgument(format!(
                "time horizon must be positive and finite, got {}",
                self.t_end
            )));
        }
        if self.resolution == 0 {
            return Err(SimulationError::InvalidArgument(
                "resolution must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
