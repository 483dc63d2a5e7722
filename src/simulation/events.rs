//! Mid-simulation perturbation events.
//!
//! An [`Event`] models an experimenter intervening at a fixed time, e.g.
//! adding reagent. Events are immutable, may be supplied in any order, and
//! are sorted by time before the integrator partitions the horizon.

use serde::{Deserialize, Serialize};

/// What happens to a species when an event fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReactionEvent {
    /// Adds `delta` to the species' last sampled concentration.
    ChangeConcentration { species: String, delta: f64 },
    /// Replaces the species' concentration with `value` outright.
    SetConcentration { species: String, value: f64 },
    /// Reserved ramp perturbation; rejected with
    /// [`SimulationError::NotImplemented`](crate::simulation::error::SimulationError::NotImplemented)
    /// until its semantics are specified.
    SmoothChangeConcentration { species: String, value: f64 },
}

impl ReactionEvent {
    /// The species targeted by this event.
    pub fn species(&self) -> &str {
        match self {
            ReactionEvent::ChangeConcentration { species, .. }
            | ReactionEvent::SetConcentration { species, .. }
            | ReactionEvent::SmoothChangeConcentration { species, .. } => species,
        }
    }
}

/// A perturbation scheduled at an absolute simulation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    pub kind: ReactionEvent,
}

impl Event {
    pub fn new(time: f64, kind: ReactionEvent) -> Self {
        Self { time, kind }
    }
}
