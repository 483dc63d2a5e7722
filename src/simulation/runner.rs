//! The event-driven piecewise integration loop.
//!
//! The simulation horizon `[0, t_end]` is partitioned at the event times;
//! each segment is advanced by the configured numerical strategy with the
//! previous segment's final state (after applying the event) as its initial
//! condition, and the per-segment samples are stitched into one contiguous
//! trajectory.
//!
//! In fixed-grid mode both the event times and the per-segment sample
//! counts are discretized to the global `t_end / resolution` grid, so that
//! segment boundaries land on the same grid as an un-segmented run. The
//! rounding can accumulate drift across many events; adaptive mode honors
//! event times exactly and is the recommended choice for event-heavy
//! simulations.

use indexmap::IndexMap;
use ode_solvers::{DVector, Dopri5, Rk4};

use crate::expression::RateExpr;
use crate::model::RateModel;

use super::error::SimulationError;
use super::events::{Event, ReactionEvent};
use super::result::Trajectory;
use super::setup::{Method, SimulationSetup};
use super::system::{MechanismSystem, State};

/// Complete, ordered mapping from species to initial concentration. Its
/// key order fixes the trajectory's column order.
pub type InitialState = IndexMap<String, f64>;

/// Per-species substitutions for derived rate equations, for models not
/// expressible via mass action.
pub type OdeOverrides = IndexMap<String, RateExpr>;

/// Simulates the time evolution of `model` from `initial_state` over
/// `[0, setup.t_end]`, applying `events` between segments.
///
/// Every key of `initial_state` must have a derived (or overridden) rate
/// equation, and every species referenced by the evaluated equations, the
/// events and the overrides must be a key of `initial_state`. Solver
/// failures abort the whole call; no partial trajectory is returned.
pub fn simulate<M: RateModel>(
    model: &M,
    initial_state: &InitialState,
    setup: &SimulationSetup,
    events: &[Event],
    overrides: Option<&OdeOverrides>,
) -> Result<Trajectory, SimulationError> {
    setup.validate()?;
    if initial_state.is_empty() {
        return Err(SimulationError::InvalidArgument(
            "initial state must not be empty".to_string(),
        ));
    }

    let mut equations = model.differential_equations();
    if let Some(overrides) = overrides {
        for (species, expr) in overrides {
            if !initial_state.contains_key(species) {
                return Err(SimulationError::KeyMissing {
                    species: species.clone(),
                });
            }
            equations.insert(species.clone(), expr.clone());
        }
    }

    // Restrict to the requested species, in initial-state key order.
    let mut ordered: IndexMap<String, RateExpr> = IndexMap::with_capacity(initial_state.len());
    for species in initial_state.keys() {
        let expr = equations
            .get(species)
            .ok_or_else(|| SimulationError::UnknownSpecies {
                species: species.clone(),
            })?;
        ordered.insert(species.clone(), expr.clone());
    }
    let system = MechanismSystem::new(&ordered)?;

    let schedule = validated_schedule(events, initial_state, setup)?;

    let mut trajectory = Trajectory::new(initial_state.keys().cloned());
    let mut state: State =
        DVector::from_iterator(initial_state.len(), initial_state.values().copied());
    let mut prev_time = 0.0;

    for event in &schedule {
        let segment_end = match setup.method {
            Method::FixedStep => discretize(event.time, setup.grid_spacing()),
            Method::Adaptive => event.time,
        };
        if segment_end > prev_time {
            state = integrate_segment(&system, setup, prev_time, segment_end, state, &mut trajectory)?;
            prev_time = segment_end;
        }
        apply_event(&event.kind, initial_state, &mut state)?;
    }

    // Synthetic terminal no-op closes the final segment.
    if setup.t_end > prev_time {
        integrate_segment(&system, setup, prev_time, setup.t_end, state, &mut trajectory)?;
    }

    Ok(trajectory)
}

/// Sorts the events by time and rejects contract violations up front:
/// out-of-horizon times, unknown target species and the unimplemented
/// ramp perturbation.
fn validated_schedule(
    events: &[Event],
    initial_state: &InitialState,
    setup: &SimulationSetup,
) -> Result<Vec<Event>, SimulationError> {
    for event in events {
        if !event.time.is_finite() || event.time < 0.0 || event.time > setup.t_end {
            return Err(SimulationError::InvalidArgument(format!(
                "event time {} lies outside the horizon [0, {}]",
                event.time, setup.t_end
            )));
        }
        if matches!(event.kind, ReactionEvent::SmoothChangeConcentration { .. }) {
            return Err(SimulationError::NotImplemented);
        }
        let species = event.kind.species();
        if !initial_state.contains_key(species) {
            return Err(SimulationError::KeyMissing {
                species: species.to_string(),
            });
        }
    }

    let mut schedule = events.to_vec();
    schedule.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(schedule)
}

/// Rounds a time to the nearest multiple of the global grid spacing.
fn discretize(time: f64, grid_spacing: f64) -> f64 {
    (time / grid_spacing).round() * grid_spacing
}

/// Advances one segment and appends its samples, skipping the boundary
/// sample that the previous segment already contributed. Returns the
/// segment's final state.
fn integrate_segment(
    system: &MechanismSystem,
    setup: &SimulationSetup,
    t0: f64,
    t1: f64,
    y0: State,
    trajectory: &mut Trajectory,
) -> Result<State, SimulationError> {
    match setup.method {
        Method::FixedStep => {
            // Segment sample count on the global grid, per the span's share
            // of the horizon.
            let n_steps = ((t1 - t0) / setup.t_end * setup.resolution as f64).round() as usize;
            if n_steps == 0 {
                return Ok(y0);
            }
            let step = (t1 - t0) / n_steps as f64;
            log::debug!(
                "integrating [{}, {}] with {} fixed steps of {}",
                t0,
                t1,
                n_steps,
                step
            );

            let mut stepper = Rk4::new(system.clone(), t0, y0, t1, step);
            stepper
                .integrate()
                .map_err(|err| SimulationError::IntegrationFailure {
                    start: t0,
                    end: t1,
                    reason: err.to_string(),
                })?;
            append_samples(stepper.x_out(), stepper.y_out(), t0, t1, trajectory)
        }
        Method::Adaptive => {
            // Output spacing close to the global grid, adjusted to divide
            // the segment span so the final sample lands on the boundary.
            let samples = ((t1 - t0) / setup.grid_spacing()).round().max(1.0);
            let dx = (t1 - t0) / samples;
            log::debug!("integrating [{}, {}] adaptively, output spacing {}", t0, t1, dx);

            let mut stepper =
                Dopri5::new(system.clone(), t0, t1, dx, y0, setup.rtol, setup.atol);
            stepper
                .integrate()
                .map_err(|err| SimulationError::IntegrationFailure {
                    start: t0,
                    end: t1,
                    reason: err.to_string(),
                })?;
            append_samples(stepper.x_out(), stepper.y_out(), t0, t1, trajectory)
        }
    }
}

fn append_samples(
    times: &[f64],
    states: &[State],
    t0: f64,
    t1: f64,
    trajectory: &mut Trajectory,
) -> Result<State, SimulationError> {
    // The previous segment already sampled this boundary.
    let skip = usize::from(!trajectory.is_empty());
    for (time, y) in times.iter().zip(states).skip(skip) {
        trajectory.push_sample(*time, y);
    }

    states
        .last()
        .cloned()
        .ok_or_else(|| SimulationError::IntegrationFailure {
            start: t0,
            end: t1,
            reason: "solver produced no output".to_string(),
        })
}

/// Applies an event to the final state of the segment that just ended.
fn apply_event(
    kind: &ReactionEvent,
    initial_state: &InitialState,
    state: &mut State,
) -> Result<(), SimulationError> {
    let index = initial_state
        .get_index_of(kind.species())
        .ok_or_else(|| SimulationError::KeyMissing {
            species: kind.species().to_string(),
        })?;

    match kind {
        ReactionEvent::ChangeConcentration { delta, .. } => {
            state[index] += delta;
        }
        ReactionEvent::SetConcentration { value, .. } => {
            state[index] = *value;
        }
        ReactionEvent::SmoothChangeConcentration { .. } => {
            return Err(SimulationError::NotImplemented);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::mechanism::ReactionMechanism;
    use crate::step::SimpleStep;

    use super::*;

    fn initial_state(values: &[(&str, f64)]) -> InitialState {
        values
            .iter()
            .map(|(species, value)| (species.to_string(), *value))
            .collect()
    }

    fn decay_step(kf: f64) -> SimpleStep {
        let mut step: SimpleStep = "A->B".parse().unwrap();
        step.set_rate_constants(kf, 0.0);
        step
    }

    fn setup(t_end: f64, resolution: usize, method: Method) -> SimulationSetup {
        SimulationSetup {
            t_end,
            resolution,
            method,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_order_decay_accuracy() {
        let step = decay_step(1.0);
        let state = initial_state(&[("A", 1.0), ("B", 0.0)]);

        let trajectory = simulate(
            &step,
            &state,
            &setup(5.0, 500, Method::FixedStep),
            &[],
            None,
        )
        .unwrap();

        assert_eq!(trajectory.len(), 501);
        assert_relative_eq!(
            trajectory.final_concentration("A").unwrap(),
            (-5.0_f64).exp(),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            trajectory.final_concentration("B").unwrap(),
            1.0 - (-5.0_f64).exp(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_segmented_run_keeps_global_sample_count() {
        let step = decay_step(0.05);
        let state = initial_state(&[("A", 1.0), ("B", 0.0)]);
        let events = vec![Event::new(
            33.3,
            ReactionEvent::ChangeConcentration {
                species: "A".to_string(),
                delta: 0.25,
            },
        )];

        let trajectory = simulate(
            &step,
            &state,
            &setup(100.0, 100, Method::FixedStep),
            &events,
            None,
        )
        .unwrap();

        // Same count as an un-segmented run, strictly increasing times.
        assert_eq!(trajectory.len(), 101);
        for window in trajectory.time().windows(2) {
            assert!(window[1] > window[0]);
        }
    }

    #[test]
    fn test_change_adds_and_set_replaces() {
        // kf = 0 freezes the dynamics so event arithmetic is exact.
        let step = decay_step(0.0);
        let state = initial_state(&[("A", 1.0), ("B", 0.0)]);

        let change = vec![Event::new(
            5.0,
            ReactionEvent::ChangeConcentration {
                species: "A".to_string(),
                delta: 2.0,
            },
        )];
        let trajectory = simulate(
            &step,
            &state,
            &setup(10.0, 100, Method::FixedStep),
            &change,
            None,
        )
        .unwrap();
        assert_relative_eq!(trajectory.final_concentration("A").unwrap(), 3.0);

        let set = vec![Event::new(
            5.0,
            ReactionEvent::SetConcentration {
                species: "A".to_string(),
                value: 2.0,
            },
        )];
        let trajectory = simulate(
            &step,
            &state,
            &setup(10.0, 100, Method::FixedStep),
            &set,
            None,
        )
        .unwrap();
        assert_relative_eq!(trajectory.final_concentration("A").unwrap(), 2.0);
    }

    #[test]
    fn test_events_are_sorted_before_use() {
        let step = decay_step(0.0);
        let state = initial_state(&[("A", 0.0), ("B", 0.0)]);
        // Supplied out of order: set to 5 at t=2, then add 1 at t=6.
        let events = vec![
            Event::new(
                6.0,
                ReactionEvent::ChangeConcentration {
                    species: "A".to_string(),
                    delta: 1.0,
                },
            ),
            Event::new(
                2.0,
                ReactionEvent::SetConcentration {
                    species: "A".to_string(),
                    value: 5.0,
                },
            ),
        ];

        let trajectory = simulate(
            &step,
            &state,
            &setup(10.0, 100, Method::FixedStep),
            &events,
            None,
        )
        .unwrap();
        assert_relative_eq!(trajectory.final_concentration("A").unwrap(), 6.0);
    }

    #[test]
    fn test_ode_override_replaces_derived_equation() {
        let step = decay_step(1.0);
        let state = initial_state(&[("A", 1.0), ("B", 0.0)]);

        // Hold B constant regardless of what the mechanism says.
        let overrides: OdeOverrides =
            [("B".to_string(), RateExpr::zero())].into_iter().collect();

        let trajectory = simulate(
            &step,
            &state,
            &setup(5.0, 500, Method::FixedStep),
            &[],
            Some(&overrides),
        )
        .unwrap();

        assert_relative_eq!(trajectory.final_concentration("B").unwrap(), 0.0);
        assert_relative_eq!(
            trajectory.final_concentration("A").unwrap(),
            (-5.0_f64).exp(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_override_for_unknown_species_is_key_missing() {
        let step = decay_step(1.0);
        let state = initial_state(&[("A", 1.0), ("B", 0.0)]);
        let overrides: OdeOverrides =
            [("C".to_string(), RateExpr::zero())].into_iter().collect();

        let err = simulate(
            &step,
            &state,
            &setup(5.0, 100, Method::FixedStep),
            &[],
            Some(&overrides),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::KeyMissing { ref species } if species == "C"
        ));
    }

    #[test]
    fn test_event_for_unknown_species_is_key_missing() {
        let step = decay_step(1.0);
        let state = initial_state(&[("A", 1.0), ("B", 0.0)]);
        let events = vec![Event::new(
            1.0,
            ReactionEvent::ChangeConcentration {
                species: "C".to_string(),
                delta: 1.0,
            },
        )];

        let err = simulate(
            &step,
            &state,
            &setup(5.0, 100, Method::FixedStep),
            &events,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SimulationError::KeyMissing { .. }));
    }

    #[test]
    fn test_initial_state_species_without_equation_fails() {
        let step = decay_step(1.0);
        let state = initial_state(&[("A", 1.0), ("B", 0.0), ("Z", 1.0)]);

        let err = simulate(
            &step,
            &state,
            &setup(5.0, 100, Method::FixedStep),
            &[],
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::UnknownSpecies { ref species } if species == "Z"
        ));
    }

    #[test]
    fn test_equation_referencing_missing_species_fails() {
        let mut step: SimpleStep = "A+B->C".parse().unwrap();
        step.set_rate_constants(1.0, 0.0);
        // B participates in the rate law but is not part of the state.
        let state = initial_state(&[("A", 1.0), ("C", 0.0)]);

        let err = simulate(
            &step,
            &state,
            &setup(5.0, 100, Method::FixedStep),
            &[],
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::UnboundSpecies { ref unbound, .. } if unbound == "B"
        ));
    }

    #[test]
    fn test_smooth_change_fails_loudly() {
        let step = decay_step(1.0);
        let state = initial_state(&[("A", 1.0), ("B", 0.0)]);
        let events = vec![Event::new(
            1.0,
            ReactionEvent::SmoothChangeConcentration {
                species: "A".to_string(),
                value: 2.0,
            },
        )];

        let err = simulate(
            &step,
            &state,
            &setup(5.0, 100, Method::FixedStep),
            &events,
            None,
        )
        .unwrap_err();
        assert_eq!(err, SimulationError::NotImplemented);
    }

    #[test]
    fn test_invalid_arguments() {
        let step = decay_step(1.0);
        let state = initial_state(&[("A", 1.0), ("B", 0.0)]);

        assert!(matches!(
            simulate(&step, &state, &setup(0.0, 100, Method::FixedStep), &[], None),
            Err(SimulationError::InvalidArgument(_))
        ));
        assert!(matches!(
            simulate(&step, &state, &setup(5.0, 0, Method::FixedStep), &[], None),
            Err(SimulationError::InvalidArgument(_))
        ));

        let late = vec![Event::new(
            99.0,
            ReactionEvent::ChangeConcentration {
                species: "A".to_string(),
                delta: 1.0,
            },
        )];
        assert!(matches!(
            simulate(&step, &state, &setup(5.0, 100, Method::FixedStep), &late, None),
            Err(SimulationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mechanism_is_usable_through_the_same_entry_point() {
        let mut mechanism: ReactionMechanism = "A->X\nX->B".parse().unwrap();
        mechanism.set_rate_constants(&[(1.0, 0.0).into(), (1.0, 0.0).into()]);
        let state = initial_state(&[("A", 1.0), ("X", 0.0), ("B", 0.0)]);

        let trajectory = simulate(
            &mechanism,
            &state,
            &setup(20.0, 2000, Method::FixedStep),
            &[],
            None,
        )
        .unwrap();

        // Mass conservation: everything ends up in B.
        assert_relative_eq!(
            trajectory.final_concentration("B").unwrap(),
            1.0,
            epsilon = 1e-3
        );
        let names: Vec<&str> = trajectory.species_names().collect();
        assert_eq!(names, vec!["A", "X", "B"]);
    }
}
