//! Numerical evaluation of a [`Model`].
//!
//! [`evaluate`] is the single entry point the fitting code uses to turn a model
//! and a set of parameter overrides into a [`CombinedOutput`]. Two modes are
//! supported:
//!
//! - [`Mode::SteadyState`]: integrate from the initial condition until all
//!   derivatives vanish (within `steady_state_tol`) and return a single row.
//! - [`Mode::TimeCourse`]: integrate from `t0` and record a row at each
//!   requested time point. Steps are clipped so that the integrator lands
//!   exactly on every requested time; no interpolation is performed.
//!
//! Integration uses the fixed-step integrators of `peroxide` (`RK4`, `RK5`,
//! `RALS3`, `RALS4`); see [`FixedStepIntegrator`].

use ndarray::Array2;
use peroxide::fuga::{ODEIntegrator, ODEProblem, RALS3, RALS4, RK4, RK5};

use crate::model::Model;
use crate::parameters::ParameterVector;

use super::error::SimulationError;
use super::output::CombinedOutput;
use super::setup::SimulationSetup;

/// What to compute when evaluating a model.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Integrate until the steady state is reached
    SteadyState,
    /// Record the trajectory at the given time points
    TimeCourse(Vec<f64>),
}

/// Integrators that always advance by exactly the requested step.
///
/// The clock is advanced by the step passed to [`ODEIntegrator::step`], which is
/// only correct if the integrator never shrinks that step internally. The
/// embedded pairs of `peroxide` (`BS23`, `RKF45`, `DP45`, `TSIT45`) do, and do
/// not report the accepted step, so they do not implement this trait.
pub trait FixedStepIntegrator: ODEIntegrator + Copy {}

impl FixedStepIntegrator for RK4 {}
impl FixedStepIntegrator for RK5 {}
impl FixedStepIntegrator for RALS3 {}
impl FixedStepIntegrator for RALS4 {}

/// ODE right-hand side of a model with a fixed set of parameter values.
pub(crate) struct ModelOde<'a> {
    model: &'a Model,
    parameters: &'a [f64],
}

impl<'a> ModelOde<'a> {
    pub(crate) fn new(model: &'a Model, parameters: &'a [f64]) -> Self {
        Self { model, parameters }
    }
}

impl ODEProblem for ModelOde<'_> {
    fn rhs(&self, t: f64, y: &[f64], dy: &mut [f64]) -> Result<(), argmin::core::Error> {
        self.model.derivatives_into(t, y, self.parameters, dy);
        Ok(())
    }
}

/// Evaluates a model with the given parameter overrides.
///
/// Parameters not present in `parameters` keep the model defaults.
///
/// # Arguments
/// * `model` - Model to evaluate
/// * `parameters` - Parameter overrides by name
/// * `mode` - Steady state or time course
/// * `setup` - Integration settings
/// * `solver` - ODE integrator
///
/// # Returns
/// * `Ok(CombinedOutput)` - One column per variable and flux
/// * `Err(SimulationError)` - If a parameter is unknown or the integration fails
///
/// # Example
///
/// ```
/// use kinfit::prelude::*;
///
/// let model = Model::builder()
///     .parameter("k", 2.0)
///     .variable("x", 0.0)
///     .reaction("v_in", |_| 1.0, [("x", 1.0)])
///     .reaction("v_out", |c| c.get("k") * c.get("x"), [("x", -1.0)])
///     .build()
///     .unwrap();
///
/// let output = evaluate(
///     &model,
///     &ParameterVector::new(),
///     &Mode::SteadyState,
///     &SimulationSetup::default(),
///     RK4,
/// )
/// .unwrap();
///
/// assert!((output.get("x").unwrap()[0] - 0.5).abs() < 1e-8);
/// ```
pub fn evaluate<S: FixedStepIntegrator>(
    model: &Model,
    parameters: &ParameterVector,
    mode: &Mode,
    setup: &SimulationSetup,
    solver: S,
) -> Result<CombinedOutput, SimulationError> {
    let mut values = model.parameter_values().to_vec();
    for (name, value) in parameters.iter() {
        let index = model
            .parameter_index(name)
            .ok_or_else(|| SimulationError::UnknownParameter(name.to_string()))?;
        values[index] = value;
    }

    evaluate_values(model, &values, mode, setup, solver)
}

/// Evaluates a model with a full parameter value vector.
///
/// `parameters` must be aligned with [`Model::parameter_names`].
pub(crate) fn evaluate_values<S: FixedStepIntegrator>(
    model: &Model,
    parameters: &[f64],
    mode: &Mode,
    setup: &SimulationSetup,
    solver: S,
) -> Result<CombinedOutput, SimulationError> {
    if parameters.len() != model.parameter_names().len() {
        return Err(SimulationError::ParameterLength {
            expected: model.parameter_names().len(),
            found: parameters.len(),
        });
    }

    validate_step_size(setup.dt)?;

    let problem = ModelOde::new(model, parameters);

    match mode {
        Mode::SteadyState => {
            let (t, y) = integrate_to_steady_state(&problem, model, setup, &solver)?;
            Ok(collect_rows(model, parameters, vec![t], &[y]))
        }
        Mode::TimeCourse(times) => {
            let states = integrate_on_grid(&problem, model, times, setup, &solver)?;
            Ok(collect_rows(model, parameters, times.clone(), &states))
        }
    }
}

/// Integrates until `max |dy/dt| <= steady_state_tol` or `t_max` is exceeded.
fn integrate_to_steady_state<S: ODEIntegrator>(
    problem: &ModelOde,
    model: &Model,
    setup: &SimulationSetup,
    solver: &S,
) -> Result<(f64, Vec<f64>), SimulationError> {
    let mut t = setup.t0;
    let mut y = model.initial_conditions().to_vec();
    let mut dy = vec![0.0; y.len()];

    loop {
        model.derivatives_into(t, &y, problem.parameters, &mut dy);
        if dy.iter().any(|d| !d.is_finite()) {
            return Err(SimulationError::NonFinite { t });
        }

        let max_derivative = dy.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));

        if max_derivative <= setup.steady_state_tol {
            return Ok((t, y));
        }

        if t >= setup.t_max {
            return Err(SimulationError::SteadyStateNotReached {
                t_max: setup.t_max,
                max_derivative,
            });
        }

        let h = setup.dt.min(setup.t_max - t);
        t = step(problem, solver, t, &mut y, h)?;
    }
}

/// Integrates from `t0` and records the state at each requested time point.
fn integrate_on_grid<S: ODEIntegrator>(
    problem: &ModelOde,
    model: &Model,
    times: &[f64],
    setup: &SimulationSetup,
    solver: &S,
) -> Result<Vec<Vec<f64>>, SimulationError> {
    validate_time_points(times, setup.t0)?;

    let mut t = setup.t0;
    let mut y = model.initial_conditions().to_vec();
    let mut states = Vec::with_capacity(times.len());

    for &target in times {
        while t < target {
            let remaining = target - t;
            if remaining <= setup.dt {
                step(problem, solver, t, &mut y, remaining)?;
                t = target;
            } else {
                t = step(problem, solver, t, &mut y, setup.dt)?;
            }
        }
        states.push(y.clone());
    }

    Ok(states)
}

/// Checks that the step size is positive and finite.
pub(crate) fn validate_step_size(dt: f64) -> Result<(), SimulationError> {
    if !(dt.is_finite() && dt > 0.0) {
        return Err(SimulationError::InvalidStepSize(dt));
    }
    Ok(())
}

/// Checks that time points are finite, strictly increasing and not before `t0`.
pub(crate) fn validate_time_points(times: &[f64], t0: f64) -> Result<(), SimulationError> {
    let valid = times.iter().all(|t| t.is_finite())
        && times.windows(2).all(|w| w[1] > w[0])
        && times.first().map_or(true, |first| *first >= t0);

    if !valid {
        return Err(SimulationError::InvalidTimePoints { t0 });
    }
    Ok(())
}

/// Performs a single integrator step and returns the new time.
fn step<S: ODEIntegrator>(
    problem: &ModelOde,
    solver: &S,
    t: f64,
    y: &mut [f64],
    h: f64,
) -> Result<f64, SimulationError> {
    solver
        .step(problem, t, y, h)
        .map_err(|e| SimulationError::Integration(e.to_string()))?;

    let t = t + h;
    if y.iter().any(|v| !v.is_finite()) {
        return Err(SimulationError::NonFinite { t });
    }

    Ok(t)
}

/// Assembles variables and fluxes into a [`CombinedOutput`].
fn collect_rows(
    model: &Model,
    parameters: &[f64],
    time: Vec<f64>,
    states: &[Vec<f64>],
) -> CombinedOutput {
    let n_variables = model.variable_names().len();
    let mut values = Array2::zeros((states.len(), model.n_outputs()));
    let mut fluxes = vec![0.0; model.n_outputs() - n_variables];

    for (i, (t, y)) in time.iter().zip(states.iter()).enumerate() {
        model.fluxes_into(*t, y, parameters, &mut fluxes);
        for (j, value) in y.iter().chain(fluxes.iter()).enumerate() {
            values[[i, j]] = *value;
        }
    }

    let names = model.output_names().into_iter().map(String::from).collect();
    CombinedOutput::new(time, names, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decay() -> Model {
        Model::builder()
            .parameter("k", 0.5)
            .variable("x", 1.0)
            .reaction("v", |c| c.get("k") * c.get("x"), [("x", -1.0)])
            .build()
            .expect("Failed to build model")
    }

    #[test]
    fn test_time_course_matches_analytic() {
        let model = decay();
        let times = vec![0.0, 0.25, 1.0, 2.7, 5.0];
        let output = evaluate(
            &model,
            &ParameterVector::new(),
            &Mode::TimeCourse(times.clone()),
            &SimulationSetup::default(),
            RK4,
        )
        .expect("Failed to evaluate");

        assert_eq!(output.time(), times.as_slice());
        let x = output.get("x").unwrap();
        for (t, value) in times.iter().zip(x.iter()) {
            assert_relative_eq!(*value, (-0.5 * t).exp(), epsilon = 1e-6);
        }

        // Fluxes are evaluated on the recorded states
        let v = output.get("v").unwrap();
        assert_relative_eq!(v[0], 0.5, epsilon = 1e-12);
    }

    fn fast_decay_matches_analytic<S: FixedStepIntegrator>(solver: S) {
        let model = Model::builder()
            .parameter("k", 50.0)
            .variable("x", 1.0)
            .reaction("v", |c| c.get("k") * c.get("x"), [("x", -1.0)])
            .build()
            .unwrap();
        let setup = SimulationSetup {
            dt: 0.002,
            ..Default::default()
        };
        let times = vec![0.1, 0.2, 0.3];

        let output = evaluate(
            &model,
            &ParameterVector::new(),
            &Mode::TimeCourse(times.clone()),
            &setup,
            solver,
        )
        .unwrap();

        let x = output.get("x").unwrap();
        for (t, value) in times.iter().zip(x.iter()) {
            assert_relative_eq!(*value, (-50.0 * t).exp(), max_relative = 1e-3);
        }
    }

    #[test]
    fn test_fast_decay_rows_match_their_times() {
        fast_decay_matches_analytic(RK4);
        fast_decay_matches_analytic(RK5);
        fast_decay_matches_analytic(RALS4);
    }

    #[test]
    fn test_parameter_override() {
        let model = decay();
        let output = evaluate(
            &model,
            &ParameterVector::from([("k", 1.0)]),
            &Mode::TimeCourse(vec![1.0]),
            &SimulationSetup::default(),
            RK4,
        )
        .unwrap();
        assert_relative_eq!(output.get("x").unwrap()[0], (-1.0f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn test_unknown_parameter() {
        let result = evaluate(
            &decay(),
            &ParameterVector::from([("q", 1.0)]),
            &Mode::SteadyState,
            &SimulationSetup::default(),
            RK4,
        );
        assert_eq!(
            result.unwrap_err(),
            SimulationError::UnknownParameter("q".to_string())
        );
    }

    #[test]
    fn test_invalid_time_points() {
        let setup = SimulationSetup {
            t0: 1.0,
            ..Default::default()
        };
        for times in [vec![2.0, 1.5], vec![0.5, 2.0], vec![f64::NAN]] {
            let result = evaluate(
                &decay(),
                &ParameterVector::new(),
                &Mode::TimeCourse(times),
                &setup,
                RK4,
            );
            assert!(matches!(
                result,
                Err(SimulationError::InvalidTimePoints { .. })
            ));
        }
    }

    #[test]
    fn test_steady_state_not_reached() {
        // Unbounded growth never settles
        let model = Model::builder()
            .parameter("k", 0.1)
            .variable("x", 1.0)
            .reaction("v", |c| c.get("k") * c.get("x"), [("x", 1.0)])
            .build()
            .unwrap();

        let setup = SimulationSetup {
            t_max: 10.0,
            ..Default::default()
        };

        let result = evaluate(
            &model,
            &ParameterVector::new(),
            &Mode::SteadyState,
            &setup,
            RK4,
        );
        assert!(matches!(
            result,
            Err(SimulationError::SteadyStateNotReached { .. })
        ));
    }

    #[test]
    fn test_non_finite_state() {
        let model = Model::builder()
            .variable("x", 1.0)
            .reaction("v", |c| c.get("x").powi(2), [("x", 1.0)])
            .build()
            .unwrap();

        // Blows up at t = 1
        let setup = SimulationSetup {
            dt: 0.5,
            ..Default::default()
        };
        let result = evaluate(
            &model,
            &ParameterVector::new(),
            &Mode::TimeCourse(vec![100.0]),
            &setup,
            RK4,
        );
        assert!(matches!(result, Err(SimulationError::NonFinite { .. })));
    }

    #[test]
    fn test_invalid_step_size() {
        let setup = SimulationSetup {
            dt: 0.0,
            ..Default::default()
        };
        let result = evaluate(
            &decay(),
            &ParameterVector::new(),
            &Mode::SteadyState,
            &setup,
            RK4,
        );
        assert_eq!(result.unwrap_err(), SimulationError::InvalidStepSize(0.0));
    }
}
