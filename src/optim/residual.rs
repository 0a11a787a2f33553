//! Residual functions for parameter estimation.
//!
//! A [`ResidualFunction`] maps an ordered vector of parameter values to the scalar
//! that minimizers try to drive down. It is built once per fit by a
//! [`ResidualBuilder`], which captures a copy of the model, the observations,
//! the integrator, the integration settings and the objective function.
//!
//! Each evaluation
//! 1. zips the numeric vector with the parameter names captured at build time,
//! 2. simulates the model (steady state or time course),
//! 3. compares the matched observables against the data, skipping missing cells,
//! 4. reduces the residual matrix with the objective function.
//!
//! Numerical failures never escape: a failed simulation, a failing objective or
//! a non-finite cost all evaluate to `f64::INFINITY`, which every minimizer
//! treats as a rejected trial point.

use std::fmt;
use std::sync::Arc;

use argmin::core::{CostFunction, Gradient};
use finitediff::FiniteDiff;
use ndarray::{Array1, Array2, Axis, Zip};
use peroxide::fuga::RK4;

use crate::data::ObservationSet;
use crate::model::Model;
use crate::objective::{LossFunction, ObjectiveFunction};
use crate::parameters::ParameterVector;
use crate::simulation::{
    evaluate_values, validate_step_size, validate_time_points, FixedStepIntegrator, Mode,
    SimulationSetup,
};

use super::error::FitError;

type Residual = dyn Fn(&[f64]) -> f64 + Send + Sync;

/// Scalar residual over an ordered parameter vector.
///
/// Cloning is cheap; all clones share the captured model and data.
#[derive(Clone)]
pub struct ResidualFunction {
    names: Arc<[String]>,
    function: Arc<Residual>,
}

impl ResidualFunction {
    /// Wraps an arbitrary residual.
    ///
    /// # Arguments
    /// * `names` - Parameter names, in the order of the values passed to the function
    /// * `function` - Residual over the ordered values
    pub fn new<S, F>(names: impl IntoIterator<Item = S>, function: F) -> Self
    where
        S: Into<String>,
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            function: Arc::new(function),
        }
    }

    /// Parameter names in vector order.
    pub fn parameter_names(&self) -> &[String] {
        &self.names
    }

    /// Evaluates the residual for values ordered like [`ResidualFunction::parameter_names`].
    ///
    /// A vector of the wrong length evaluates to `f64::INFINITY`.
    pub fn call(&self, values: &[f64]) -> f64 {
        if values.len() != self.names.len() {
            return f64::INFINITY;
        }
        (self.function)(values)
    }

    /// Evaluates the residual at a named parameter vector.
    ///
    /// Missing names evaluate to `f64::INFINITY`.
    pub fn at(&self, parameters: &ParameterVector) -> f64 {
        let values: Option<Vec<f64>> = self.names.iter().map(|n| parameters.get(n)).collect();
        match values {
            Some(values) => self.call(&values),
            None => f64::INFINITY,
        }
    }

    fn call_array(&self, values: &Array1<f64>) -> f64 {
        match values.as_slice() {
            Some(values) => self.call(values),
            None => self.call(&values.to_vec()),
        }
    }
}

impl fmt::Debug for ResidualFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidualFunction")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// Residual functions are argmin problems over `Array1<f64>`.
impl CostFunction for ResidualFunction {
    type Param = Array1<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<f64, argmin::core::Error> {
        Ok(self.call_array(params))
    }
}

/// Gradient by central finite differences, for gradient-based minimizers.
impl Gradient for ResidualFunction {
    type Param = Array1<f64>;
    type Gradient = Array1<f64>;

    fn gradient(&self, params: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        let cost_fn = |x: &Array1<f64>| self.call_array(x);
        Ok(params.central_diff(&cost_fn))
    }
}

/// Builds a [`ResidualFunction`] for a model and a set of observations.
///
/// Defaults: `RK4` integrator, [`LossFunction::SSE`] objective and
/// [`SimulationSetup::default`].
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
/// let data = SteadyStateData::from([("x", 0.5)]);
/// let residual = ResidualBuilder::new(&model, data)
///     .objective(LossFunction::SSE)
///     .build(&["k"])
///     .unwrap();
///
/// assert!(residual.call(&[2.0]) < 1e-12);
/// assert!(residual.call(&[1.0]) > 0.1);
/// ```
pub struct ResidualBuilder<S = RK4, L = LossFunction> {
    model: Model,
    observations: ObservationSet,
    integrator: S,
    objective: L,
    setup: SimulationSetup,
}

impl ResidualBuilder {
    pub fn new(model: &Model, observations: impl Into<ObservationSet>) -> Self {
        Self {
            model: model.clone(),
            observations: observations.into(),
            integrator: RK4,
            objective: LossFunction::default(),
            setup: SimulationSetup::default(),
        }
    }
}

impl<S, L> ResidualBuilder<S, L> {
    /// Sets the ODE integrator.
    pub fn integrator<S2: FixedStepIntegrator>(self, integrator: S2) -> ResidualBuilder<S2, L> {
        ResidualBuilder {
            model: self.model,
            observations: self.observations,
            integrator,
            objective: self.objective,
            setup: self.setup,
        }
    }

    /// Sets the norm applied to the residual matrix.
    pub fn objective<L2>(self, objective: L2) -> ResidualBuilder<S, L2> {
        ResidualBuilder {
            model: self.model,
            observations: self.observations,
            integrator: self.integrator,
            objective,
            setup: self.setup,
        }
    }

    /// Sets the integration settings.
    pub fn setup(mut self, setup: SimulationSetup) -> Self {
        self.setup = setup;
        self
    }
}

impl<S, L> ResidualBuilder<S, L>
where
    S: FixedStepIntegrator + Send + Sync + 'static,
    L: ObjectiveFunction + 'static,
{
    /// Validates the observations and captures everything needed for evaluation.
    ///
    /// # Arguments
    /// * `parameter_names` - Names of the fitted parameters, in optimizer vector order
    ///
    /// # Errors
    /// * `FitError::InvalidParameterKey` if a name is not a model parameter
    /// * `FitError::NoMatchingObservables` if no observed value belongs to a model output
    /// * `FitError::SimulationError` if the step size is invalid or observation times
    ///   precede `setup.t0`
    pub fn build<N: AsRef<str>>(self, parameter_names: &[N]) -> Result<ResidualFunction, FitError> {
        let indices = parameter_names
            .iter()
            .map(|name| {
                self.model
                    .parameter_index(name.as_ref())
                    .ok_or_else(|| FitError::InvalidParameterKey(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        validate_step_size(self.setup.dt)?;

        let outputs = self.model.output_names();
        let observed: Vec<String> = self
            .observations
            .names()
            .into_iter()
            .map(String::from)
            .collect();

        let (matched, unmatched): (Vec<&str>, Vec<&str>) = observed
            .iter()
            .map(String::as_str)
            .partition(|name| outputs.contains(name));

        if !unmatched.is_empty() {
            log::warn!("Ignoring observations without a model output: {unmatched:?}");
        }

        let no_match = || FitError::NoMatchingObservables {
            observed: observed.clone(),
        };

        if matched.is_empty() {
            return Err(no_match());
        }

        let columns: Vec<usize> = matched
            .iter()
            .filter_map(|name| outputs.iter().position(|o| o == name))
            .collect();

        let (mode, data) = match &self.observations {
            ObservationSet::SteadyState(data) => {
                let row: Vec<f64> = matched
                    .iter()
                    .map(|name| data.get(name).unwrap_or(f64::NAN))
                    .collect();
                let data = Array2::from_shape_vec((1, row.len()), row)
                    .map_err(|_| no_match())?;
                (Mode::SteadyState, data)
            }
            ObservationSet::TimeCourse(data) => {
                let selected = data.select(&matched)?;
                validate_time_points(selected.times(), self.setup.t0)?;
                (
                    Mode::TimeCourse(selected.times().to_vec()),
                    selected.values().clone(),
                )
            }
        };

        let n_points = data.iter().filter(|v| !v.is_nan()).count();
        if n_points == 0 {
            return Err(no_match());
        }

        log::debug!(
            "Built residual over {} parameters and {} observables ({n_points} points, {})",
            indices.len(),
            matched.len(),
            self.objective
        );

        let names: Vec<String> = parameter_names
            .iter()
            .map(|n| n.as_ref().to_string())
            .collect();

        let Self {
            model,
            integrator,
            objective,
            setup,
            ..
        } = self;
        let defaults = model.parameter_values().to_vec();

        let function = move |values: &[f64]| {
            let mut parameters = defaults.clone();
            for (index, value) in indices.iter().zip(values) {
                parameters[*index] = *value;
            }

            let output = match evaluate_values(&model, &parameters, &mode, &setup, integrator) {
                Ok(output) => output,
                Err(e) => {
                    log::trace!("Simulation failed at {values:?}: {e}");
                    return f64::INFINITY;
                }
            };

            let simulated = output.values().select(Axis(1), &columns);
            let residuals = Zip::from(&simulated)
                .and(&data)
                .map_collect(|s, o| if o.is_nan() { 0.0 } else { s - o });

            match objective.cost(&residuals, n_points) {
                Ok(cost) if cost.is_finite() => cost,
                _ => f64::INFINITY,
            }
        };

        Ok(ResidualFunction::new(names, function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SteadyStateData, TimeCourseData};
    use crate::simulation::SimulationError;
    use approx::assert_relative_eq;

    fn decay() -> Model {
        Model::builder()
            .parameter("k", 0.5)
            .parameter("unused", 1.0)
            .variable("x", 1.0)
            .reaction("v", |c| c.get("k") * c.get("x"), [("x", -1.0)])
            .build()
            .expect("Failed to build model")
    }

    #[test]
    fn test_residual_vanishes_at_truth() {
        let data = TimeCourseData::new(
            vec![1.0, 2.0],
            vec!["x"],
            vec![vec![(-0.5f64).exp()], vec![(-1.0f64).exp()]],
        )
        .unwrap();

        let residual = ResidualBuilder::new(&decay(), data).build(&["k"]).unwrap();
        assert_relative_eq!(residual.call(&[0.5]), 0.0, epsilon = 1e-10);
        assert!(residual.call(&[1.0]) > 1e-3);
    }

    #[test]
    fn test_missing_cells_are_skipped() {
        let complete = TimeCourseData::new(vec![1.0], vec!["x"], vec![vec![0.3]]).unwrap();
        let sparse = TimeCourseData::new(
            vec![1.0, 2.0],
            vec!["x", "v"],
            vec![vec![0.3, f64::NAN], vec![f64::NAN, f64::NAN]],
        )
        .unwrap();

        let a = ResidualBuilder::new(&decay(), complete)
            .objective(LossFunction::MSE)
            .build(&["k"])
            .unwrap();
        let b = ResidualBuilder::new(&decay(), sparse)
            .objective(LossFunction::MSE)
            .build(&["k"])
            .unwrap();

        assert_relative_eq!(a.call(&[0.7]), b.call(&[0.7]), epsilon = 1e-12);
    }

    #[test]
    fn test_unmatched_observables_are_dropped() {
        let data = SteadyStateData::from([("x", 0.0), ("not_an_output", 3.0)]);
        let residual = ResidualBuilder::new(&decay(), data).build(&["k"]);
        assert!(residual.is_ok());
    }

    #[test]
    fn test_no_matching_observables() {
        let data = SteadyStateData::from([("z", 1.0)]);
        let result = ResidualBuilder::new(&decay(), data).build(&["k"]);
        assert!(matches!(
            result,
            Err(FitError::NoMatchingObservables { .. })
        ));

        let result = ResidualBuilder::new(&decay(), SteadyStateData::new()).build(&["k"]);
        assert!(matches!(
            result,
            Err(FitError::NoMatchingObservables { .. })
        ));
    }

    #[test]
    fn test_invalid_parameter_key() {
        let data = SteadyStateData::from([("x", 0.0)]);
        let result = ResidualBuilder::new(&decay(), data).build(&["k", "x"]);
        assert!(matches!(result, Err(FitError::InvalidParameterKey(name)) if name == "x"));
    }

    #[test]
    fn test_times_before_t0_are_rejected_at_build() {
        let data = TimeCourseData::new(vec![-1.0, 1.0], vec!["x"], vec![vec![1.0], vec![0.6]])
            .unwrap();
        let result = ResidualBuilder::new(&decay(), data.clone()).build(&["k"]);
        assert!(matches!(
            result,
            Err(FitError::SimulationError(
                SimulationError::InvalidTimePoints { .. }
            ))
        ));

        let setup = SimulationSetup {
            t0: -2.0,
            ..Default::default()
        };
        let result = ResidualBuilder::new(&decay(), data).setup(setup).build(&["k"]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_step_size_is_rejected_at_build() {
        let setup = SimulationSetup {
            dt: 0.0,
            ..Default::default()
        };
        let result = ResidualBuilder::new(&decay(), SteadyStateData::from([("x", 0.0)]))
            .setup(setup)
            .build(&["k"]);
        assert!(matches!(
            result,
            Err(FitError::SimulationError(SimulationError::InvalidStepSize(_)))
        ));
    }

    #[test]
    fn test_failed_simulation_is_infinite() {
        // Negative decay grows without bound and never reaches a steady state
        let setup = SimulationSetup {
            t_max: 5.0,
            ..Default::default()
        };
        let residual = ResidualBuilder::new(&decay(), SteadyStateData::from([("x", 0.0)]))
            .setup(setup)
            .build(&["k"])
            .unwrap();

        assert_eq!(residual.call(&[-1.0]), f64::INFINITY);
        assert_eq!(residual.call(&[1.0, 2.0]), f64::INFINITY);
    }

    #[test]
    fn test_argmin_cost_and_gradient() {
        let residual =
            ResidualFunction::new(["a", "b"], |p| (p[0] - 1.0).powi(2) + 3.0 * p[1] * p[1]);
        let x = Array1::from_vec(vec![2.0, 1.0]);

        assert_relative_eq!(residual.cost(&x).unwrap(), 4.0, epsilon = 1e-12);

        let gradient = residual.gradient(&x).unwrap();
        assert_relative_eq!(gradient[0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(gradient[1], 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_at_named_parameters() {
        let residual = ResidualFunction::new(["a", "b"], |p| p[0] - p[1]);
        let p = ParameterVector::from([("b", 1.0), ("a", 3.0)]);
        assert_eq!(residual.at(&p), 2.0);
        assert_eq!(residual.at(&ParameterVector::from([("a", 1.0)])), f64::INFINITY);
    }
}
