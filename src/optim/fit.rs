//! Fit orchestration.
//!
//! The entry points [`steady_state`] and [`time_course`] fit the parameters named
//! in an initial guess to observed data with the default integrator (`RK4`),
//! objective ([`LossFunction::SSE`]) and minimizer ([`NelderMead`]).
//!
//! [`Fit`] exposes the same operations with each of the three components
//! replaceable independently:
//!
//! ```
//! use kinfit::prelude::*;
//!
//! let model = Model::builder()
//!     .parameter("k", 1.0)
//!     .variable("x", 0.0)
//!     .reaction("v_in", |_| 1.0, [("x", 1.0)])
//!     .reaction("v_out", |c| c.get("k") * c.get("x"), [("x", -1.0)])
//!     .build()
//!     .unwrap();
//!
//! let data = SteadyStateData::from([("x", 0.25)]);
//!
//! let result = Fit::new(&model, [("k", 1.0)])
//!     .integrator(RK5)
//!     .objective(LossFunction::MSE)
//!     .minimizer(NelderMeadBuilder::default().max_iters(500).build())
//!     .steady_state(&data)
//!     .unwrap();
//!
//! let k = result.converged().unwrap().get("k").unwrap();
//! assert!((k - 4.0).abs() < 1e-3);
//! ```
//!
//! All structural checks (parameter keys, observable matching, empty data)
//! happen before the minimizer is invoked and are reported as [`FitError`].
//! Everything that goes wrong numerically afterwards ends up in
//! [`FitResult::Failed`].

use peroxide::fuga::RK4;

use crate::data::{ObservationSet, SteadyStateData, TimeCourseData};
use crate::model::Model;
use crate::objective::{LossFunction, ObjectiveFunction};
use crate::parameters::ParameterVector;
use crate::simulation::{FixedStepIntegrator, SimulationSetup};

use super::error::FitError;
use super::minimizer::{minimize, FitResult, Minimizer};
use super::optimizers::NelderMead;
use super::residual::{ResidualBuilder, ResidualFunction};

/// Fits a model to steady-state data with the default components.
///
/// # Arguments
/// * `model` - Model whose parameters are fitted; it is not modified
/// * `p0` - Initial guess; its keys are the fitted parameters
/// * `data` - Observed steady-state values by output name
///
/// # Errors
/// Returns a `FitError` for structural problems only; a failed minimization is
/// reported as `Ok(FitResult::Failed(_))`.
pub fn steady_state(
    model: &Model,
    p0: impl Into<ParameterVector>,
    data: &SteadyStateData,
) -> Result<FitResult, FitError> {
    Fit::new(model, p0).steady_state(data)
}

/// Fits a model to time-course data with the default components.
///
/// See [`steady_state`] for the error semantics.
pub fn time_course(
    model: &Model,
    p0: impl Into<ParameterVector>,
    data: &TimeCourseData,
) -> Result<FitResult, FitError> {
    Fit::new(model, p0).time_course(data)
}

/// Configurable fit with replaceable integrator, objective and minimizer.
#[derive(Clone)]
pub struct Fit<S = RK4, L = LossFunction, M = NelderMead> {
    model: Model,
    p0: ParameterVector,
    integrator: S,
    objective: L,
    minimizer: M,
    setup: SimulationSetup,
}

impl Fit {
    pub fn new(model: &Model, p0: impl Into<ParameterVector>) -> Self {
        Self {
            model: model.clone(),
            p0: p0.into(),
            integrator: RK4,
            objective: LossFunction::default(),
            minimizer: NelderMead::default(),
            setup: SimulationSetup::default(),
        }
    }
}

impl<S, L, M> Fit<S, L, M> {
    /// Replaces the ODE integrator.
    pub fn integrator<S2: FixedStepIntegrator>(self, integrator: S2) -> Fit<S2, L, M> {
        Fit {
            model: self.model,
            p0: self.p0,
            integrator,
            objective: self.objective,
            minimizer: self.minimizer,
            setup: self.setup,
        }
    }

    /// Replaces the norm applied to the residual matrix.
    pub fn objective<L2: ObjectiveFunction>(self, objective: L2) -> Fit<S, L2, M> {
        Fit {
            model: self.model,
            p0: self.p0,
            integrator: self.integrator,
            objective,
            minimizer: self.minimizer,
            setup: self.setup,
        }
    }

    /// Replaces the minimizer.
    pub fn minimizer<M2: Minimizer>(self, minimizer: M2) -> Fit<S, L, M2> {
        Fit {
            model: self.model,
            p0: self.p0,
            integrator: self.integrator,
            objective: self.objective,
            minimizer,
            setup: self.setup,
        }
    }

    /// Replaces the integration settings.
    pub fn setup(mut self, setup: SimulationSetup) -> Self {
        self.setup = setup;
        self
    }

    pub fn initial_guess(&self) -> &ParameterVector {
        &self.p0
    }
}

impl<S, L, M> Fit<S, L, M>
where
    S: FixedStepIntegrator + Send + Sync + 'static,
    L: ObjectiveFunction + 'static,
    M: Minimizer,
{
    /// Fits the initial guess's parameters to steady-state data.
    pub fn steady_state(&self, data: &SteadyStateData) -> Result<FitResult, FitError> {
        self.run(data.clone().into())
    }

    /// Fits the initial guess's parameters to time-course data.
    pub fn time_course(&self, data: &TimeCourseData) -> Result<FitResult, FitError> {
        self.run(data.clone().into())
    }

    /// Builds the residual function a fit against `observations` would minimize.
    pub fn residual(
        &self,
        observations: impl Into<ObservationSet>,
    ) -> Result<ResidualFunction, FitError> {
        if self.p0.is_empty() {
            return Err(FitError::EmptyInitialGuess);
        }

        ResidualBuilder::new(&self.model, observations)
            .integrator(self.integrator)
            .objective(self.objective.clone())
            .setup(self.setup)
            .build(self.p0.names())
    }

    fn run(&self, observations: ObservationSet) -> Result<FitResult, FitError> {
        let residual = self.residual(observations)?;

        log::debug!(
            "Fitting {:?} starting from {:?}",
            self.p0.names(),
            self.p0.values()
        );

        let result = minimize(&self.minimizer, &residual, &self.p0);

        if let FitResult::Converged(parameters) = &result {
            log::debug!(
                "Fit converged to {:?} with residual {}",
                parameters.values(),
                residual.at(parameters)
            );
        }

        Ok(result)
    }
}
