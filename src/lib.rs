//! kinfit
//!
//! Parameter estimation for kinetic models with pluggable components:
//! - Kinetic models built from rate closures and stoichiometries
//! - Steady-state and time-course simulation on `peroxide` integrators
//! - Residual functions over partial, mixed concentration/flux observations
//! - Swappable minimizers (Nelder-Mead, L-BFGS, multi-start) and loss functions
//! - Profile likelihoods for practical identifiability

#![warn(unused_imports)]

/// Commonly used types and functionality re-exported for convenience
pub mod prelude {
    pub use crate::data::{DataError, ObservationSet, SteadyStateData, TimeCourseData};
    pub use crate::identifiability::{
        profile_likelihood, profile_parameter, ProfileParameter, ProfileResult,
    };
    pub use crate::model::{Model, ModelBuilder, ModelError, RateContext};
    pub use crate::objective::{
        LogCosh, LossFunction, MeanAbsoluteError, MeanSquaredError, ObjectiveError,
        ObjectiveFunction, RootMeanSquaredError, SumOfSquaredErrors,
    };
    pub use crate::optim::{
        minimize, steady_state, time_course, CallbackObserver, CostCallback, Fit, FitError,
        FitResult, Lbfgs, LbfgsBuilder, MinimizeError, Minimizer, MultiStart, NelderMead,
        NelderMeadBuilder, ResidualBuilder, ResidualFunction,
    };
    pub use crate::parameters::{ParameterError, ParameterVector};
    pub use crate::simulation::{
        evaluate, CombinedOutput, FixedStepIntegrator, Mode, ODEIntegrator, SimulationError,
        SimulationSetup, SimulationSetupBuilder, SimulationSetupBuilderError, RALS3, RALS4, RK4,
        RK5,
    };
}

/// Kinetic model container
pub mod model;

/// Named, ordered parameter vectors
pub mod parameters;

/// Observation sets used as fitting targets
pub mod data;

/// Simulation of kinetic models
pub mod simulation {
    pub use crate::simulation::error::SimulationError;
    pub use crate::simulation::output::CombinedOutput;
    pub use crate::simulation::setup::*;
    pub(crate) use crate::simulation::system::{
        evaluate_values, validate_step_size, validate_time_points,
    };
    pub use crate::simulation::system::{evaluate, FixedStepIntegrator, Mode};
    pub use peroxide::fuga::{ODEIntegrator, RALS3, RALS4, RK4, RK5};

    /// Error types for simulation failures
    pub mod error;
    /// Combined concentration and flux output
    pub mod output;
    /// Simulation setup and configuration
    pub mod setup;
    /// Core ODE system implementation
    pub mod system;
}

/// Norms reducing residual matrices to a scalar cost
pub mod objective {
    pub use crate::objective::error::*;
    pub use crate::objective::loss::*;
    pub use crate::objective::objfun::*;

    pub mod error;
    pub mod loss;
    pub mod objfun;
}

/// Residual construction, minimization and fit orchestration
pub mod optim {
    pub use crate::optim::error::*;
    pub use crate::optim::fit::*;
    pub use crate::optim::minimizer::*;
    pub use crate::optim::observer::*;
    pub use crate::optim::optimizers::*;
    pub use crate::optim::residual::*;
    pub use argmin::core::CostFunction;
    pub use argmin::core::Gradient;
    use argmin_math as _;

    pub mod error;
    pub mod fit;
    pub mod minimizer;
    pub mod observer;
    pub mod residual;

    pub mod optimizers {
        pub use crate::optim::optimizers::lbfgs::*;
        pub use crate::optim::optimizers::multistart::*;
        pub use crate::optim::optimizers::neldermead::*;
        pub mod lbfgs;
        pub mod multistart;
        pub mod neldermead;
        pub(crate) mod utils;
    }
}

/// Profile likelihood analysis
pub mod identifiability {
    pub use crate::identifiability::parameter::*;
    pub use crate::identifiability::profile::*;
    pub use crate::identifiability::results::*;

    pub mod parameter;
    pub mod profile;
    pub mod results;
}
