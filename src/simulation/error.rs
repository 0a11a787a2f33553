//! Simulation Error Module
//!
//! The [`SimulationError`] enum covers the failure points of a single model
//! evaluation:
//! - Parameter overrides that do not belong to the model
//! - Invalid requested time points or step sizes
//! - Integrator errors and numerical blow-up
//! - Steady states that are not reached within the time budget
//!
//! During fitting these errors are absorbed by the residual function and turned
//! into an infinite penalty, so a single bad trial point never aborts a fit.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Unknown parameter {0}")]
    UnknownParameter(String),
    #[error("Expected {expected} parameter values, got {found}")]
    ParameterLength { expected: usize, found: usize },
    #[error("Time points must be finite, strictly increasing and not before t0 = {t0}")]
    InvalidTimePoints { t0: f64 },
    #[error("Step size must be positive and finite, got {0}")]
    InvalidStepSize(f64),
    #[error("Integration failed: {0}")]
    Integration(String),
    #[error("Non-finite state at t = {t}")]
    NonFinite { t: f64 },
    #[error("Steady state not reached until t = {t_max} (max |dy/dt| = {max_derivative})")]
    SteadyStateNotReached { t_max: f64, max_derivative: f64 },
}
