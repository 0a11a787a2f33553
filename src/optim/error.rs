use thiserror::Error;

use crate::{data::DataError, simulation::error::SimulationError};

/// Structural errors of a fit, raised before any minimization is attempted.
#[derive(Error, Debug)]
pub enum FitError {
    #[error("None of the observed names {observed:?} match a model output")]
    NoMatchingObservables { observed: Vec<String> },
    #[error("Parameter {0} is not a parameter of the model")]
    InvalidParameterKey(String),
    #[error("Initial guess is empty")]
    EmptyInitialGuess,
    #[error("Invalid simulation setup: {0}")]
    SimulationError(#[from] SimulationError),
    #[error("Invalid observation data: {0}")]
    DataError(#[from] DataError),
    #[error("Failed to parse profile parameter {0}. Expected format: 'param_name=from:to'.")]
    ProfileParameterParseError(String),
}

/// Reasons a minimizer could not produce a solution.
///
/// These never escape the fitting entry points: the dispatcher turns them
/// into a failed fit result.
#[derive(Error, Debug)]
pub enum MinimizeError {
    #[error("Solver panic")]
    SolverPanic,
    #[error("Error optimizing: {0}")]
    ArgMinError(argmin::core::Error),
    #[error("Solver did not converge: {0}")]
    NotConverged(String),
    #[error("No solution found")]
    NoSolution,
    #[error("Invalid solver setup: {0}")]
    Setup(String),
}
