use argmin::core::{State, TerminationReason};
use ndarray::Array1;

use crate::optim::MinimizeError;
use crate::parameters::ParameterVector;

/// Builds the initial Nelder-Mead simplex around a point.
///
/// The first vertex is the point itself; every further vertex perturbs one
/// coordinate by `relative` times its value, or by `absolute` if it is zero.
pub(crate) fn create_initial_simplex(
    initial_point: &Array1<f64>,
    relative: f64,
    absolute: f64,
) -> Vec<Array1<f64>> {
    let mut vertices = Vec::with_capacity(initial_point.len() + 1);
    vertices.push(initial_point.clone());

    for (i, value) in initial_point.iter().enumerate() {
        let perturbation = if *value == 0.0 {
            absolute
        } else {
            relative * value
        };

        let mut perturbed_point = initial_point.clone();
        perturbed_point[i] += perturbation;
        vertices.push(perturbed_point);
    }

    vertices
}

/// Only convergence or reaching the target cost count as success.
pub(crate) fn check_termination<S: State>(state: &S) -> Result<(), MinimizeError> {
    match state.get_termination_reason() {
        Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached) => {
            Ok(())
        }
        Some(reason) => Err(MinimizeError::NotConverged(reason.to_string())),
        None => Err(MinimizeError::NotConverged("solver did not terminate".to_string())),
    }
}

/// Maps the best parameters of a run back onto the names of the initial guess.
pub(crate) fn collect_solution(
    best: Option<&Array1<f64>>,
    p0: &ParameterVector,
) -> Result<ParameterVector, MinimizeError> {
    let best = best.ok_or(MinimizeError::NoSolution)?;

    if best.len() != p0.len() || best.iter().any(|v| !v.is_finite()) {
        return Err(MinimizeError::NoSolution);
    }

    Ok(p0.with_values(&best.to_vec()))
}
