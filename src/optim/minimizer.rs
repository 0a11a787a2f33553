//! Minimizer contract and dispatch.
//!
//! A [`Minimizer`] takes a [`ResidualFunction`] and an initial guess and either
//! returns the best parameters it found or a [`MinimizeError`]. Any closure with
//! the signature of [`Minimizer::minimize`] is a minimizer, so custom
//! algorithms and test doubles need no extra types.
//!
//! [`minimize`] is the single place where minimizer failures are absorbed: an
//! error becomes [`FitResult::Failed`] carrying the initial guess's names with
//! every value set to NaN.

use crate::parameters::ParameterVector;

use super::error::MinimizeError;
use super::residual::ResidualFunction;

/// Trait defining the interface for minimization algorithms.
pub trait Minimizer: Send + Sync {
    /// Minimizes the residual starting from `p0`.
    ///
    /// # Arguments
    /// * `residual` - Residual over the ordered parameter vector
    /// * `p0` - Initial guess; its key order is the vector order of `residual`
    ///
    /// # Returns
    /// * `Ok(ParameterVector)` - Best parameters, with the keys of `p0`
    /// * `Err(MinimizeError)` - If no acceptable solution was found
    fn minimize(
        &self,
        residual: &ResidualFunction,
        p0: &ParameterVector,
    ) -> Result<ParameterVector, MinimizeError>;
}

impl<F> Minimizer for F
where
    F: Fn(&ResidualFunction, &ParameterVector) -> Result<ParameterVector, MinimizeError>
        + Send
        + Sync,
{
    fn minimize(
        &self,
        residual: &ResidualFunction,
        p0: &ParameterVector,
    ) -> Result<ParameterVector, MinimizeError> {
        self(residual, p0)
    }
}

/// Outcome of a fit.
#[derive(Debug, Clone, PartialEq)]
pub enum FitResult {
    /// The minimizer reported success
    Converged(ParameterVector),
    /// The minimizer failed; every value is NaN
    Failed(ParameterVector),
}

impl FitResult {
    pub fn is_converged(&self) -> bool {
        matches!(self, FitResult::Converged(_))
    }

    /// Returns the parameters of either outcome.
    pub fn parameters(&self) -> &ParameterVector {
        match self {
            FitResult::Converged(p) | FitResult::Failed(p) => p,
        }
    }

    pub fn into_parameters(self) -> ParameterVector {
        match self {
            FitResult::Converged(p) | FitResult::Failed(p) => p,
        }
    }

    /// Returns the parameters only if the fit converged.
    pub fn converged(&self) -> Option<&ParameterVector> {
        match self {
            FitResult::Converged(p) => Some(p),
            FitResult::Failed(_) => None,
        }
    }
}

/// Runs a minimizer and maps its outcome onto a [`FitResult`].
///
/// The returned parameters of a successful run are passed through untouched.
pub fn minimize<M: Minimizer + ?Sized>(
    minimizer: &M,
    residual: &ResidualFunction,
    p0: &ParameterVector,
) -> FitResult {
    match minimizer.minimize(residual, p0) {
        Ok(parameters) => FitResult::Converged(parameters),
        Err(e) => {
            log::warn!("Minimization failed: {e}");
            FitResult::Failed(p0.nan_like())
        }
    }
}
