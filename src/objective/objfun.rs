use std::fmt::Display;

use ndarray::Array2;

use super::error::ObjectiveError;

/// Defines the norm that turns a residual matrix into a scalar cost
///
/// Implementations receive the matrix of differences between simulated and
/// observed values (time points × observables). Missing observations are
/// already zeroed out, so `n_points` is the number of cells that were actually
/// observed and may be smaller than the number of matrix entries.
///
/// Objective functions are shared by every evaluation of a residual function,
/// possibly across threads, hence the `Send + Sync` bound.
pub trait ObjectiveFunction: Clone + Display + Send + Sync {
    /// Calculates the cost/loss value for the current residuals
    ///
    /// # Arguments
    /// * `residuals` - 2D array of residuals (simulated minus observed)
    /// * `n_points` - Number of observed data points for normalization
    ///
    /// # Returns
    /// * `Result<f64, ObjectiveError>` - The calculated cost value or an error
    fn cost(&self, residuals: &Array2<f64>, n_points: usize) -> Result<f64, ObjectiveError>;
}
