//! # Loss Functions Module
//!
//! Norms that reduce a residual matrix to the scalar minimized during fitting.
//!
//! ## Supported Loss Functions
//! - Sum of Squared Errors (SSE), the default
//! - Mean Squared Error (MSE)
//! - Root Mean Squared Error (RMSE)
//! - Log-Cosh Loss
//! - Mean Absolute Error (MAE)
//!
//! [`LossFunction`] selects one of them at runtime; the unit structs can also
//! be used directly wherever an [`ObjectiveFunction`] is expected.

use std::fmt::{self, Display};

use ndarray::Array2;

use super::{error::ObjectiveError, objfun::ObjectiveFunction};

/// Enumeration of different loss functions available for optimization
///
/// Each variant represents a different approach to calculating the error of a
/// model's predictions against observed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LossFunction {
    /// Sum of Squared Errors (SSE): sum of squared differences between simulation and data
    #[default]
    SSE,
    /// Mean Squared Error (MSE): average squared difference between simulation and data
    MSE,
    /// Root Mean Squared Error (RMSE): square root of MSE, providing error in the original scale
    RMSE,
    /// Log-Cosh Loss: smooth approximation of absolute error that is robust to outliers
    LogCosh,
    /// Mean Absolute Error (MAE): average absolute difference between simulation and data
    MAE,
}

impl ObjectiveFunction for LossFunction {
    /// Delegates cost calculation to the specific loss function implementation
    ///
    /// Non-finite costs are reported as [`ObjectiveError::NonFinite`].
    fn cost(&self, residuals: &Array2<f64>, n_points: usize) -> Result<f64, ObjectiveError> {
        let cost = match self {
            LossFunction::SSE => SumOfSquaredErrors.cost(residuals, n_points),
            LossFunction::MSE => MeanSquaredError.cost(residuals, n_points),
            LossFunction::RMSE => RootMeanSquaredError.cost(residuals, n_points),
            LossFunction::LogCosh => LogCosh.cost(residuals, n_points),
            LossFunction::MAE => MeanAbsoluteError.cost(residuals, n_points),
        }?;

        if cost.is_finite() {
            Ok(cost)
        } else {
            Err(ObjectiveError::NonFinite)
        }
    }
}

impl Display for LossFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossFunction::SSE => SumOfSquaredErrors.fmt(f),
            LossFunction::MSE => MeanSquaredError.fmt(f),
            LossFunction::RMSE => RootMeanSquaredError.fmt(f),
            LossFunction::LogCosh => LogCosh.fmt(f),
            LossFunction::MAE => MeanAbsoluteError.fmt(f),
        }
    }
}

fn mean(sum: f64, n_points: usize) -> Result<f64, ObjectiveError> {
    if n_points == 0 {
        return Err(ObjectiveError::NoDataPoints);
    }
    Ok(sum / n_points as f64)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SumOfSquaredErrors;

impl ObjectiveFunction for SumOfSquaredErrors {
    fn cost(&self, residuals: &Array2<f64>, _: usize) -> Result<f64, ObjectiveError> {
        Ok(residuals.mapv(|r| r * r).sum())
    }
}

impl Display for SumOfSquaredErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SSE")
    }
}

/// Mean Squared Error (MSE) Loss Function
///
/// MSE calculates the average of the squared differences between simulated and observed values.
/// It is sensitive to outliers and penalizes large errors more heavily due to squaring.
///
/// Key characteristics:
/// - Quadratic penalty for errors
/// - Differentiable and convex
/// - Heavily penalizes large prediction errors
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl ObjectiveFunction for MeanSquaredError {
    /// Calculates the Mean Squared Error cost
    ///
    /// # Algorithm
    /// 1. Square each residual
    /// 2. Sum the squared residuals
    /// 3. Divide by the number of observed points
    fn cost(&self, residuals: &Array2<f64>, n_points: usize) -> Result<f64, ObjectiveError> {
        let sum_squared_residuals = residuals.mapv(|r| r * r).sum();
        mean(sum_squared_residuals, n_points)
    }
}

impl Display for MeanSquaredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MSE")
    }
}

/// Root Mean Squared Error (RMSE) Loss Function
///
/// Square root of the MSE. The error is expressed in the units of the data.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootMeanSquaredError;

impl ObjectiveFunction for RootMeanSquaredError {
    fn cost(&self, residuals: &Array2<f64>, n_points: usize) -> Result<f64, ObjectiveError> {
        let cost = MeanSquaredError.cost(residuals, n_points)?;
        Ok(cost.sqrt())
    }
}

impl Display for RootMeanSquaredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RMSE")
    }
}

/// Log-Cosh Loss Function
///
/// Behaves like half the squared error for small residuals and like the
/// absolute error for large ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCosh;

impl ObjectiveFunction for LogCosh {
    fn cost(&self, residuals: &Array2<f64>, n_points: usize) -> Result<f64, ObjectiveError> {
        let log_cosh = residuals.mapv(|r| r.cosh().ln());
        mean(log_cosh.sum(), n_points)
    }
}

impl Display for LogCosh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogCosh")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteError;

impl ObjectiveFunction for MeanAbsoluteError {
    fn cost(&self, residuals: &Array2<f64>, n_points: usize) -> Result<f64, ObjectiveError> {
        let sum = residuals.mapv(|r| r.abs()).sum();
        mean(sum, n_points)
    }
}

impl Display for MeanAbsoluteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAE")
    }
}
