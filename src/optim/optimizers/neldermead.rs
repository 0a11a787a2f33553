//! Nelder-Mead simplex minimizer.
//!
//! The default minimizer of a fit. It is derivative free, which suits residuals
//! that are piecewise infinite (failed simulations) or noisy. The initial simplex
//! is spanned by the initial guess and one vertex per parameter, perturbed by a
//! relative step. A run only counts as successful if argmin reports that the
//! solver converged (standard deviation of the simplex costs below
//! `sd_tolerance`) or that the target cost was reached.

use std::panic::AssertUnwindSafe;

use argmin::core::observers::ObserverMode;
use argmin::core::{Executor, State};
use argmin::solver::neldermead::NelderMead as ArgminNelderMead;
use argmin_observer_slog::SlogLogger;
use ndarray::Array1;

use crate::optim::observer::{CallbackObserver, CostCallback};
use crate::optim::{MinimizeError, Minimizer, ResidualFunction};
use crate::parameters::ParameterVector;

use super::utils::{check_termination, collect_solution, create_initial_simplex};

/// Nelder-Mead minimizer backed by argmin.
#[derive(Clone)]
pub struct NelderMead {
    /// Relative perturbation of each simplex vertex
    pub perturbation: f64,
    /// Absolute perturbation for parameters that are zero
    pub zero_perturbation: f64,
    /// Convergence threshold on the standard deviation of the simplex costs
    pub sd_tolerance: f64,
    /// Maximum number of iterations before stopping
    pub max_iters: u64,
    /// Print progress to the terminal
    pub show_progress: bool,
    callback: Option<CostCallback>,
}

impl Default for NelderMead {
    fn default() -> Self {
        NelderMeadBuilder::default().build()
    }
}

impl Minimizer for NelderMead {
    /// Minimizes the residual using the Nelder-Mead algorithm.
    ///
    /// # Returns
    ///
    /// * `Ok(ParameterVector)` - The best parameters if the simplex converged
    /// * `Err(MinimizeError)` - If the solver fails, panics or runs out of iterations
    fn minimize(
        &self,
        residual: &ResidualFunction,
        p0: &ParameterVector,
    ) -> Result<ParameterVector, MinimizeError> {
        if p0.is_empty() {
            return Err(MinimizeError::Setup("empty initial guess".to_string()));
        }

        let simplex =
            create_initial_simplex(&p0.to_array(), self.perturbation, self.zero_perturbation);
        let solver: ArgminNelderMead<Array1<f64>, f64> = ArgminNelderMead::new(simplex)
            .with_sd_tolerance(self.sd_tolerance)
            .map_err(|e| MinimizeError::Setup(e.to_string()))?;

        let res = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let mut executor = Executor::new(residual.clone(), solver)
                .configure(|state| state.max_iters(self.max_iters));

            if let Some(callback) = &self.callback {
                executor = executor.add_observer(
                    CallbackObserver::new(callback.clone()),
                    ObserverMode::Always,
                );
            }

            if self.show_progress {
                executor = executor.add_observer(SlogLogger::term(), ObserverMode::Always);
            }

            executor.run()
        }))
        .map_err(|_| MinimizeError::SolverPanic)?
        .map_err(MinimizeError::ArgMinError)?;

        log::debug!(
            "Nelder-Mead finished after {} iterations with cost {}",
            res.state.get_iter(),
            res.state.get_best_cost()
        );

        check_termination(&res.state)?;
        collect_solution(res.state.get_best_param(), p0)
    }
}

/// Builder for configuring and constructing [`NelderMead`] instances.
///
/// # Example
///
/// ```
/// use kinfit::optim::NelderMeadBuilder;
///
/// let minimizer = NelderMeadBuilder::default()
///     .max_iters(2000)
///     .sd_tolerance(1e-12)
///     .callback(|cost, best| println!("{cost} {best}"))
///     .build();
/// ```
pub struct NelderMeadBuilder {
    perturbation: f64,
    zero_perturbation: f64,
    sd_tolerance: f64,
    max_iters: u64,
    show_progress: bool,
    callback: Option<CostCallback>,
}

impl NelderMeadBuilder {
    /// Sets the relative and the zero-value perturbation of the initial simplex.
    pub fn perturbation(mut self, relative: f64, zero: f64) -> Self {
        self.perturbation = relative;
        self.zero_perturbation = zero;
        self
    }

    /// Sets the convergence threshold on the standard deviation of the simplex costs.
    pub fn sd_tolerance(mut self, sd_tolerance: f64) -> Self {
        self.sd_tolerance = sd_tolerance;
        self
    }

    /// Sets the maximum number of iterations.
    pub fn max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Prints iteration progress to the terminal.
    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Calls `callback(cost, best_cost)` after every iteration.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64, f64) + Send + Sync + 'static,
    {
        self.callback = Some(std::sync::Arc::new(callback));
        self
    }

    pub fn build(self) -> NelderMead {
        NelderMead {
            perturbation: self.perturbation,
            zero_perturbation: self.zero_perturbation,
            sd_tolerance: self.sd_tolerance,
            max_iters: self.max_iters,
            show_progress: self.show_progress,
            callback: self.callback,
        }
    }
}

impl Default for NelderMeadBuilder {
    /// Creates a new NelderMeadBuilder with default settings.
    ///
    /// Default values:
    /// - perturbation: 5% of each value, 0.00025 for zeros
    /// - sd_tolerance: 1e-12
    /// - max_iters: 2000
    /// - no progress output, no callback
    fn default() -> Self {
        Self {
            perturbation: 0.05,
            zero_perturbation: 0.00025,
            sd_tolerance: 1e-12,
            max_iters: 2000,
            show_progress: false,
            callback: None,
        }
    }
}
