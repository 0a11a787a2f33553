//! L-BFGS optimization algorithm implementation.
//!
//! This module provides an implementation of the Limited-memory BFGS (L-BFGS) optimization algorithm,
//! which is a quasi-Newton method for solving unconstrained optimization problems. The implementation
//! includes:
//!
//! - The main `Lbfgs` minimizer struct and implementation
//! - A builder pattern via `LbfgsBuilder` for convenient configuration
//! - Support for line search parameters and convergence criteria
//!
//! Gradients of the residual are approximated by central finite differences, so each
//! iteration costs `2 n` residual evaluations on top of the line search.

use std::panic::AssertUnwindSafe;

use argmin::core::observers::ObserverMode;
use argmin::core::{Executor, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS as ArgminLBFGS;
use argmin_observer_slog::SlogLogger;
use ndarray::Array1;

use crate::optim::observer::{CallbackObserver, CostCallback};
use crate::optim::{MinimizeError, Minimizer, ResidualFunction};
use crate::parameters::ParameterVector;

use super::utils::{check_termination, collect_solution};

/// L-BFGS minimizer with a More-Thuente line search.
#[derive(Clone)]
pub struct Lbfgs {
    /// The history size for storing previous iterations
    pub m: usize,
    /// Maximum number of iterations before stopping
    pub max_iters: u64,
    /// Target cost function value for convergence criteria
    pub target_cost: f64,
    /// Line search parameter c1 (sufficient decrease condition)
    pub c1: f64,
    /// Line search parameter c2 (curvature condition)
    pub c2: f64,
    /// Print progress to the terminal
    pub show_progress: bool,
    callback: Option<CostCallback>,
}

impl Default for Lbfgs {
    fn default() -> Self {
        LbfgsBuilder::default().build()
    }
}

impl Minimizer for Lbfgs {
    /// Minimizes the residual using the L-BFGS algorithm.
    ///
    /// # Returns
    ///
    /// * `Ok(ParameterVector)` - The optimal parameters if optimization converges
    /// * `Err(MinimizeError)` - Error if optimization fails or doesn't converge
    fn minimize(
        &self,
        residual: &ResidualFunction,
        p0: &ParameterVector,
    ) -> Result<ParameterVector, MinimizeError> {
        if p0.is_empty() {
            return Err(MinimizeError::Setup("empty initial guess".to_string()));
        }

        let linesearch = MoreThuenteLineSearch::new()
            .with_c(self.c1, self.c2)
            .map_err(|e| MinimizeError::Setup(e.to_string()))?;
        let solver: ArgminLBFGS<_, Array1<f64>, Array1<f64>, f64> =
            ArgminLBFGS::new(linesearch, self.m);
        let initial_guess = p0.to_array();

        let res = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let mut executor = Executor::new(residual.clone(), solver).configure(|state| {
                state
                    .param(initial_guess)
                    .max_iters(self.max_iters)
                    .target_cost(self.target_cost)
            });

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
            "L-BFGS finished after {} iterations with cost {}",
            res.state.get_iter(),
            res.state.get_best_cost()
        );

        check_termination(&res.state)?;
        collect_solution(res.state.get_best_param(), p0)
    }
}

/// Builder for configuring and constructing [`Lbfgs`] instances.
///
/// This builder provides a fluent interface for setting up L-BFGS minimizers
/// with custom parameters and configuration options.
pub struct LbfgsBuilder {
    /// Line search parameter c1 for sufficient decrease condition
    c1: f64,
    /// Line search parameter c2 for curvature condition
    c2: f64,
    /// Maximum number of iterations before stopping
    max_iters: u64,
    /// Target cost function value for convergence criteria
    target_cost: f64,
    /// The history size for storing previous iterations
    m: usize,
    show_progress: bool,
    callback: Option<CostCallback>,
}

impl LbfgsBuilder {
    /// Sets the line search parameters.
    ///
    /// # Arguments
    ///
    /// * `c1` - Sufficient decrease parameter (0 < c1 < c2 < 1)
    /// * `c2` - Curvature condition parameter (c1 < c2 < 1)
    pub fn linesearch(mut self, c1: f64, c2: f64) -> Self {
        self.c1 = c1;
        self.c2 = c2;
        self
    }

    /// Sets the maximum number of iterations.
    pub fn max_iters(mut self, max_iters: u64) -> Self {
        self.max_iters = max_iters;
        self
    }

    /// Sets the target cost function value for convergence.
    ///
    /// # Arguments
    ///
    /// * `target_cost` - Target cost value below which optimization stops
    pub fn target_cost(mut self, target_cost: f64) -> Self {
        self.target_cost = target_cost;
        self
    }

    /// Sets the number of past updates kept for the Hessian approximation.
    pub fn history(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

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

    /// Builds and returns an Lbfgs instance with the configured settings.
    pub fn build(self) -> Lbfgs {
        Lbfgs {
            c1: self.c1,
            c2: self.c2,
            m: self.m,
            max_iters: self.max_iters,
            target_cost: self.target_cost,
            show_progress: self.show_progress,
            callback: self.callback,
        }
    }
}

impl Default for LbfgsBuilder {
    /// Creates a new LbfgsBuilder with default settings.
    ///
    /// Default values:
    /// - c1: 1e-4 (sufficient decrease parameter)
    /// - c2: 0.9 (curvature condition parameter)
    /// - m: 5 (history size)
    /// - max_iters: 500
    /// - target_cost: 1e-12
    fn default() -> Self {
        Self {
            c1: 1e-4,
            c2: 0.9,
            m: 5,
            max_iters: 500,
            target_cost: 1e-12,
            show_progress: false,
            callback: None,
        }
    }
}
