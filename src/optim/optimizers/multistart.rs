//! Multi-start wrapper around any [`Minimizer`].
//!
//! Local minimizers depend on the initial guess. [`MultiStart`] runs the inner
//! minimizer from the initial guess and from additional starting points drawn
//! from a log-normal distribution centred on it, then keeps the candidate with
//! the lowest residual. Starts run in parallel on the rayon thread pool and the
//! draws are seeded, so results are reproducible.

use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use statrs::distribution::LogNormal;

use crate::optim::{MinimizeError, Minimizer, ResidualFunction};
use crate::parameters::ParameterVector;

/// Runs an inner minimizer from several starting points.
///
/// # Example
///
/// ```
/// use kinfit::optim::{MultiStart, NelderMead};
///
/// let minimizer = MultiStart::new(NelderMead::default())
///     .starts(8)
///     .sigma(0.5)
///     .seed(42);
/// ```
#[derive(Clone)]
pub struct MultiStart<M> {
    inner: M,
    n_starts: usize,
    sigma: f64,
    seed: u64,
}

impl<M: Minimizer> MultiStart<M> {
    /// Wraps a minimizer with 10 starts, `sigma = 1.0` and seed 0.
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            n_starts: 10,
            sigma: 1.0,
            seed: 0,
        }
    }

    /// Total number of starts, including the initial guess itself.
    pub fn starts(mut self, n_starts: usize) -> Self {
        self.n_starts = n_starts.max(1);
        self
    }

    /// Scale of the log-normal perturbation.
    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Draws the starting points. The first one is `p0`.
    ///
    /// Positive values are sampled from `LogNormal(ln(v), sigma)`; zero and
    /// negative values are kept as they are.
    fn starting_points(
        &self,
        p0: &ParameterVector,
    ) -> Result<Vec<ParameterVector>, MinimizeError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut starts = Vec::with_capacity(self.n_starts);
        starts.push(p0.clone());

        let distributions = p0
            .values()
            .iter()
            .map(|v| {
                if *v > 0.0 {
                    LogNormal::new(v.ln(), self.sigma)
                        .map(Some)
                        .map_err(|e| MinimizeError::Setup(e.to_string()))
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        for _ in 1..self.n_starts {
            let values: Vec<f64> = distributions
                .iter()
                .zip(p0.values())
                .map(|(distribution, v)| match distribution {
                    Some(distribution) => distribution.sample(&mut rng),
                    None => *v,
                })
                .collect();
            starts.push(p0.with_values(&values));
        }

        Ok(starts)
    }
}

impl<M: Minimizer> Minimizer for MultiStart<M> {
    /// Returns the candidate with the lowest finite residual.
    ///
    /// Fails with `MinimizeError::NoSolution` only if every start fails.
    fn minimize(
        &self,
        residual: &ResidualFunction,
        p0: &ParameterVector,
    ) -> Result<ParameterVector, MinimizeError> {
        let starts = self.starting_points(p0)?;

        let candidates: Vec<(f64, ParameterVector)> = starts
            .par_iter()
            .filter_map(|start| match self.inner.minimize(residual, start) {
                Ok(solution) => Some((residual.at(&solution), solution)),
                Err(e) => {
                    log::debug!("Start {:?} failed: {e}", start.values());
                    None
                }
            })
            .filter(|(cost, _)| cost.is_finite())
            .collect();

        log::debug!(
            "{} of {} starts produced a solution",
            candidates.len(),
            starts.len()
        );

        candidates
            .into_iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, solution)| solution)
            .ok_or(MinimizeError::NoSolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::NelderMead;
    use approx::assert_relative_eq;

    #[test]
    fn test_starting_points_are_reproducible() {
        let p0 = ParameterVector::from([("a", 1.0), ("b", 0.0)]);
        let minimizer = MultiStart::new(NelderMead::default()).starts(5).seed(7);

        let first = minimizer.starting_points(&p0).unwrap();
        let second = minimizer.starting_points(&p0).unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        assert_eq!(first[0], p0);
        assert!(first.iter().all(|p| p.get("b") == Some(0.0)));
        assert!(first.iter().skip(1).all(|p| p.get("a").unwrap() > 0.0));
    }

    /// Jumps to the bottom of whichever basin the start is in
    fn jump_to_basin(
        _: &ResidualFunction,
        p0: &ParameterVector,
    ) -> Result<ParameterVector, MinimizeError> {
        let x = p0.values()[0];
        let target = if (x - 1.0).abs() < (x - 10.0).abs() {
            1.0
        } else {
            10.0
        };
        Ok(p0.with_values(&[target]))
    }

    fn failing(
        _: &ResidualFunction,
        _: &ParameterVector,
    ) -> Result<ParameterVector, MinimizeError> {
        Err(MinimizeError::NoSolution)
    }

    #[test]
    fn test_picks_global_minimum() {
        // Two basins; the deeper one is far from the initial guess
        let residual = ResidualFunction::new(["a"], |p| {
            let x = p[0];
            ((x - 1.0).powi(2) + 0.5).min((x - 10.0).powi(2))
        });

        let p0 = ParameterVector::from([("a", 1.0)]);
        let result = MultiStart::new(jump_to_basin)
            .starts(50)
            .sigma(2.0)
            .seed(1)
            .minimize(&residual, &p0)
            .unwrap();

        assert_relative_eq!(result.get("a").unwrap(), 10.0);
    }

    #[test]
    fn test_all_starts_failing() {
        let residual = ResidualFunction::new(["a"], |p| p[0]);
        let result = MultiStart::new(failing)
            .starts(3)
            .minimize(&residual, &ParameterVector::from([("a", 1.0)]));
        assert!(matches!(result, Err(MinimizeError::NoSolution)));
    }
}
