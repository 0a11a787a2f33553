/// Results from a profile likelihood analysis for a single parameter.
///
/// For every tested value of the profiled parameter, `errors` holds the mean
/// absolute fitting error over all random restarts that produced a finite
/// residual. Values for which no restart succeeded have an error of NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileResult {
    /// Name of the profiled parameter
    pub(crate) param_name: String,
    /// Vector of parameter values tested during profiling
    pub(crate) param_values: Vec<f64>,
    /// Mean fitting error for each parameter value
    pub(crate) errors: Vec<f64>,
}

impl ProfileResult {
    pub fn new(param_name: String, param_values: Vec<f64>, errors: Vec<f64>) -> Self {
        Self {
            param_name,
            param_values,
            errors,
        }
    }

    /// Returns the name of the profiled parameter.
    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    /// Returns the vector of parameter values tested during profiling.
    pub fn param_values(&self) -> &[f64] {
        &self.param_values
    }

    /// Returns the mean fitting error for each parameter value.
    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    /// Iterates over (parameter value, error) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.param_values
            .iter()
            .copied()
            .zip(self.errors.iter().copied())
    }

    /// Returns the parameter value with the lowest finite error.
    pub fn best_value(&self) -> Option<f64> {
        self.iter()
            .filter(|(_, error)| error.is_finite())
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(value, _)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_value_skips_nan() {
        let result = ProfileResult::new(
            "k".to_string(),
            vec![1.0, 2.0, 3.0],
            vec![0.5, f64::NAN, 0.1],
        );
        assert_eq!(result.best_value(), Some(3.0));

        let result = ProfileResult::new("k".to_string(), vec![1.0], vec![f64::NAN]);
        assert_eq!(result.best_value(), None);
    }
}
