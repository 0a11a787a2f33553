use std::str::FromStr;

use regex::Regex;

use crate::optim::FitError;

/// Configuration for a parameter to be profiled.
///
/// Specifies the parameter name and the range of values to test during profiling.
/// Created through [`ProfileParameter::new`] or parsed from a string, both of
/// which check the range.
///
/// # Notes
///
/// - The `name` field specifies the name of the parameter to profile.
/// - The `from` field specifies the lower bound of the parameter range.
/// - The `to` field specifies the upper bound of the parameter range.
/// - The `from` value must be less than the `to` value.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileParameter {
    /// Name of the profiled parameter
    pub(crate) name: String,

    /// From value (lower bound of the range)
    pub(crate) from: f64,

    /// To value (upper bound of the range)
    pub(crate) to: f64,
}

impl ProfileParameter {
    /// Creates a new ProfileParameter instance.
    ///
    /// # Returns
    ///
    /// A Result containing either:
    /// - Ok(ProfileParameter): A new valid ProfileParameter instance
    /// - Err(FitError): An error if the range is invalid (from >= to or NaN bounds)
    pub fn new(name: impl Into<String>, from: f64, to: f64) -> Result<Self, FitError> {
        if from.is_nan() || to.is_nan() || from >= to {
            return Err(FitError::ProfileParameterParseError(format!(
                "From value {from} must be less than to value {to}"
            )));
        }

        Ok(Self {
            name: name.into(),
            from,
            to,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `n_steps` evenly spaced values from `from` to `to`, both included.
    pub fn grid(&self, n_steps: usize) -> Vec<f64> {
        match n_steps {
            0 => Vec::new(),
            1 => vec![self.from],
            n => {
                let step = (self.to - self.from) / (n - 1) as f64;
                (0..n).map(|i| self.from + step * i as f64).collect()
            }
        }
    }
}

impl FromStr for ProfileParameter {
    type Err = FitError;

    /// Parses a ProfileParameter from a string.
    ///
    /// The string should be in the format "name=from:to", where:
    /// - name is the parameter name (must be alphanumeric with underscores)
    /// - from is the lower bound of the range (must be a valid floating point number)
    /// - to is the upper bound of the range (must be a valid floating point number)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Example: "k_cat=1.0:2.0" or "k1=1e-3:0.5"
        let pattern = Regex::new(r"^(\w+)=([-+0-9.eE]+):([-+0-9.eE]+)$")
            .map_err(|e| FitError::ProfileParameterParseError(e.to_string()))?;
        let caps = pattern
            .captures(s)
            .ok_or(FitError::ProfileParameterParseError(s.to_string()))?;

        let from = caps[2]
            .parse::<f64>()
            .map_err(|e| FitError::ProfileParameterParseError(e.to_string()))?;
        let to = caps[3]
            .parse::<f64>()
            .map_err(|e| FitError::ProfileParameterParseError(e.to_string()))?;

        Self::new(&caps[1], from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_profile_parameter_parse() {
        let input = "K_M=50.0:100.0";
        let param = ProfileParameter::from_str(input).expect("Should not fail");
        assert_eq!(param.name, "K_M");
        assert_eq!(param.from, 50.0);
        assert_eq!(param.to, 100.0);

        let input = "k1=1e-3:0.5";
        let param = ProfileParameter::from_str(input).expect("Should not fail");
        assert_eq!(param.name, "k1");
        assert_eq!(param.from, 1e-3);
        assert_eq!(param.to, 0.5);
    }

    #[test]
    fn test_profile_parameter_parse_error() {
        for input in [
            "K_M=50.0:100.0:200.0",
            "K_M=50,0:100,0",
            "K_M=50.0,100.0:",
            "K_M=100.0:50.0",
        ] {
            let case = ProfileParameter::from_str(input);
            assert!(case.is_err(), "Case {input} should fail");
        }
    }

    #[test]
    fn test_grid() {
        let param = ProfileParameter::new("k1", 1.0, 2.0).expect("Valid range");

        let grid = param.grid(5);
        assert_eq!(grid.len(), 5);
        assert_relative_eq!(grid[0], 1.0);
        assert_relative_eq!(grid[2], 1.5);
        assert_relative_eq!(grid[4], 2.0);
        assert_eq!(param.grid(1), vec![1.0]);
        assert!(param.grid(0).is_empty());
    }

    #[test]
    fn test_new_rejects_empty_range() {
        for (from, to) in [(2.0, 1.0), (1.0, 1.0), (f64::NAN, 1.0)] {
            let result = ProfileParameter::new("k1", from, to);
            assert!(
                matches!(result, Err(FitError::ProfileParameterParseError(_))),
                "Range {from}..{to} should fail"
            );
        }
    }
}
