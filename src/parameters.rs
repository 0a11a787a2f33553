//! Ordered parameter vectors.
//!
//! Optimizers work on plain numeric vectors while users think in named
//! parameters. [`ParameterVector`] keeps both views together: the order in which
//! names are inserted is the order of the numeric vector handed to the
//! optimizer, and results are mapped back using that same order.

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Got {names} parameter names but {values} values")]
    LengthMismatch { names: usize, values: usize },
    #[error("Duplicate parameter name: {0}")]
    DuplicateName(String),
}

/// Ordered mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterVector")]
pub struct ParameterVector {
    names: Vec<String>,
    values: Vec<f64>,
}

/// Unchecked serialized form of [`ParameterVector`]
#[derive(Deserialize)]
struct RawParameterVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl TryFrom<RawParameterVector> for ParameterVector {
    type Error = ParameterError;

    fn try_from(raw: RawParameterVector) -> Result<Self, Self::Error> {
        if raw.names.len() != raw.values.len() {
            return Err(ParameterError::LengthMismatch {
                names: raw.names.len(),
                values: raw.values.len(),
            });
        }
        if let Some(name) = raw.names.iter().duplicates().next() {
            return Err(ParameterError::DuplicateName(name.clone()));
        }
        Ok(Self {
            names: raw.names,
            values: raw.values,
        })
    }
}

impl ParameterVector {
    /// Creates an empty parameter vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates a parameter.
    ///
    /// New names are appended, existing names keep their position.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.values[i] = value,
            None => {
                self.names.push(name);
                self.values.push(value);
            }
        }
    }

    /// Returns the value of a parameter.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.position(name).map(|i| self.values[i])
    }

    /// Returns the position of a parameter in the vector.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over (name, value) pairs in vector order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Returns the values as an `ndarray` vector for the optimizers.
    pub fn to_array(&self) -> Array1<f64> {
        Array1::from_vec(self.values.clone())
    }

    /// Creates a vector with the same names and new values.
    ///
    /// # Panics
    /// Panics if `values` does not have one entry per name.
    pub fn with_values(&self, values: &[f64]) -> Self {
        assert_eq!(
            values.len(),
            self.names.len(),
            "Parameter vector length mismatch"
        );
        Self {
            names: self.names.clone(),
            values: values.to_vec(),
        }
    }

    /// Creates a vector with the same names and every value set to NaN.
    pub fn nan_like(&self) -> Self {
        Self {
            names: self.names.clone(),
            values: vec![f64::NAN; self.names.len()],
        }
    }

    /// Returns true if every value is NaN.
    pub fn is_all_nan(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }

    /// Returns a copy without the given parameter.
    pub fn without(&self, name: &str) -> Self {
        self.iter().filter(|(n, _)| *n != name).collect()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ParameterVector {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        let mut vector = Self::new();
        for (name, value) in iter {
            vector.insert(name, value);
        }
        vector
    }
}

impl<K: Into<String>, const N: usize> From<[(K, f64); N]> for ParameterVector {
    fn from(pairs: [(K, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>> From<Vec<(K, f64)>> for ParameterVector {
    fn from(pairs: Vec<(K, f64)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<BTreeMap<String, f64>> for ParameterVector {
    fn from(map: BTreeMap<String, f64>) -> Self {
        map.into_iter().collect()
    }
}

impl From<HashMap<String, f64>> for ParameterVector {
    /// Hash maps have no stable order, so names are sorted
    fn from(map: HashMap<String, f64>) -> Self {
        let mut pairs: Vec<(String, f64)> = map.into_iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs.into_iter().collect()
    }
}

impl From<&ParameterVector> for HashMap<String, f64> {
    fn from(vector: &ParameterVector) -> Self {
        vector.iter().map(|(n, v)| (n.to_string(), v)).collect()
    }
}
