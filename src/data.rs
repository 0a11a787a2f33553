//! Observation sets used as fitting targets.
//!
//! Two shapes of data are supported:
//!
//! - [`SteadyStateData`]: one observed value per output name
//! - [`TimeCourseData`]: a table of strictly increasing time points with one
//!   column per observed output. Missing cells are stored as NaN and are
//!   excluded from the residual.
//!
//! Observed names may refer to state variables or fluxes and may be any subset
//! of the model outputs.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulation::output::CombinedOutput;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Time points must be finite and strictly increasing")]
    NonIncreasingTimes,
    #[error("Row {row} has {found} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Got {found} rows for {expected} time points")]
    RowCount { expected: usize, found: usize },
    #[error("Unknown column {0}")]
    UnknownColumn(String),
    #[error("Column {0} appears more than once")]
    DuplicateColumn(String),
}

/// Observed steady-state values keyed by output name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SteadyStateData(BTreeMap<String, f64>);

impl SteadyStateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Keeps only the given names.
    pub fn select(&self, names: &[&str]) -> Self {
        self.iter().filter(|(n, _)| names.contains(n)).collect()
    }

    /// Takes the last row of a simulation as steady-state data.
    pub fn from_output(output: &CombinedOutput) -> Self {
        match output.last_row() {
            Some(row) => output
                .names()
                .iter()
                .zip(row.iter())
                .map(|(n, v)| (n.clone(), *v))
                .collect(),
            None => Self::default(),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for SteadyStateData {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<K: Into<String>, const N: usize> From<[(K, f64); N]> for SteadyStateData {
    fn from(pairs: [(K, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Observed time course: time points × named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeCourseData {
    times: Vec<f64>,
    columns: Vec<String>,
    /// Shape (n_times, n_columns); NaN marks a missing observation
    values: Array2<f64>,
}

impl TimeCourseData {
    /// Creates a time course from a dense table.
    ///
    /// # Arguments
    /// * `times` - Strictly increasing, finite time points
    /// * `columns` - Observed output names
    /// * `rows` - One row per time point with one value per column; NaN marks missing cells
    ///
    /// # Errors
    /// * `DataError::NonIncreasingTimes` if the time points are not strictly increasing
    /// * `DataError::RowLength` if a row does not match the number of columns
    /// * `DataError::DuplicateColumn` if a column name is repeated
    pub fn new<S: Into<String>>(
        times: Vec<f64>,
        columns: Vec<S>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        validate_times(&times)?;
        validate_columns(&columns)?;

        if rows.len() != times.len() {
            return Err(DataError::RowCount {
                expected: times.len(),
                found: rows.len(),
            });
        }

        let mut values = Array2::from_elem((times.len(), columns.len()), f64::NAN);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DataError::RowLength {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            for (j, value) in row.iter().enumerate() {
                values[[i, j]] = *value;
            }
        }

        Ok(Self {
            times,
            columns,
            values,
        })
    }

    /// Creates a time course from sparse rows of (name, value) pairs.
    ///
    /// Columns are the sorted union of all names; absent cells become NaN.
    pub fn from_rows<K, R>(rows: impl IntoIterator<Item = (f64, R)>) -> Result<Self, DataError>
    where
        K: Into<String>,
        R: IntoIterator<Item = (K, f64)>,
    {
        let rows: Vec<(f64, BTreeMap<String, f64>)> = rows
            .into_iter()
            .map(|(t, row)| (t, row.into_iter().map(|(k, v)| (k.into(), v)).collect()))
            .collect();

        let columns: Vec<String> = rows
            .iter()
            .flat_map(|(_, row)| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let times: Vec<f64> = rows.iter().map(|(t, _)| *t).collect();
        let dense = rows
            .iter()
            .map(|(_, row)| {
                columns
                    .iter()
                    .map(|c| row.get(c).copied().unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();

        Self::new(times, columns, dense)
    }

    /// Takes every row of a simulation as time-course data.
    pub fn from_output(output: &CombinedOutput) -> Result<Self, DataError> {
        let rows = output.values().outer_iter().map(|r| r.to_vec()).collect();
        Self::new(output.time().to_vec(), output.names().to_vec(), rows)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Returns the observations of one column.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.columns.iter().position(|c| c == name)?;
        Some(self.values.column(j).to_vec())
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Keeps only the given columns, in the given order.
    ///
    /// # Errors
    /// Returns `DataError::UnknownColumn` if a name is not a column and
    /// `DataError::DuplicateColumn` if a name is given twice.
    pub fn select(&self, names: &[&str]) -> Result<Self, DataError> {
        validate_columns(names)?;
        let indices = names
            .iter()
            .map(|n| {
                self.columns
                    .iter()
                    .position(|c| c == n)
                    .ok_or_else(|| DataError::UnknownColumn(n.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            times: self.times.clone(),
            columns: names.iter().map(|n| n.to_string()).collect(),
            values: self.values.select(Axis(1), &indices),
        })
    }
}

fn validate_times(times: &[f64]) -> Result<(), DataError> {
    if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] <= w[0]) {
        return Err(DataError::NonIncreasingTimes);
    }
    Ok(())
}

fn validate_columns<S: AsRef<str>>(columns: &[S]) -> Result<(), DataError> {
    match columns.iter().map(<S as AsRef<str>>::as_ref).duplicates().next() {
        Some(name) => Err(DataError::DuplicateColumn(name.to_string())),
        None => Ok(()),
    }
}

/// Data a model is fitted against.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationSet {
    SteadyState(SteadyStateData),
    TimeCourse(TimeCourseData),
}

impl ObservationSet {
    /// Names of all observed outputs.
    pub fn names(&self) -> Vec<&str> {
        match self {
            ObservationSet::SteadyState(data) => data.names().collect(),
            ObservationSet::TimeCourse(data) => data.columns().iter().map(String::as_str).collect(),
        }
    }
}

impl From<SteadyStateData> for ObservationSet {
    fn from(data: SteadyStateData) -> Self {
        ObservationSet::SteadyState(data)
    }
}

impl From<TimeCourseData> for ObservationSet {
    fn from(data: TimeCourseData) -> Self {
        ObservationSet::TimeCourse(data)
    }
}
