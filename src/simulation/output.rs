//! Output Module for simulation results
//!
//! [`CombinedOutput`] holds concentrations and fluxes side by side: one row per
//! recorded time point and one column per model output (variables first, then
//! fluxes). A steady-state evaluation produces a single row.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1};

/// Combined concentration and flux output of a simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedOutput {
    time: Vec<f64>,
    names: Vec<String>,
    values: Array2<f64>,
}

impl CombinedOutput {
    /// Creates a new output.
    ///
    /// # Arguments
    /// * `time` - Recorded time points
    /// * `names` - Output names, one per column
    /// * `values` - Matrix of shape (time.len(), names.len())
    pub(crate) fn new(time: Vec<f64>, names: Vec<String>, values: Array2<f64>) -> Self {
        debug_assert_eq!(values.dim(), (time.len(), names.len()));
        Self {
            time,
            names,
            values,
        }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Returns the column index of an output.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns the trajectory of a single output.
    pub fn get(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|j| self.values.column(j))
    }

    /// Returns the last recorded row, which is the steady state for steady-state runs.
    pub fn last_row(&self) -> Option<ArrayView1<'_, f64>> {
        match self.values.nrows() {
            0 => None,
            n => Some(self.values.row(n - 1)),
        }
    }

    /// Returns all outputs at a given row as a name → value mapping.
    pub fn row_mapping(&self, row: usize) -> Option<BTreeMap<String, f64>> {
        if row >= self.values.nrows() {
            return None;
        }

        Some(
            self.names
                .iter()
                .cloned()
                .zip(self.values.row(row).iter().copied())
                .collect(),
        )
    }
}
