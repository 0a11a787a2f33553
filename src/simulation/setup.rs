//! Setup module for configuring simulations.
//!
//! This module provides the [`SimulationSetup`] struct and its builder for configuring
//! numerical integration parameters. It handles:
//!
//! - Start time of the integration
//! - Integration step size
//! - Steady-state detection (tolerance and time budget)

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Configuration for numerical integration of a model
///
/// # Fields
///
/// * `t0` - Start time of the integration (default: 0.0)
/// * `dt` - Maximum integration step size (default: 0.1)
/// * `t_max` - Time budget for reaching a steady state (default: 1e4)
/// * `steady_state_tol` - Steady state is reached once max |dy/dt| falls below this value (default: 1e-10)
///
/// # Examples
///
/// ```
/// use kinfit::simulation::SimulationSetupBuilder;
///
/// let setup = SimulationSetupBuilder::default()
///     .t0(0.0)
///     .dt(0.05)
///     .steady_state_tol(1e-8)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Builder, Serialize, Deserialize)]
pub struct SimulationSetup {
    #[builder(default = "0.0")]
    pub t0: f64,
    #[builder(default = "0.1")]
    pub dt: f64,
    #[builder(default = "1e4")]
    pub t_max: f64,
    #[builder(default = "1e-10")]
    pub steady_state_tol: f64,
}

impl Default for SimulationSetup {
    fn default() -> Self {
        Self {
            t0: 0.0,
            dt: 0.1,
            t_max: 1e4,
            steady_state_tol: 1e-10,
        }
    }
}
