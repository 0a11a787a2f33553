//! Kinetic model container.
//!
//! A [`Model`] is a set of named parameters, named state variables with initial
//! conditions and named reactions. Each reaction has a rate law given as a Rust
//! closure and a stoichiometry over the state variables. The derivative of a
//! variable is the stoichiometry-weighted sum of all reaction rates:
//!
//! dx_i/dt = Σ_j N_ij * v_j(x, p, t)
//!
//! Models expose two kinds of outputs: the state variables (concentrations) and
//! the reaction rates (fluxes). Both can be observed and fitted.
//!
//! # Example
//!
//! ```
//! use kinfit::model::Model;
//!
//! let model = Model::builder()
//!     .parameter("k1", 1.0)
//!     .parameter("k2", 2.0)
//!     .variable("x", 0.0)
//!     .reaction("v1", |c| c.get("k1"), [("x", 1.0)])
//!     .reaction("v2", |c| c.get("k2") * c.get("x"), [("x", -1.0)])
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(model.output_names(), vec!["x", "v1", "v2"]);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use thiserror::Error;

/// Rate law of a reaction, evaluated against the current [`RateContext`].
pub type RateFn = Arc<dyn Fn(&RateContext) -> f64 + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Duplicate names in model: {0:?}")]
    DuplicateNames(Vec<String>),
    #[error("Reaction {reaction} references unknown variable {variable}")]
    UnknownStoichiometryTarget { reaction: String, variable: String },
    #[error("Model has no variables")]
    NoVariables,
}

/// Where a name lives inside a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Variable(usize),
    Parameter(usize),
}

/// View on the current state handed to rate laws.
///
/// Names are resolved against variables first, then parameters. Unknown names
/// evaluate to NaN, which the simulation reports as a non-finite state.
pub struct RateContext<'a> {
    symbols: &'a HashMap<String, Symbol>,
    time: f64,
    variables: &'a [f64],
    parameters: &'a [f64],
}

impl RateContext<'_> {
    /// Returns the current value of a variable or parameter.
    pub fn get(&self, name: &str) -> f64 {
        match self.symbols.get(name) {
            Some(Symbol::Variable(i)) => self.variables[*i],
            Some(Symbol::Parameter(i)) => self.parameters[*i],
            None => f64::NAN,
        }
    }

    /// Returns the current integration time.
    pub fn time(&self) -> f64 {
        self.time
    }
}

/// A reaction with a rate law and its stoichiometry.
#[derive(Clone)]
pub struct Reaction {
    name: String,
    rate: RateFn,
    /// Pairs of (variable index, stoichiometric coefficient)
    stoichiometry: Vec<(usize, f64)>,
}

impl Reaction {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("name", &self.name)
            .field("stoichiometry", &self.stoichiometry)
            .finish()
    }
}

/// A kinetic model with named parameters, variables and reactions.
///
/// Models are immutable once built. Parameter overrides are passed as value
/// slices to the evaluation functions, so a single model can be shared across
/// threads and optimizer iterations without copying.
#[derive(Debug, Clone)]
pub struct Model {
    parameters: Vec<String>,
    parameter_values: Vec<f64>,
    variables: Vec<String>,
    initial_conditions: Vec<f64>,
    reactions: Vec<Reaction>,
    symbols: Arc<HashMap<String, Symbol>>,
}

impl Model {
    /// Creates an empty [`ModelBuilder`].
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// Parameter names in declaration order.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameters
    }

    /// Default parameter values, aligned with [`Model::parameter_names`].
    pub fn parameter_values(&self) -> &[f64] {
        &self.parameter_values
    }

    /// Returns the default value of a parameter.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameter_index(name).map(|i| self.parameter_values[i])
    }

    /// Returns the index of a parameter in [`Model::parameter_names`].
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        match self.symbols.get(name) {
            Some(Symbol::Parameter(i)) => Some(*i),
            _ => None,
        }
    }

    /// Returns a copy of the model with a changed default parameter value.
    ///
    /// Returns `None` if the parameter does not exist.
    pub fn with_parameter(&self, name: &str, value: f64) -> Option<Model> {
        let index = self.parameter_index(name)?;
        let mut model = self.clone();
        model.parameter_values[index] = value;
        Some(model)
    }

    /// Variable names in declaration order.
    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }

    /// Initial conditions, aligned with [`Model::variable_names`].
    pub fn initial_conditions(&self) -> &[f64] {
        &self.initial_conditions
    }

    /// Reaction (flux) names in declaration order.
    pub fn flux_names(&self) -> Vec<&str> {
        self.reactions.iter().map(|r| r.name.as_str()).collect()
    }

    /// All observable outputs: variables followed by fluxes.
    pub fn output_names(&self) -> Vec<&str> {
        self.variables
            .iter()
            .map(String::as_str)
            .chain(self.reactions.iter().map(|r| r.name.as_str()))
            .collect()
    }

    /// Number of observable outputs.
    pub fn n_outputs(&self) -> usize {
        self.variables.len() + self.reactions.len()
    }

    /// Evaluates all reaction rates for a given state.
    ///
    /// # Arguments
    /// * `t` - Current time
    /// * `y` - State vector aligned with the variables
    /// * `parameters` - Parameter values aligned with the parameters
    /// * `out` - Buffer receiving one rate per reaction
    pub fn fluxes_into(&self, t: f64, y: &[f64], parameters: &[f64], out: &mut [f64]) {
        let context = RateContext {
            symbols: &self.symbols,
            time: t,
            variables: y,
            parameters,
        };

        for (rate, reaction) in out.iter_mut().zip(self.reactions.iter()) {
            *rate = (reaction.rate)(&context);
        }
    }

    /// Evaluates the right-hand side of the ODE system.
    pub fn derivatives_into(&self, t: f64, y: &[f64], parameters: &[f64], dy: &mut [f64]) {
        dy.fill(0.0);

        let context = RateContext {
            symbols: &self.symbols,
            time: t,
            variables: y,
            parameters,
        };

        for reaction in self.reactions.iter() {
            let rate = (reaction.rate)(&context);
            for &(i, coefficient) in reaction.stoichiometry.iter() {
                dy[i] += coefficient * rate;
            }
        }
    }
}

/// Fluent builder for [`Model`].
#[derive(Default)]
pub struct ModelBuilder {
    parameters: Vec<(String, f64)>,
    variables: Vec<(String, f64)>,
    reactions: Vec<(String, RateFn, Vec<(String, f64)>)>,
}

impl ModelBuilder {
    /// Adds a parameter with its default value.
    pub fn parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.push((name.into(), value));
        self
    }

    /// Adds a state variable with its initial condition.
    pub fn variable(mut self, name: impl Into<String>, initial: f64) -> Self {
        self.variables.push((name.into(), initial));
        self
    }

    /// Adds a reaction.
    ///
    /// # Arguments
    /// * `name` - Name of the reaction, also the name of its flux output
    /// * `rate` - Rate law
    /// * `stoichiometry` - Pairs of (variable name, coefficient)
    pub fn reaction<F, S, I>(mut self, name: impl Into<String>, rate: F, stoichiometry: I) -> Self
    where
        F: Fn(&RateContext) -> f64 + Send + Sync + 'static,
        S: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
    {
        let stoichiometry = stoichiometry
            .into_iter()
            .map(|(name, coefficient)| (name.into(), coefficient))
            .collect();
        self.reactions.push((name.into(), Arc::new(rate), stoichiometry));
        self
    }

    /// Validates the declarations and builds the model.
    ///
    /// # Errors
    /// * `ModelError::NoVariables` if no variable was declared
    /// * `ModelError::DuplicateNames` if a name is declared more than once
    /// * `ModelError::UnknownStoichiometryTarget` if a reaction references an undeclared variable
    pub fn build(self) -> Result<Model, ModelError> {
        if self.variables.is_empty() {
            return Err(ModelError::NoVariables);
        }

        let duplicates: Vec<String> = self
            .parameters
            .iter()
            .map(|(n, _)| n)
            .chain(self.variables.iter().map(|(n, _)| n))
            .chain(self.reactions.iter().map(|(n, _, _)| n))
            .duplicates()
            .cloned()
            .collect();

        if !duplicates.is_empty() {
            return Err(ModelError::DuplicateNames(duplicates));
        }

        let mut symbols = HashMap::new();
        for (i, (name, _)) in self.variables.iter().enumerate() {
            symbols.insert(name.clone(), Symbol::Variable(i));
        }
        for (i, (name, _)) in self.parameters.iter().enumerate() {
            symbols.insert(name.clone(), Symbol::Parameter(i));
        }

        let reactions = self
            .reactions
            .into_iter()
            .map(|(name, rate, stoichiometry)| {
                let stoichiometry = stoichiometry
                    .into_iter()
                    .map(|(variable, coefficient)| match symbols.get(&variable) {
                        Some(Symbol::Variable(i)) => Ok((*i, coefficient)),
                        _ => Err(ModelError::UnknownStoichiometryTarget {
                            reaction: name.clone(),
                            variable,
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Reaction {
                    name,
                    rate,
                    stoichiometry,
                })
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        let (parameters, parameter_values) = self.parameters.into_iter().unzip();
        let (variables, initial_conditions) = self.variables.into_iter().unzip();

        Ok(Model {
            parameters,
            parameter_values,
            variables,
            initial_conditions,
            reactions,
            symbols: Arc::new(symbols),
        })
    }
}
