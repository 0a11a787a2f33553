//! Profile likelihood analysis for parameter identifiability.
//!
//! The profile of a parameter is obtained by fixing it at each value of a grid
//! and re-fitting all remaining parameters to the data. A parameter is
//! practically identifiable if the fitting error rises clearly on both sides of
//! its best value; a flat profile means the data cannot pin it down.
//!
//! Local fits depend on their starting point, so every grid value is fitted from
//! `n_random` initial guesses drawn from `LogNormal(ln(p), 1)` around the model's
//! default values `p`. The same draws are reused for every grid value. The error
//! reported for a grid value is the mean absolute residual over all restarts
//! that produced a finite residual.

use indicatif::{ProgressBar, ProgressStyle};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use statrs::distribution::LogNormal;

use crate::data::TimeCourseData;
use crate::model::Model;
use crate::optim::{minimize, Fit, FitError, NelderMead};
use crate::parameters::ParameterVector;
use crate::simulation::SimulationSetup;

use super::parameter::ProfileParameter;
use super::results::ProfileResult;

/// Profiles the time-course fitting error over a grid of values of one parameter.
///
/// # Arguments
///
/// * `model` - The model to be fitted; it is not modified
/// * `data` - Time-course data to fit against
/// * `parameter_name` - The parameter to profile
/// * `parameter_values` - The values at which the parameter is fixed
/// * `n_random` - Number of random initial guesses per value (default: 10)
/// * `seed` - Seed of the initial guess draws (default: 0)
/// * `setup` - Integration settings (default: [`SimulationSetup::default`])
/// * `show_progress` - Show a progress bar over the grid (default: false)
///
/// # Returns
///
/// A `ProfileResult` with one error per value, or a `FitError` if the
/// parameter is unknown, no other parameter is left to fit, or the data do not
/// match the model outputs.
///
/// # Example
///
/// ```no_run
/// use kinfit::prelude::*;
///
/// # fn run(model: &Model, data: &TimeCourseData) -> Result<(), FitError> {
/// let parameter: ProfileParameter = "k1=0.5:2.0".parse()?;
/// let profile = profile_likelihood()
///     .model(model)
///     .data(data)
///     .parameter_name(parameter.name())
///     .parameter_values(&parameter.grid(20))
///     .n_random(5)
///     .call()?;
///
/// println!("{:?}", profile.best_value());
/// # Ok(())
/// # }
/// ```
#[bon::builder]
pub fn profile_likelihood(
    model: &Model,
    data: &TimeCourseData,
    parameter_name: &str,
    parameter_values: &[f64],
    #[builder(default = 10)] n_random: usize,
    #[builder(default = 0)] seed: u64,
    #[builder(default)] setup: SimulationSetup,
    #[builder(default = false)] show_progress: bool,
) -> Result<ProfileResult, FitError> {
    if model.parameter_index(parameter_name).is_none() {
        return Err(FitError::InvalidParameterKey(parameter_name.to_string()));
    }

    let guesses = sample_initial_guesses(model, parameter_name, n_random, seed)?;
    let progress = progress_bar(parameter_name, parameter_values.len(), show_progress);

    let mut errors = Vec::with_capacity(parameter_values.len());
    for &value in parameter_values {
        let fixed = model
            .with_parameter(parameter_name, value)
            .ok_or_else(|| FitError::InvalidParameterKey(parameter_name.to_string()))?;

        errors.push(profile_point(&fixed, data, &guesses, setup)?);
        progress.inc(1);
    }

    progress.finish_and_clear();

    Ok(ProfileResult::new(
        parameter_name.to_string(),
        parameter_values.to_vec(),
        errors,
    ))
}

/// Profiles a [`ProfileParameter`] on `n_steps` evenly spaced values.
///
/// Uses the defaults of [`profile_likelihood`] apart from `n_random`.
pub fn profile_parameter(
    model: &Model,
    data: &TimeCourseData,
    parameter: &ProfileParameter,
    n_steps: usize,
    n_random: usize,
) -> Result<ProfileResult, FitError> {
    profile_likelihood()
        .model(model)
        .data(data)
        .parameter_name(parameter.name())
        .parameter_values(&parameter.grid(n_steps))
        .n_random(n_random)
        .call()
}

/// Fits all initial guesses against a model with the profiled parameter fixed.
///
/// Returns the mean absolute residual over the finite ones, or NaN if there are none.
fn profile_point(
    model: &Model,
    data: &TimeCourseData,
    guesses: &[ParameterVector],
    setup: SimulationSetup,
) -> Result<f64, FitError> {
    let Some(template) = guesses.first() else {
        return Ok(f64::NAN);
    };

    let residual = Fit::new(model, template.clone())
        .setup(setup)
        .residual(data.clone())?;
    let minimizer = NelderMead::default();

    let finite: Vec<f64> = guesses
        .par_iter()
        .map(|p0| {
            let result = minimize(&minimizer, &residual, p0);
            residual.at(result.parameters())
        })
        .filter(|error| error.is_finite())
        .map(f64::abs)
        .collect();

    if finite.is_empty() {
        return Ok(f64::NAN);
    }

    Ok(finite.iter().sum::<f64>() / finite.len() as f64)
}

/// Draws initial guesses for every parameter but the profiled one.
///
/// Parameters with a non-positive default are not perturbed.
fn sample_initial_guesses(
    model: &Model,
    profiled: &str,
    n_random: usize,
    seed: u64,
) -> Result<Vec<ParameterVector>, FitError> {
    let free: Vec<(&str, f64)> = model
        .parameter_names()
        .iter()
        .map(String::as_str)
        .zip(model.parameter_values().iter().copied())
        .filter(|(name, _)| *name != profiled)
        .collect();

    if free.is_empty() {
        return Err(FitError::EmptyInitialGuess);
    }

    let distributions = free
        .iter()
        .map(|(_, value)| {
            if *value > 0.0 {
                LogNormal::new(value.ln(), 1.0).ok()
            } else {
                None
            }
        })
        .collect::<Vec<_>>();

    let mut rng = StdRng::seed_from_u64(seed);
    let guesses = (0..n_random)
        .map(|_| {
            free.iter()
                .zip(distributions.iter())
                .map(|((name, value), distribution)| {
                    let sample = match distribution {
                        Some(distribution) => distribution.sample(&mut rng),
                        None => *value,
                    };
                    (*name, sample)
                })
                .collect()
        })
        .collect();

    Ok(guesses)
}

fn progress_bar(parameter_name: &str, len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(&format!(
        "{parameter_name}: {{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} | {{elapsed}}/{{eta}}"
    )) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
    }
    pb
}
