//! Tests for the fitting entry points.
//!
//! All tests use a linear chain model
//!
//!     ∅ --v1--> x --v2--> y --v3--> ∅
//!
//! with v1 = k1, v2 = k2 * x and v3 = k3 * y. With k1 = 1, k2 = 2 and k3 = 1
//! the steady state is x = 0.5, y = 1.0 and every flux equals 1.0.

#[cfg(test)]
mod test_fit {
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use approx::assert_relative_eq;
    use kinfit::prelude::*;
    use ndarray::Array2;
    use pretty_assertions::assert_eq;

    fn chain() -> Model {
        Model::builder()
            .parameter("k1", 1.0)
            .parameter("k2", 2.0)
            .parameter("k3", 1.0)
            .variable("x", 0.0)
            .variable("y", 0.0)
            .reaction("v1", |c| c.get("k1"), [("x", 1.0)])
            .reaction("v2", |c| c.get("k2") * c.get("x"), [("x", -1.0), ("y", 1.0)])
            .reaction("v3", |c| c.get("k3") * c.get("y"), [("y", -1.0)])
            .build()
            .expect("Failed to build model")
    }

    fn p0() -> ParameterVector {
        ParameterVector::from([("k1", 1.038), ("k2", 1.87), ("k3", 1.093)])
    }

    fn steady_state_data(model: &Model) -> SteadyStateData {
        let output = evaluate(
            model,
            &ParameterVector::new(),
            &Mode::SteadyState,
            &SimulationSetup::default(),
            RK4,
        )
        .expect("Failed to simulate");
        SteadyStateData::from_output(&output)
    }

    fn time_course_data(model: &Model) -> TimeCourseData {
        let output = evaluate(
            model,
            &ParameterVector::new(),
            &Mode::TimeCourse(vec![0.5, 1.0, 2.0, 3.0, 5.0, 8.0]),
            &SimulationSetup::default(),
            RK4,
        )
        .expect("Failed to simulate");
        TimeCourseData::from_output(&output).expect("Failed to convert output")
    }

    /// Returns a minimizer that counts its invocations and always fails
    fn counting_minimizer(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(&ResidualFunction, &ParameterVector) -> Result<ParameterVector, MinimizeError> {
        move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(MinimizeError::NoSolution)
        }
    }

    fn assert_recovers_truth(result: &FitResult) {
        let fitted = result.converged().expect("Fit did not converge");
        assert_eq!(fitted.names(), p0().names());
        assert_relative_eq!(fitted.get("k1").unwrap(), 1.0, epsilon = 1e-3);
        assert_relative_eq!(fitted.get("k2").unwrap(), 2.0, epsilon = 1e-3);
        assert_relative_eq!(fitted.get("k3").unwrap(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_steady_state_recovers_truth() {
        // ARRANGE
        let _ = env_logger::builder().is_test(true).try_init();
        let model = chain();
        let data = steady_state_data(&model);

        // ACT
        let result = steady_state(&model, p0(), &data).expect("Failed to fit");

        // ASSERT
        assert_recovers_truth(&result);
    }

    #[test]
    fn test_time_course_recovers_truth() {
        // ARRANGE
        let model = chain();
        let data = time_course_data(&model);

        // ACT
        let result = time_course(&model, p0(), &data).expect("Failed to fit");

        // ASSERT
        assert_recovers_truth(&result);
    }

    #[test]
    fn test_model_is_not_modified() {
        let model = chain();
        let data = steady_state_data(&model);

        let _ = steady_state(&model, p0(), &data).expect("Failed to fit");

        assert_eq!(model.parameter_values(), &[1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_subset_of_outputs() {
        // ARRANGE
        let model = chain();
        let full = steady_state_data(&model);

        // ACT & ASSERT
        for subset in [
            vec!["x"],
            vec!["v2"],
            vec!["x", "v3"],
            vec!["y", "v1", "v2"],
        ] {
            let data = full.select(&subset);
            let result = steady_state(&model, p0(), &data);
            assert!(result.is_ok(), "Subset {subset:?} should not raise");
        }

        let data = time_course_data(&model).select(&["y", "v2"]).unwrap();
        assert!(time_course(&model, p0(), &data).is_ok());
    }

    #[test]
    fn test_subset_fit_is_at_least_as_good_on_its_subset() {
        // ARRANGE
        // Noisy observations that no parameter set reproduces exactly
        let model = chain();
        let full = SteadyStateData::from([
            ("x", 0.55),
            ("y", 1.0),
            ("v1", 1.0),
            ("v2", 0.95),
            ("v3", 1.05),
        ]);
        let full_fit = steady_state(&model, p0(), &full)
            .expect("Failed to fit")
            .converged()
            .cloned()
            .expect("Full fit did not converge");

        for subset in [vec!["x", "v2"], vec!["y", "v1", "v2"], vec!["x", "y", "v3"]] {
            let data = full.select(&subset);

            // ACT
            let subset_fit = steady_state(&model, p0(), &data)
                .expect("Failed to fit")
                .converged()
                .cloned()
                .expect("Subset fit did not converge");

            // ASSERT
            let residual = Fit::new(&model, p0())
                .residual(data)
                .expect("Failed to build residual");
            let on_subset = residual.at(&subset_fit);
            let full_on_subset = residual.at(&full_fit);
            assert!(
                on_subset <= full_on_subset + 1e-9,
                "Subset {subset:?}: {on_subset} > {full_on_subset}"
            );
        }
    }

    #[test]
    fn test_partial_observations_with_missing_values() {
        // ARRANGE
        let model = chain();
        let full = time_course_data(&model);
        let x = full.column("x").unwrap();
        let v3 = full.column("v3").unwrap();

        // Every other value of each column is missing
        let rows = full
            .times()
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let row = if i % 2 == 0 {
                    vec![("x", x[i])]
                } else {
                    vec![("v3", v3[i])]
                };
                (*t, row)
            })
            .collect::<Vec<_>>();
        let data = TimeCourseData::from_rows(rows).unwrap();

        // ACT
        let result = time_course(&model, p0(), &data).expect("Failed to fit");

        // ASSERT
        assert_recovers_truth(&result);
    }

    #[test]
    fn test_no_matching_observables_never_calls_minimizer() {
        // ARRANGE
        let model = chain();
        let calls = Arc::new(AtomicUsize::new(0));

        let empty = SteadyStateData::new();
        let foreign = SteadyStateData::from([("z", 1.0), ("w", 2.0)]);
        let all_missing = TimeCourseData::new(vec![1.0], vec!["x"], vec![vec![f64::NAN]]).unwrap();

        // ACT
        let fit = Fit::new(&model, p0()).minimizer(counting_minimizer(calls.clone()));
        let results = [
            fit.steady_state(&empty),
            fit.steady_state(&foreign),
            fit.time_course(&all_missing),
        ];

        // ASSERT
        for result in results {
            assert!(matches!(
                result,
                Err(FitError::NoMatchingObservables { .. })
            ));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_minimizer_returns_nan_sentinel() {
        // ARRANGE
        let model = chain();
        let data = steady_state_data(&model);
        let calls = Arc::new(AtomicUsize::new(0));

        // ACT
        let result = Fit::new(&model, p0())
            .minimizer(counting_minimizer(calls.clone()))
            .steady_state(&data)
            .expect("Structural validation should pass");

        // ASSERT
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!result.is_converged());
        assert_eq!(result.parameters().names(), p0().names());
        assert!(result.parameters().is_all_nan());
    }

    #[test]
    fn test_fixed_output_minimizer_is_passed_through() {
        // ARRANGE
        let model = chain();
        let data = steady_state_data(&model);
        let fixed = ParameterVector::from([("k1", 3.0), ("k2", 0.1), ("k3", 42.0)]);
        let expected = fixed.clone();

        let minimizer = move |_: &ResidualFunction, _: &ParameterVector| {
            Ok::<_, MinimizeError>(fixed.clone())
        };

        // ACT
        let result = Fit::new(&model, p0())
            .minimizer(minimizer)
            .steady_state(&data)
            .expect("Failed to fit");

        // ASSERT
        assert_eq!(result, FitResult::Converged(expected));
    }

    #[test]
    fn test_minimizer_sees_initial_guess_order() {
        // ARRANGE
        let model = chain();
        let data = steady_state_data(&model);
        let p0 = ParameterVector::from([("k3", 1.0), ("k1", 1.0)]);

        let minimizer = |residual: &ResidualFunction, p0: &ParameterVector| {
            assert_eq!(residual.parameter_names(), p0.names());
            // k3 = 1, k1 = 1 reproduces the data exactly
            assert!(residual.call(&[1.0, 1.0]) < 1e-16);
            assert!(residual.call(&[1.0, 2.0]) > 1e-3);
            Ok::<_, MinimizeError>(p0.clone())
        };

        // ACT
        let result = Fit::new(&model, p0.clone())
            .minimizer(minimizer)
            .steady_state(&data)
            .expect("Failed to fit");

        // ASSERT
        assert_eq!(result.parameters().names(), p0.names());
    }

    #[test]
    fn test_invalid_initial_guess() {
        let model = chain();
        let data = steady_state_data(&model);

        let result = steady_state(&model, [("k1", 1.0), ("x", 1.0)], &data);
        assert!(matches!(result, Err(FitError::InvalidParameterKey(name)) if name == "x"));

        let result = steady_state(&model, ParameterVector::new(), &data);
        assert!(matches!(result, Err(FitError::EmptyInitialGuess)));
    }

    #[test]
    fn test_time_points_before_start_are_rejected() {
        // ARRANGE
        let model = chain();
        let calls = Arc::new(AtomicUsize::new(0));
        let data = TimeCourseData::new(vec![-1.0, 1.0], vec!["x"], vec![vec![0.1], vec![0.4]])
            .expect("Failed to build time course");

        // ACT
        let result = Fit::new(&model, p0())
            .minimizer(counting_minimizer(calls.clone()))
            .time_course(&data);

        // ASSERT
        assert!(matches!(
            result,
            Err(FitError::SimulationError(
                SimulationError::InvalidTimePoints { .. }
            ))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Sum of squared errors with a constant weight, counting its evaluations
    #[derive(Clone)]
    struct WeightedSSE {
        weight: f64,
        calls: Arc<AtomicUsize>,
    }

    impl fmt::Display for WeightedSSE {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "WeightedSSE({})", self.weight)
        }
    }

    impl ObjectiveFunction for WeightedSSE {
        fn cost(&self, residuals: &Array2<f64>, _: usize) -> Result<f64, ObjectiveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.weight * residuals.mapv(|r| r * r).sum())
        }
    }

    #[test]
    fn test_swapped_components() {
        // ARRANGE
        let model = chain();
        let data = time_course_data(&model);
        let calls = Arc::new(AtomicUsize::new(0));
        let objective = WeightedSSE {
            weight: 10.0,
            calls: calls.clone(),
        };

        // ACT
        let result = Fit::new(&model, p0())
            .integrator(RK5)
            .objective(objective)
            .setup(SimulationSetup {
                dt: 0.05,
                ..Default::default()
            })
            .time_course(&data)
            .expect("Failed to fit");

        // ASSERT
        assert!(calls.load(Ordering::SeqCst) > 0);
        assert_recovers_truth(&result);
    }

    #[test]
    fn test_lbfgs_time_course() {
        // ARRANGE
        let model = chain();
        let data = time_course_data(&model);

        // ACT
        let result = Fit::new(&model, p0())
            .minimizer(Lbfgs::default())
            .time_course(&data)
            .expect("Failed to fit");

        // ASSERT
        assert_recovers_truth(&result);
    }

    #[test]
    fn test_multistart_steady_state() {
        // ARRANGE
        let model = chain();
        let data = steady_state_data(&model);

        // ACT
        let result = Fit::new(&model, p0())
            .minimizer(MultiStart::new(NelderMead::default()).starts(4).sigma(0.3))
            .steady_state(&data)
            .expect("Failed to fit");

        // ASSERT
        assert_recovers_truth(&result);
    }
}
