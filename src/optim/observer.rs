use std::sync::Arc;

use argmin::core::{observers::Observe, Error, State, KV};

/// Progress callback receiving the current and the best cost of an iteration.
pub type CostCallback = Arc<dyn Fn(f64, f64) + Send + Sync>;

/// A custom observer that allows passing a callback function to monitor optimization progress.
///
/// The `CallbackObserver` implements the `Observe` trait from the argmin library and provides
/// a way to execute custom logic during the optimization process. The callback function is called
/// after each iteration with the current cost and best cost values.
#[derive(Clone)]
pub struct CallbackObserver {
    /// Takes the current cost and the best cost found so far
    callback: CostCallback,
}

impl CallbackObserver {
    pub fn new(callback: CostCallback) -> Self {
        Self { callback }
    }
}

impl<I> Observe<I> for CallbackObserver
where
    I: State<Float = f64>,
{
    /// Called after each optimization iteration.
    /// Extracts the current cost and best cost values and passes them to the callback function.
    fn observe_iter(&mut self, state: &I, _kv: &KV) -> Result<(), Error> {
        (self.callback)(state.get_cost(), state.get_best_cost());
        Ok(())
    }
}
