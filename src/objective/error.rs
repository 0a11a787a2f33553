use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ObjectiveError {
    /// Mean-based losses need at least one observed point
    #[error("Cannot compute a mean over zero data points")]
    NoDataPoints,
    #[error("Loss function returned a non-finite value")]
    NonFinite,
}
