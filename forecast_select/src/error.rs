//! Error types for the forecast_select crate

use forecast_math::MathError;
use thiserror::Error;

/// Custom error types for the forecast_select crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed input: non-numeric values, unparseable timestamps
    #[error("Data validation error: {0}")]
    DataValidation(String),

    /// Fewer observations than a model needs
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// `predict` called before a successful `fit`
    #[error("Model not fitted: {0}")]
    ModelNotFitted(String),

    /// Differencing cap reached without a stationary series
    #[error("Stationarity error: {0}")]
    Stationarity(String),

    /// Failure inside the statistical fitting routines
    #[error("{model} fit failed: {message}")]
    LibraryFit { model: String, message: String },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from JSON (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from CSV parsing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ForecastError {
    /// Shorthand for a [`ForecastError::LibraryFit`].
    pub fn fit(model: impl Into<String>, message: impl Into<String>) -> Self {
        ForecastError::LibraryFit {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Whether the selector may absorb this error into a degraded result.
    ///
    /// Modelling failures are recoverable; malformed caller input, I/O and
    /// configuration problems are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ForecastError::InsufficientData { .. }
                | ForecastError::Stationarity(_)
                | ForecastError::LibraryFit { .. }
        )
    }
}

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InvalidInput(msg) => ForecastError::DataValidation(msg),
            other => ForecastError::fit("numerics", other.to_string()),
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let forecast_error = ForecastError::from(io_error);
        assert!(matches!(forecast_error, ForecastError::Io(_)));

        let math_error = MathError::Singular("rank deficient".to_string());
        let forecast_error = ForecastError::from(math_error);
        assert!(matches!(forecast_error, ForecastError::LibraryFit { .. }));

        let math_error = MathError::InvalidInput("bad".to_string());
        assert!(matches!(
            ForecastError::from(math_error),
            ForecastError::DataValidation(_)
        ));
    }

    #[test]
    fn test_error_display() {
        let error = ForecastError::InsufficientData {
            required: 10,
            actual: 4,
        };
        let error_string = format!("{}", error);
        assert!(error_string.contains("at least 10"));
        assert!(error_string.contains("got 4"));

        let error = ForecastError::fit("arima", "did not converge");
        assert_eq!(format!("{}", error), "arima fit failed: did not converge");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ForecastError::fit("prophet", "x").is_recoverable());
        assert!(ForecastError::InsufficientData {
            required: 10,
            actual: 1
        }
        .is_recoverable());
        assert!(!ForecastError::DataValidation("x".to_string()).is_recoverable());
        assert!(!ForecastError::ModelNotFitted("x".to_string()).is_recoverable());
    }
}
