//! # Forecast Math
//!
//! Numerical building blocks for forecast model evaluation and selection.
//! This crate provides the pure computations the selection pipeline relies on:
//! accuracy metrics, descriptive statistics, least squares, stationarity tests
//! and simple exponential smoothing.

use thiserror::Error;

pub mod accuracy;
pub mod descriptive;
pub mod regression;
pub mod serde_float;
pub mod smoothing;
pub mod stationarity;

pub use accuracy::{calculate_accuracy_metrics, AccuracyMetrics};
pub use stationarity::{assess_stationarity, StationarityAssessment, StationarityTest};

/// Errors that can occur in forecast-related calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Singular system: {0}")]
    Singular(String),
}

/// Result type for forecast math operations
pub type Result<T> = std::result::Result<T, MathError>;
