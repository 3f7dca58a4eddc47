//! # Forecast Select
//!
//! Automatic forecast model selection for business metrics.
//!
//! ## Features
//!
//! - Time series input handling with lenient coercion of dates and numbers
//! - Data quality profiling (size, completeness, trend, seasonality)
//! - A Prophet-style trend/seasonality model and an auto-ordered ARIMA model,
//!   each with presets per metric category
//! - Holdout evaluation with a full set of accuracy metrics
//! - A tiered selector that always returns a result, degrading confidence
//!   instead of failing
//!
//! ## Metric categories
//!
//! ```rust
//! pub enum MetricType {
//!     Probability, // bounded to [0, 1]
//!     Load,        // unbounded, multiple seasonal cycles
//!     General,
//! }
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use forecast_select::{RawObservation, SmartModelSelector};
//!
//! let raw: Vec<RawObservation> = (1..=28)
//!     .map(|day| RawObservation::new(format!("2024-02-{day:02}"), 100.0 + day as f64))
//!     .collect();
//!
//! let selector = SmartModelSelector::default();
//! let result = selector.select_from_raw(&raw, "load", 7, false)?;
//!
//! println!("{} ({})", result.selected_model_name, result.confidence);
//! println!("{}", result.selection_reason);
//! # Ok::<(), forecast_select::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod quality;
pub mod selector;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{MetricType, SelectorConfig};
pub use crate::data::{DateInput, RawObservation, TimeSeries, TimeSeriesPoint, ValueInput};
pub use crate::error::{ForecastError, Result};
pub use crate::evaluator::{ComparisonResult, EvaluationRecord, ModelPerformanceEvaluator};
pub use crate::models::{ForecastModel, ForecastPoint, ForecastResult, ModelFamily};
pub use crate::quality::{assess_data_quality, DataQualityAssessment, TrendDirection};
pub use crate::selector::{
    Confidence, ModelProvider, SelectionPath, SelectionRequest, SelectionResult,
    SmartModelSelector, StatisticalModels,
};
pub use crate::utils::train_test_split;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
