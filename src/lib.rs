//! # smart_forecast
//!
//! Picks a forecasting model for a univariate time series and explains why.
//!
//! This crate bundles the workspace members:
//!
//! - [`select`]: data assessment, the Prophet-style and ARIMA wrappers,
//!   holdout evaluation and the [`SmartModelSelector`].
//! - [`math`]: accuracy metrics, stationarity tests and the linear algebra
//!   the models are built on.
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use smart_forecast::{SelectionRequest, SmartModelSelector, TimeSeries};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let values: Vec<f64> = (0..30).map(|i| 100.0 + 2.0 * i as f64).collect();
//! let series = TimeSeries::daily(start, &values).unwrap();
//!
//! let selector = SmartModelSelector::default();
//! let result = selector.select_best_model(&series, &SelectionRequest::default());
//! assert!(!result.selection_reason.is_empty());
//! ```

pub use forecast_math as math;
pub use forecast_select as select;

pub use forecast_math::{calculate_accuracy_metrics, AccuracyMetrics};
pub use forecast_select::{
    assess_data_quality, train_test_split, ComparisonResult, Confidence, DataQualityAssessment,
    EvaluationRecord, ForecastError, ForecastModel, ForecastResult, MetricType,
    ModelPerformanceEvaluator, RawObservation, SelectionPath, SelectionRequest, SelectionResult,
    SelectorConfig, SmartModelSelector, TimeSeries,
};
