//! Forecasting models for time series data

use std::fmt::{self, Debug};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};

pub mod arima;
pub mod prophet;
pub mod simple;

/// Fewest training points the statistical families accept.
pub const MIN_FIT_POINTS: usize = 10;

/// One forecast step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub predicted_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Forecast result containing predicted values and prediction intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    model_name: String,
    points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// Create a new forecast result
    ///
    /// All slices must have the same length. Bounds are reordered if a model
    /// produced them inverted.
    pub fn new(
        model_name: impl Into<String>,
        timestamps: &[DateTime<Utc>],
        values: &[f64],
        intervals: &[(f64, f64)],
    ) -> Result<Self> {
        if values.len() != timestamps.len() || values.len() != intervals.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Forecast has {} timestamps, {} values and {} intervals",
                timestamps.len(),
                values.len(),
                intervals.len()
            )));
        }
        if values
            .iter()
            .chain(intervals.iter().flat_map(|(lo, hi)| [lo, hi]))
            .any(|v| !v.is_finite())
        {
            return Err(ForecastError::fit(
                model_name,
                "forecast produced non-finite values",
            ));
        }

        let points = timestamps
            .iter()
            .zip(values)
            .zip(intervals)
            .map(|((&timestamp, &predicted_value), &(a, b))| ForecastPoint {
                timestamp,
                predicted_value,
                lower_bound: a.min(b),
                upper_bound: a.max(b),
            })
            .collect();

        Ok(Self {
            model_name: model_name.into(),
            points,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get the forecasted values
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted_value).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }
}

/// A forecaster that is fitted once and then queried.
///
/// `predict` before a successful `fit` returns [`ForecastError::ModelNotFitted`].
/// Implementations are single-owner and hold no shared state.
pub trait ForecastModel: Debug + Send {
    /// Name of the model
    fn name(&self) -> &str;

    /// Estimate parameters from the training series, replacing any earlier fit
    fn fit(&mut self, training: &TimeSeries) -> Result<()>;

    /// Forecast `periods` steps past the end of the training series
    fn predict(&self, periods: usize) -> Result<ForecastResult>;

    fn is_fitted(&self) -> bool;
}

/// The statistical model families the selector chooses between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Prophet,
    Arima,
}

impl ModelFamily {
    /// Families in the order the selector tries them.
    pub const ALL: [ModelFamily; 2] = [ModelFamily::Prophet, ModelFamily::Arima];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::Prophet => "prophet",
            ModelFamily::Arima => "arima",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fail with `InsufficientData` when `series` has fewer than `required` points.
pub(crate) fn ensure_min_points(series: &TimeSeries, required: usize) -> Result<()> {
    if series.len() < required {
        return Err(ForecastError::InsufficientData {
            required,
            actual: series.len(),
        });
    }
    Ok(())
}

/// Two-sided standard normal quantile for an interval of the given coverage.
pub(crate) fn z_score(interval_width: f64) -> f64 {
    let width = interval_width.clamp(0.5, 0.999);
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(0.5 + width / 2.0),
        Err(_) => 1.96,
    }
}
