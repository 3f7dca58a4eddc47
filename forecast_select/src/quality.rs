//! Data quality profiling ahead of model selection.

use forecast_math::{descriptive, serde_float};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SelectorConfig;
use crate::data::TimeSeries;

/// Point count at which the size component of the score saturates.
const SATURATION_POINTS: f64 = 30.0;

/// Direction of the least-squares slope through the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

/// Profile of a series used to pick a selection path and report confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityAssessment {
    pub point_count: usize,
    /// Whole days between the first and last timestamp
    pub date_range_days: i64,
    pub missing_value_count: usize,
    pub zero_value_count: usize,
    pub negative_value_count: usize,
    #[serde(with = "serde_float")]
    pub mean: f64,
    /// Sample variance; overflows to infinity for values near `f64::MAX`
    #[serde(with = "serde_float")]
    pub variance: f64,
    #[serde(with = "serde_float")]
    pub std_dev: f64,
    #[serde(with = "serde_float")]
    pub min: f64,
    #[serde(with = "serde_float")]
    pub max: f64,
    pub trend_direction: TrendDirection,
    pub seasonality_detected: bool,
    /// Weighted score in `[0, 1]`
    #[serde(with = "serde_float")]
    pub quality_score: f64,
}

/// Profile `series`. Missing values are those dropped during coercion.
pub fn assess_data_quality(series: &TimeSeries, config: &SelectorConfig) -> DataQualityAssessment {
    let values = series.values();
    let n = values.len();
    let missing = series.missing_count();

    let date_range_days = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_days(),
        _ => 0,
    };

    let zero_value_count = values.iter().filter(|v| **v == 0.0).count();
    let negative_value_count = values.iter().filter(|v| **v < 0.0).count();
    let variance = descriptive::variance(&values);
    let (min, max) = descriptive::min_max(&values).unwrap_or((0.0, 0.0));

    let trend_direction = match descriptive::linear_trend(&values) {
        Some(trend) if trend.slope < 0.0 => TrendDirection::Decreasing,
        _ => TrendDirection::Increasing,
    };

    let seasonality_detected = config.seasonality_lags.iter().any(|&lag| {
        descriptive::autocorrelation(&values, lag)
            .is_some_and(|acf| acf.abs() > config.seasonality_threshold)
    });

    let quality_score = quality_score(n, missing, zero_value_count, variance);

    debug!(
        points = n,
        missing,
        quality_score,
        seasonality_detected,
        "Assessed data quality"
    );

    DataQualityAssessment {
        point_count: n,
        date_range_days,
        missing_value_count: missing,
        zero_value_count,
        negative_value_count,
        mean: descriptive::mean(&values),
        variance,
        std_dev: variance.sqrt(),
        min,
        max,
        trend_direction,
        seasonality_detected,
        quality_score,
    }
}

/// `0.4·size + 0.3·completeness + 0.2·non-zero share + 0.1·[variance > 0]`
fn quality_score(n: usize, missing: usize, zeros: usize, variance: f64) -> f64 {
    let size = (n as f64 / SATURATION_POINTS).min(1.0);

    let total = n + missing;
    let completeness = if total == 0 {
        0.0
    } else {
        1.0 - missing as f64 / total as f64
    };
    let non_zero = if n == 0 {
        0.0
    } else {
        1.0 - zeros as f64 / n as f64
    };
    let variability = if variance > 0.0 { 1.0 } else { 0.0 };

    (0.4 * size + 0.3 * completeness + 0.2 * non_zero + 0.1 * variability).clamp(0.0, 1.0)
}
