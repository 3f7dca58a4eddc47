//! Utility functions for splitting series and projecting timestamps

use chrono::{DateTime, Duration, Utc};
use forecast_math::{descriptive, serde_float};
use serde::{Deserialize, Serialize};

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};

/// Test fraction used when a caller supplies a non-finite one.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Split a series chronologically into training and test sets.
///
/// The split index is `floor(len * (1 - test_fraction))`; fractions outside
/// `[0, 1]` are clamped. Either side may be empty for very short series.
pub fn train_test_split(series: &TimeSeries, test_fraction: f64) -> (TimeSeries, TimeSeries) {
    let fraction = if test_fraction.is_finite() {
        test_fraction.clamp(0.0, 1.0)
    } else {
        DEFAULT_TEST_FRACTION
    };

    let points = series.points();
    let split = ((points.len() as f64) * (1.0 - fraction)).floor() as usize;
    let split = split.min(points.len());

    (
        TimeSeries::from_sorted(&points[..split]),
        TimeSeries::from_sorted(&points[split..]),
    )
}

/// Typical spacing between observations: the median gap, or one day when
/// the series has fewer than two points.
pub fn infer_step(timestamps: &[DateTime<Utc>]) -> Duration {
    let gaps: Vec<f64> = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64)
        .filter(|gap| *gap > 0.0)
        .collect();

    match descriptive::median(&gaps) {
        Some(seconds) if seconds >= 1.0 => Duration::seconds(seconds.round() as i64),
        _ => Duration::days(1),
    }
}

/// Create `horizon` timestamps after `last_timestamp`, spaced by `step`.
///
/// Fails with a [`ForecastError::LibraryFit`] attributed to `model` when the
/// horizon runs past the last representable date.
pub fn future_timestamps(
    model: &str,
    last_timestamp: DateTime<Utc>,
    step: Duration,
    horizon: usize,
) -> Result<Vec<DateTime<Utc>>> {
    let mut timestamps = Vec::with_capacity(horizon);
    let mut current = last_timestamp;
    for _ in 0..horizon {
        current = current
            .checked_add_signed(step)
            .ok_or_else(|| ForecastError::fit(model, "forecast horizon overflows the calendar"))?;
        timestamps.push(current);
    }
    Ok(timestamps)
}

/// Basic statistics of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub count: usize,
    #[serde(with = "serde_float")]
    pub mean: f64,
    #[serde(with = "serde_float")]
    pub std_dev: f64,
    #[serde(with = "serde_float")]
    pub min: f64,
    #[serde(with = "serde_float")]
    pub max: f64,
}

impl SeriesSummary {
    /// Summary of `values`; all statistics are zero for an empty slice.
    pub fn of(values: &[f64]) -> Self {
        let (min, max) = descriptive::min_max(values).unwrap_or((0.0, 0.0));
        Self {
            count: values.len(),
            mean: descriptive::mean(values),
            std_dev: descriptive::std_dev(values),
            min,
            max,
        }
    }
}
