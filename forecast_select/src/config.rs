//! Selector configuration and metric categories.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ForecastError, Result};

/// Category of the metric being forecast. Drives model presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Values in `[0, 1]` such as success rates
    Probability,
    /// Non-negative utilisation or throughput figures
    Load,
    #[default]
    General,
}

impl MetricType {
    pub const ALL: [MetricType; 3] = [MetricType::Probability, MetricType::Load, MetricType::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Probability => "probability",
            MetricType::Load => "load",
            MetricType::General => "general",
        }
    }

    /// Parse a category name, treating anything unrecognised as `General`.
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(metric_type = name, "Unknown metric type, using general preset");
            MetricType::General
        })
    }
}

impl FromStr for MetricType {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "probability" => Ok(MetricType::Probability),
            "load" => Ok(MetricType::Load),
            "general" => Ok(MetricType::General),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown metric type: {other}"
            ))),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunable thresholds of the selection pipeline.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Below this many points only the simple forecaster is used
    pub min_points: usize,
    /// From this many points both families are compared on a holdout
    pub full_evaluation_points: usize,
    /// Share of the series held out for testing
    pub test_fraction: f64,
    /// Absolute autocorrelation above which a lag counts as seasonal
    pub seasonality_threshold: f64,
    pub seasonality_lags: Vec<usize>,
    pub excellent_mae_threshold: f64,
    pub good_mae_threshold: f64,
    /// Wall-clock budget for the ARIMA order search; `None` is unbounded
    pub max_search_millis: Option<u64>,
    /// Smoothing factor of the simple fallback forecaster
    pub simple_forecast_alpha: f64,
    /// Prediction interval coverage for all models
    pub interval_width: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_points: 10,
            full_evaluation_points: 20,
            test_fraction: 0.2,
            seasonality_threshold: 0.3,
            seasonality_lags: vec![7, 30],
            excellent_mae_threshold: 0.05,
            good_mae_threshold: 0.1,
            max_search_millis: Some(30_000),
            simple_forecast_alpha: 0.3,
            interval_width: 0.95,
        }
    }
}

impl SelectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn search_budget(&self) -> Option<Duration> {
        self.max_search_millis.map(Duration::from_millis)
    }

    /// Check that the thresholds are mutually consistent.
    pub fn validate(&self) -> Result<()> {
        if self.min_points < 2 {
            return Err(ForecastError::InvalidParameter(
                "min_points must be at least 2".to_string(),
            ));
        }
        if self.full_evaluation_points < self.min_points {
            return Err(ForecastError::InvalidParameter(format!(
                "full_evaluation_points ({}) must not be below min_points ({})",
                self.full_evaluation_points, self.min_points
            )));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(ForecastError::InvalidParameter(format!(
                "test_fraction must be in [0, 1), got {}",
                self.test_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.seasonality_threshold) {
            return Err(ForecastError::InvalidParameter(format!(
                "seasonality_threshold must be in [0, 1], got {}",
                self.seasonality_threshold
            )));
        }
        if self.seasonality_lags.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "seasonality_lags must be positive".to_string(),
            ));
        }
        if !(self.excellent_mae_threshold >= 0.0
            && self.excellent_mae_threshold <= self.good_mae_threshold)
        {
            return Err(ForecastError::InvalidParameter(
                "MAE thresholds must satisfy 0 <= excellent <= good".to_string(),
            ));
        }
        if !(self.simple_forecast_alpha > 0.0 && self.simple_forecast_alpha < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "simple_forecast_alpha must be in (0, 1)".to_string(),
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "interval_width must be in (0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}
