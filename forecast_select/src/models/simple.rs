//! Exponential smoothing fallback used when the statistical families cannot
//! be fitted

use chrono::{DateTime, Duration, Utc};
use forecast_math::smoothing::ExponentialSmoothing;
use tracing::debug;

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ensure_min_points, z_score, ForecastModel, ForecastResult};
use crate::utils::{future_timestamps, infer_step};

/// Name reported by the fallback forecaster.
pub const SIMPLE_FORECAST: &str = "simple_forecast";

#[derive(Debug, Clone)]
struct FittedState {
    smoother: ExponentialSmoothing,
    last_timestamp: DateTime<Utc>,
    step: Duration,
}

/// Flat forecast at the smoothed level, with intervals widening by the
/// simple exponential smoothing variance `σ²(1 + (h - 1)α²)`.
#[derive(Debug, Clone)]
pub struct SimpleForecaster {
    alpha: f64,
    interval_width: f64,
    state: Option<FittedState>,
}

impl SimpleForecaster {
    pub fn new(alpha: f64, interval_width: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(ForecastError::InvalidParameter(
                "Alpha must be between 0 and 1".to_string(),
            ));
        }
        Ok(Self {
            alpha,
            interval_width,
            state: None,
        })
    }
}

impl ForecastModel for SimpleForecaster {
    fn name(&self) -> &str {
        SIMPLE_FORECAST
    }

    fn fit(&mut self, training: &TimeSeries) -> Result<()> {
        ensure_min_points(training, 1)?;
        let smoother = ExponentialSmoothing::fit(self.alpha, &training.values())?;
        let last_timestamp = training
            .last()
            .map(|p| p.timestamp)
            .ok_or(ForecastError::InsufficientData { required: 1, actual: 0 })?;

        debug!(points = training.len(), alpha = self.alpha, "Fitted simple forecaster");
        self.state = Some(FittedState {
            smoother,
            last_timestamp,
            step: infer_step(&training.timestamps()),
        });
        Ok(())
    }

    fn predict(&self, periods: usize) -> Result<ForecastResult> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ForecastError::ModelNotFitted(SIMPLE_FORECAST.to_string()))?;

        let level = state.smoother.level()?;
        let sigma = state.smoother.residual_std();
        let z = z_score(self.interval_width);
        let alpha2 = self.alpha * self.alpha;

        let timestamps =
            future_timestamps(SIMPLE_FORECAST, state.last_timestamp, state.step, periods)?;
        let values = vec![level; periods];
        let intervals: Vec<(f64, f64)> = (1..=periods)
            .map(|h| {
                let margin = z * sigma * (1.0 + (h - 1) as f64 * alpha2).sqrt();
                (level - margin, level + margin)
            })
            .collect();

        ForecastResult::new(SIMPLE_FORECAST, &timestamps, &values, &intervals)
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::daily(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), values).unwrap()
    }

    #[test]
    fn test_predict_before_fit() {
        let model = SimpleForecaster::new(0.3, 0.95).unwrap();
        assert!(matches!(model.predict(3), Err(ForecastError::ModelNotFitted(_))));
    }

    #[test]
    fn test_flat_forecast_at_smoothed_level() {
        let mut model = SimpleForecaster::new(0.3, 0.95).unwrap();
        model.fit(&series(&[10.0, 12.0, 11.0])).unwrap();
        let forecast = model.predict(4).unwrap();

        // 10 -> 0.3*12 + 0.7*10 = 10.6 -> 0.3*11 + 0.7*10.6 = 10.72
        assert_eq!(forecast.horizons(), 4);
        for value in forecast.values() {
            assert_relative_eq!(value, 10.72, epsilon = 1e-10);
        }
        let widths: Vec<f64> = forecast
            .points()
            .iter()
            .map(|p| p.upper_bound - p.lower_bound)
            .collect();
        assert!(widths.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(
            forecast.points()[0].timestamp,
            series(&[0.0; 4]).points()[3].timestamp
        );
    }

    #[test]
    fn test_single_point_has_zero_width() {
        let mut model = SimpleForecaster::new(0.3, 0.95).unwrap();
        model.fit(&series(&[5.0])).unwrap();
        let p = model.predict(1).unwrap().points()[0];
        assert_eq!(p.predicted_value, 5.0);
        assert_eq!(p.lower_bound, p.upper_bound);
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        let mut model = SimpleForecaster::new(0.3, 0.95).unwrap();
        assert!(matches!(
            model.fit(&TimeSeries::default()),
            Err(ForecastError::InsufficientData { required: 1, actual: 0 })
        ));
    }

    #[test]
    fn test_invalid_alpha() {
        assert!(SimpleForecaster::new(1.0, 0.95).is_err());
    }
}
