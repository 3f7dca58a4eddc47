//! Simple exponential smoothing, the fallback forecaster's engine.

use crate::{MathError, Result};

/// Simple exponential smoothing over a stream of values.
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    alpha: f64,
    level: Option<f64>,
    values_seen: usize,
    sum_squared_error: f64,
}

impl ExponentialSmoothing {
    /// Create a new Exponential Smoothing with the specified alpha (smoothing factor)
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(MathError::InvalidInput(
                "Alpha must be between 0 and 1 (exclusive)".to_string(),
            ));
        }

        Ok(Self {
            alpha,
            level: None,
            values_seen: 0,
            sum_squared_error: 0.0,
        })
    }

    /// Smooth a whole series in one pass.
    pub fn fit(alpha: f64, values: &[f64]) -> Result<Self> {
        let mut smoother = Self::new(alpha)?;
        for &value in values {
            smoother.update(value);
        }
        Ok(smoother)
    }

    /// Update the smoother with a new value
    pub fn update(&mut self, value: f64) {
        self.values_seen += 1;

        self.level = Some(match self.level {
            None => value,
            Some(current_level) => {
                // the one-step-ahead forecast for this value was the previous level
                self.sum_squared_error += (value - current_level).powi(2);
                self.alpha * value + (1.0 - self.alpha) * current_level
            }
        });
    }

    /// Current smoothed level; the flat forecast for every horizon.
    pub fn level(&self) -> Result<f64> {
        self.level.ok_or_else(|| {
            MathError::InsufficientData("No data available for exponential smoothing".to_string())
        })
    }

    /// Standard deviation of the one-step-ahead errors, `0.0` before two values.
    pub fn residual_std(&self) -> f64 {
        if self.values_seen < 2 {
            return 0.0;
        }
        (self.sum_squared_error / (self.values_seen - 1) as f64).sqrt()
    }

    /// Number of values consumed so far
    pub fn values_seen(&self) -> usize {
        self.values_seen
    }

    /// Get the current alpha value
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}
