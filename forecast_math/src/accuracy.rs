//! Forecast accuracy metrics.
//!
//! [`calculate_accuracy_metrics`] never fails. Every degenerate case maps to a
//! sentinel (`f64::INFINITY` for error measures, `0.0` for bias and R²), so
//! lower-is-better ranking works without NaN handling.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::serde_float;

/// Accuracy of a forecast against the observed values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error
    #[serde(with = "serde_float")]
    pub mae: f64,
    /// Mean Squared Error
    #[serde(with = "serde_float")]
    pub mse: f64,
    /// Root Mean Squared Error
    #[serde(with = "serde_float")]
    pub rmse: f64,
    /// Mean Absolute Percentage Error (percent), over non-zero actuals only
    #[serde(with = "serde_float")]
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error (percent)
    #[serde(with = "serde_float")]
    pub smape: f64,
    /// Mean of `predicted - actual`; positive means over-forecasting
    #[serde(with = "serde_float")]
    pub mean_error: f64,
    /// Mean Absolute Scaled Error against the lag-1 naive forecast
    #[serde(with = "serde_float")]
    pub mase: f64,
    /// Coefficient of determination
    #[serde(with = "serde_float")]
    pub r_squared: f64,
}

impl AccuracyMetrics {
    /// Metrics for an empty comparison: every error is infinite, bias and R² are zero.
    pub fn undefined() -> Self {
        Self {
            mae: f64::INFINITY,
            mse: f64::INFINITY,
            rmse: f64::INFINITY,
            mape: f64::INFINITY,
            smape: f64::INFINITY,
            mean_error: 0.0,
            mase: f64::INFINITY,
            r_squared: 0.0,
        }
    }

    /// Look up a metric by its short name (`mae`, `mse`, `rmse`, `mape`,
    /// `smape`, `mean_error`, `mase`, `r2` / `r_squared`).
    pub fn get(&self, metric: &str) -> Option<f64> {
        match metric {
            "mae" => Some(self.mae),
            "mse" => Some(self.mse),
            "rmse" => Some(self.rmse),
            "mape" => Some(self.mape),
            "smape" => Some(self.smape),
            "mean_error" | "bias" => Some(self.mean_error),
            "mase" => Some(self.mase),
            "r2" | "r_squared" => Some(self.r_squared),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccuracyMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Accuracy Metrics:")?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  MSE:   {:.4}", self.mse)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:  {:.4}%", self.mape)?;
        writeln!(f, "  SMAPE: {:.4}%", self.smape)?;
        writeln!(f, "  Bias:  {:.4}", self.mean_error)?;
        writeln!(f, "  MASE:  {:.4}", self.mase)?;
        writeln!(f, "  R²:    {:.4}", self.r_squared)?;
        Ok(())
    }
}

/// Compare `predicted` against `actual`.
///
/// Sequences of different length are aligned on the tail: both are cut to the
/// shorter length, keeping their most recent elements.
pub fn calculate_accuracy_metrics(actual: &[f64], predicted: &[f64]) -> AccuracyMetrics {
    let n = actual.len().min(predicted.len());
    let dropped = actual.len().max(predicted.len()) - n;
    if dropped > 1 {
        warn!(
            actual_len = actual.len(),
            predicted_len = predicted.len(),
            dropped,
            "Accuracy inputs differ in length, aligning on the tail"
        );
    }
    if n == 0 {
        return AccuracyMetrics::undefined();
    }

    let actual = &actual[actual.len() - n..];
    let predicted = &predicted[predicted.len() - n..];
    let count = n as f64;

    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut signed_sum = 0.0;
    let mut smape_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut pct_count = 0usize;

    for (&a, &p) in actual.iter().zip(predicted) {
        let err = p - a;
        abs_sum += err.abs();
        sq_sum += err * err;
        signed_sum += err;

        let denom = a.abs() + p.abs();
        if denom > 0.0 {
            smape_sum += 2.0 * err.abs() / denom;
        }
        if a != 0.0 {
            pct_sum += (err / a).abs();
            pct_count += 1;
        }
    }

    let mae = abs_sum / count;
    let mse = sq_sum / count;

    let mape = if pct_count == 0 {
        f64::INFINITY
    } else {
        pct_sum / pct_count as f64 * 100.0
    };

    AccuracyMetrics {
        mae,
        mse,
        rmse: mse.sqrt(),
        mape,
        smape: smape_sum / count * 100.0,
        mean_error: signed_sum / count,
        mase: mean_absolute_scaled_error(actual, mae),
        r_squared: r_squared(actual, sq_sum),
    }
}

fn mean_absolute_scaled_error(actual: &[f64], mae: f64) -> f64 {
    if actual.len() < 2 {
        return f64::INFINITY;
    }
    let naive = actual.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>()
        / (actual.len() - 1) as f64;
    if naive == 0.0 {
        f64::INFINITY
    } else {
        mae / naive
    }
}

fn r_squared(actual: &[f64], ss_res: f64) -> f64 {
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}
