//! Unit-root and stationarity tests.
//!
//! The Augmented Dickey-Fuller test has "unit root" as its null hypothesis,
//! KPSS has "stationary". Each one errs in a different direction on short
//! series, so [`assess_stationarity`] only calls a series stationary when both
//! tests agree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptive::{mean, variance};
use crate::regression::ordinary_least_squares;
use crate::{MathError, Result};

/// KPSS 5% critical value for level stationarity.
const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// Outcome of a single stationarity test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationarityTest {
    /// Test statistic
    pub statistic: f64,
    /// 5% critical value the statistic was compared against
    pub critical_value: f64,
    /// Number of lags used
    pub lags: usize,
    /// Whether this test considers the series stationary
    pub is_stationary: bool,
}

/// Joint ADF + KPSS verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationarityAssessment {
    pub adf: StationarityTest,
    pub kpss: StationarityTest,
    /// True only when both tests agree on stationarity
    pub is_stationary: bool,
}

fn is_constant(values: &[f64]) -> bool {
    variance(values) < 1e-12
}

/// MacKinnon (2010) 5% critical value for the constant-only ADF regression.
fn adf_critical_value(nobs: usize) -> f64 {
    let t = nobs as f64;
    -2.86154 - 2.8903 / t - 4.234 / (t * t)
}

/// Augmented Dickey-Fuller test with a constant term.
///
/// Regresses `Δy_t` on a constant, `y_{t-1}` and `lags` lagged differences.
/// Without an explicit lag count the Schwert rule `12·(n/100)^¼` is used,
/// shrunk until the regression keeps enough degrees of freedom.
pub fn augmented_dickey_fuller(values: &[f64], lags: Option<usize>) -> Result<StationarityTest> {
    let n = values.len();
    if n < 8 {
        return Err(MathError::InsufficientData(format!(
            "ADF test needs at least 8 observations, got {n}"
        )));
    }

    if is_constant(values) {
        return Ok(StationarityTest {
            statistic: f64::NEG_INFINITY,
            critical_value: adf_critical_value(n - 1),
            lags: 0,
            is_stationary: true,
        });
    }

    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let mut k = lags.unwrap_or_else(|| (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize);
    // nobs = n - 1 - k rows against k + 2 columns; keep at least 4 residual dof
    while k > 0 && (n - 1).saturating_sub(k) < k + 6 {
        k -= 1;
    }

    let mut rows = Vec::with_capacity(diffs.len() - k);
    let mut response = Vec::with_capacity(diffs.len() - k);
    for t in k..diffs.len() {
        let mut row = Vec::with_capacity(k + 2);
        row.push(1.0);
        row.push(values[t]);
        for i in 1..=k {
            row.push(diffs[t - i]);
        }
        rows.push(row);
        response.push(diffs[t]);
    }
    let nobs = rows.len();

    let fit = ordinary_least_squares(&rows, &response)?;
    let gamma = fit.coefficients[1];
    let se = fit.standard_errors[1];

    let statistic = if se > 1e-12 {
        gamma / se
    } else if gamma < -1e-12 {
        f64::NEG_INFINITY
    } else {
        0.0
    };
    let critical_value = adf_critical_value(nobs);

    debug!(statistic, critical_value, lags = k, "ADF test");

    Ok(StationarityTest {
        statistic,
        critical_value,
        lags: k,
        is_stationary: statistic < critical_value,
    })
}

/// KPSS test for level stationarity with a Bartlett-weighted long-run variance.
///
/// Without an explicit lag count `ceil(12·(n/100)^¼)` is used.
pub fn kpss(values: &[f64], lags: Option<usize>) -> Result<StationarityTest> {
    let n = values.len();
    if n < 8 {
        return Err(MathError::InsufficientData(format!(
            "KPSS test needs at least 8 observations, got {n}"
        )));
    }

    let lags = lags
        .unwrap_or_else(|| (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize)
        .min(n - 1);

    let m = mean(values);
    let residuals: Vec<f64> = values.iter().map(|v| v - m).collect();

    let mut long_run = residuals.iter().map(|e| e * e).sum::<f64>();
    for s in 1..=lags {
        let weight = 1.0 - s as f64 / (lags as f64 + 1.0);
        let autocov: f64 = residuals[s..]
            .iter()
            .zip(&residuals[..n - s])
            .map(|(a, b)| a * b)
            .sum();
        long_run += 2.0 * weight * autocov;
    }
    long_run /= n as f64;

    let statistic = if long_run <= 1e-12 {
        0.0
    } else {
        let mut partial = 0.0;
        let mut sum_sq = 0.0;
        for e in &residuals {
            partial += e;
            sum_sq += partial * partial;
        }
        sum_sq / (n as f64 * n as f64 * long_run)
    };

    debug!(statistic, lags, "KPSS test");

    Ok(StationarityTest {
        statistic,
        critical_value: KPSS_CRITICAL_5PCT,
        lags,
        is_stationary: statistic < KPSS_CRITICAL_5PCT,
    })
}

/// Run ADF and KPSS and require both to agree.
pub fn assess_stationarity(values: &[f64]) -> Result<StationarityAssessment> {
    let adf = augmented_dickey_fuller(values, None)?;
    let kpss = kpss(values, None)?;
    Ok(StationarityAssessment {
        adf,
        kpss,
        is_stationary: adf.is_stationary && kpss.is_stationary,
    })
}
