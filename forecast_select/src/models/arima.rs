//! ARIMA models for time series forecasting
//!
//! Fitting runs in three stages:
//! 1. choose the differencing order `d` by differencing until ADF and KPSS
//!    both call the series stationary (capped at `max_d`);
//! 2. estimate every ARMA(p, q) on the differenced series with the
//!    Hannan–Rissanen regressions and score it by conditional-sum-of-squares
//!    AIC, rejecting non-stationary or non-invertible candidates;
//! 3. keep the lowest AIC, or fall back to a fixed order when none fits.

use std::fmt;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use forecast_math::descriptive::{self, difference};
use forecast_math::regression::ordinary_least_squares;
use forecast_math::assess_stationarity;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MetricType;
use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::models::{ensure_min_points, z_score, ForecastModel, ForecastResult, MIN_FIT_POINTS};
use crate::utils::{future_timestamps, infer_step};

const MODEL_NAME: &str = "arima";

/// Largest root modulus accepted for the AR and MA polynomials.
const MAX_ROOT_MODULUS: f64 = 0.9999;

/// An ARIMA(p, d, q) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Order search ranges and output handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaConfig {
    pub max_p: usize,
    pub max_q: usize,
    pub max_d: usize,
    /// Upper bound on `p + d + q`
    pub max_order: usize,
    /// Order tried when no candidate of the search fits
    pub fallback_order: ArimaOrder,
    /// Range predictions and interval bounds are clamped into
    pub bounds: Option<(f64, f64)>,
    pub interval_width: f64,
    /// Wall-clock budget for the order search
    pub search_budget: Option<StdDuration>,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self::for_metric(MetricType::General)
    }
}

impl ArimaConfig {
    /// Preset for a metric category.
    pub fn for_metric(metric_type: MetricType) -> Self {
        let (max_p, max_q, max_order, bounds) = match metric_type {
            MetricType::Probability => (3, 3, 5, Some((0.0, 1.0))),
            MetricType::Load => (5, 5, 8, None),
            MetricType::General => (4, 4, 6, None),
        };
        Self {
            max_p,
            max_q,
            max_d: 2,
            max_order,
            fallback_order: ArimaOrder::new(1, 1, 1),
            bounds,
            interval_width: 0.95,
            search_budget: None,
        }
    }

    pub fn with_interval_width(mut self, interval_width: f64) -> Self {
        self.interval_width = interval_width;
        self
    }

    pub fn with_search_budget(mut self, budget: Option<StdDuration>) -> Self {
        self.search_budget = budget;
        self
    }

    fn candidates(&self, d: usize) -> impl Iterator<Item = ArimaOrder> + '_ {
        (0..=self.max_p).flat_map(move |p| {
            (0..=self.max_q)
                .filter(move |q| p + d + q <= self.max_order)
                .map(move |q| ArimaOrder::new(p, d, q))
        })
    }
}

/// An estimated ARMA model on a (differenced) series.
#[derive(Debug, Clone)]
struct ArmaFit {
    ar: Vec<f64>,
    ma: Vec<f64>,
    /// Mean of the differenced series; the drift when `d = 1`
    mean: f64,
    /// Demeaned differenced series
    centred: Vec<f64>,
    residuals: Vec<f64>,
    sigma2: f64,
    aic: f64,
}

#[derive(Debug, Clone)]
struct FittedArima {
    order: ArimaOrder,
    arma: ArmaFit,
    /// Last value of each differencing level below `d`
    tails: Vec<f64>,
    last_timestamp: DateTime<Utc>,
    step: Duration,
}

/// ARIMA model (AutoRegressive Integrated Moving Average) with automatic
/// order selection
#[derive(Debug, Clone)]
pub struct ArimaModel {
    config: ArimaConfig,
    fitted: Option<FittedArima>,
}

impl ArimaModel {
    pub fn new(config: ArimaConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn for_metric(metric_type: MetricType) -> Self {
        Self::new(ArimaConfig::for_metric(metric_type))
    }

    pub fn config(&self) -> &ArimaConfig {
        &self.config
    }

    /// Order chosen by the last fit.
    pub fn order(&self) -> Option<ArimaOrder> {
        self.fitted.as_ref().map(|f| f.order)
    }

    /// AIC of the last fit.
    pub fn aic(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.arma.aic)
    }

    /// Difference until ADF and KPSS agree on stationarity, returning the
    /// highest order tried when the cap is reached first.
    fn select_differencing(&self, values: &[f64]) -> usize {
        let mut reached = 0;
        for d in 0..=self.config.max_d {
            match assess_stationarity(&difference(values, d)) {
                Ok(assessment) if assessment.is_stationary => {
                    debug!(
                        d,
                        adf = assessment.adf.statistic,
                        kpss = assessment.kpss.statistic,
                        "Series stationary"
                    );
                    return d;
                }
                Ok(assessment) => {
                    debug!(
                        d,
                        adf = assessment.adf.statistic,
                        kpss = assessment.kpss.statistic,
                        "Series not stationary"
                    );
                    reached = d;
                }
                Err(e) => {
                    debug!(d, error = %e, "Stationarity tests unavailable");
                    break;
                }
            }
        }

        let err = ForecastError::Stationarity(format!(
            "no stationary series up to differencing order {reached}"
        ));
        warn!(error = %err, d = reached, "Proceeding with best achieved differencing");
        reached
    }

    /// Lowest-AIC candidate of order `d`.
    fn search(&self, values: &[f64], d: usize) -> Option<(ArimaOrder, ArmaFit)> {
        let differenced = difference(values, d);
        let deadline = self.config.search_budget.map(|budget| Instant::now() + budget);

        let mut best: Option<(ArimaOrder, ArmaFit)> = None;
        let mut evaluated = 0;
        for order in self.config.candidates(d) {
            if best.is_some() && deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(evaluated, "ARIMA order search budget exhausted, keeping best so far");
                break;
            }

            match fit_arma(&differenced, order.p, order.q, d <= 1) {
                Ok(candidate) => {
                    evaluated += 1;
                    if best.as_ref().map_or(true, |(_, b)| candidate.aic < b.aic) {
                        best = Some((order, candidate));
                    }
                }
                Err(e) => debug!(%order, error = %e, "Candidate order rejected"),
            }
        }
        best
    }

    fn fit_fallback(&self, values: &[f64]) -> Result<(ArimaOrder, ArmaFit)> {
        let order = self.config.fallback_order;
        let differenced = difference(values, order.d);
        fit_arma(&differenced, order.p, order.q, order.d <= 1)
            .map(|arma| (order, arma))
            .map_err(|e| {
                ForecastError::fit(
                    MODEL_NAME,
                    format!("no candidate order fitted and fallback {order} failed: {e}"),
                )
            })
    }
}

impl ForecastModel for ArimaModel {
    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn fit(&mut self, training: &TimeSeries) -> Result<()> {
        ensure_min_points(training, MIN_FIT_POINTS)?;
        let values = training.values();
        let last_timestamp = training
            .last()
            .map(|p| p.timestamp)
            .ok_or(ForecastError::InsufficientData {
                required: MIN_FIT_POINTS,
                actual: 0,
            })?;

        let d = self.select_differencing(&values);
        let (order, arma) = match self.search(&values, d) {
            Some(best) => best,
            None => {
                warn!(d, "No ARIMA candidate fitted, trying fallback order");
                self.fit_fallback(&values)?
            }
        };

        let tails = (0..order.d)
            .filter_map(|k| difference(&values, k).last().copied())
            .collect();

        debug!(%order, aic = arma.aic, sigma2 = arma.sigma2, "Fitted ARIMA model");
        self.fitted = Some(FittedArima {
            order,
            arma,
            tails,
            last_timestamp,
            step: infer_step(&training.timestamps()),
        });
        Ok(())
    }

    fn predict(&self, periods: usize) -> Result<ForecastResult> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ForecastError::ModelNotFitted(MODEL_NAME.to_string()))?;
        let arma = &fitted.arma;

        let differenced = forecast_arma(arma, periods);
        let values = integrate(differenced, &fitted.tails);

        let z = z_score(self.config.interval_width);
        let psi = psi_weights(&arma.ar, &arma.ma, fitted.order.d, periods);
        let mut cumulative = 0.0;
        let mut intervals = Vec::with_capacity(periods);
        for (value, weight) in values.iter().zip(&psi) {
            cumulative += weight * weight;
            let margin = z * (arma.sigma2 * cumulative).sqrt();
            intervals.push((value - margin, value + margin));
        }

        let (values, intervals) = match self.config.bounds {
            Some((lo, hi)) => (
                values.iter().map(|v| v.clamp(lo, hi)).collect(),
                intervals
                    .iter()
                    .map(|(a, b)| (a.clamp(lo, hi), b.clamp(lo, hi)))
                    .collect(),
            ),
            None => (values, intervals),
        };

        let timestamps =
            future_timestamps(MODEL_NAME, fitted.last_timestamp, fitted.step, periods)?;
        ForecastResult::new(MODEL_NAME, &timestamps, &values, &intervals)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

/// Hannan–Rissanen estimate of an ARMA(p, q), scored by CSS AIC.
fn fit_arma(series: &[f64], p: usize, q: usize, include_mean: bool) -> Result<ArmaFit> {
    let n = series.len();
    let mean = if include_mean {
        descriptive::mean(series)
    } else {
        0.0
    };
    let centred: Vec<f64> = series.iter().map(|v| v - mean).collect();

    let (ar, ma) = match (p, q) {
        (0, 0) => (Vec::new(), Vec::new()),
        (_, 0) => (regress_on_lags(&centred, &[], p, 0, p)?, Vec::new()),
        _ => {
            // a long autoregression supplies the innovations for the MA lags
            let long_order = p + q + 2;
            let long_ar = regress_on_lags(&centred, &[], long_order, 0, long_order)?;
            let mut innovations = vec![0.0; n];
            for t in long_order..n {
                innovations[t] = centred[t] - lag_dot(&centred, &long_ar, t);
            }
            let mut coefficients =
                regress_on_lags(&centred, &innovations, p, q, long_order + q)?;
            let ma = coefficients.split_off(p);
            (coefficients, ma)
        }
    };

    if spectral_radius(&ar) >= MAX_ROOT_MODULUS {
        return Err(ForecastError::fit(MODEL_NAME, "AR part is not stationary"));
    }
    let negated_ma: Vec<f64> = ma.iter().map(|c| -c).collect();
    if spectral_radius(&negated_ma) >= MAX_ROOT_MODULUS {
        return Err(ForecastError::fit(MODEL_NAME, "MA part is not invertible"));
    }

    let residuals = css_residuals(&centred, &ar, &ma);
    let effective = n - p;
    let parameters = p + q + usize::from(include_mean) + 1;
    if effective <= parameters {
        return Err(ForecastError::InsufficientData {
            required: p + parameters + 1,
            actual: n,
        });
    }

    let scale = series.iter().fold(1.0_f64, |m, v| m.max(v.abs()));
    let sum_squared: f64 = residuals[p..].iter().map(|a| a * a).sum();
    let sigma2 = (sum_squared / effective as f64).max(1e-12 * scale * scale);
    let log_likelihood =
        -0.5 * effective as f64 * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * parameters as f64;
    if !aic.is_finite() {
        return Err(ForecastError::fit(MODEL_NAME, "likelihood is not finite"));
    }

    Ok(ArmaFit {
        ar,
        ma,
        mean,
        centred,
        residuals,
        sigma2,
        aic,
    })
}

/// OLS of `x[t]` on `x[t-1..=t-p]` and `e[t-1..=t-q]` for `t >= start`.
fn regress_on_lags(x: &[f64], e: &[f64], p: usize, q: usize, start: usize) -> Result<Vec<f64>> {
    let rows: Vec<Vec<f64>> = (start..x.len())
        .map(|t| {
            (1..=p)
                .map(|i| x[t - i])
                .chain((1..=q).map(|j| e[t - j]))
                .collect()
        })
        .collect();
    let targets: Vec<f64> = x[start.min(x.len())..].to_vec();
    ordinary_least_squares(&rows, &targets)
        .map(|fit| fit.coefficients)
        .map_err(|e| ForecastError::fit(MODEL_NAME, e.to_string()))
}

/// `Σ coefficients[i] · values[t - 1 - i]`, skipping lags before the start.
fn lag_dot(values: &[f64], coefficients: &[f64], t: usize) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .filter(|(i, _)| t > *i)
        .map(|(i, c)| c * values[t - 1 - i])
        .sum()
}

/// Conditional residuals with the first `p` fixed at zero.
fn css_residuals(x: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let mut residuals = vec![0.0; x.len()];
    for t in ar.len()..x.len() {
        residuals[t] = x[t] - lag_dot(x, ar, t) - lag_dot(&residuals, ma, t);
    }
    residuals
}

/// Largest eigenvalue modulus of the companion matrix whose first row is
/// `first_row`; below one means all polynomial roots lie outside the unit
/// circle.
fn spectral_radius(first_row: &[f64]) -> f64 {
    match first_row.len() {
        0 => 0.0,
        1 => first_row[0].abs(),
        k => {
            let companion = DMatrix::from_fn(k, k, |i, j| {
                if i == 0 {
                    first_row[j]
                } else if i == j + 1 {
                    1.0
                } else {
                    0.0
                }
            });
            companion
                .complex_eigenvalues()
                .iter()
                .map(|z| z.norm_sqr().sqrt())
                .fold(0.0, f64::max)
        }
    }
}

/// Recursive ARMA forecasts of the differenced series.
fn forecast_arma(arma: &ArmaFit, horizon: usize) -> Vec<f64> {
    let n = arma.centred.len();
    let mut x = arma.centred.clone();
    let mut residuals = arma.residuals.clone();
    for _ in 0..horizon {
        let t = x.len();
        let next = lag_dot(&x, &arma.ar, t) + lag_dot(&residuals, &arma.ma, t);
        x.push(next);
        residuals.push(0.0);
    }
    x[n..].iter().map(|v| v + arma.mean).collect()
}

/// Undo differencing, innermost level first.
fn integrate(differenced: Vec<f64>, tails: &[f64]) -> Vec<f64> {
    tails.iter().rev().fold(differenced, |series, &tail| {
        let mut level = tail;
        series
            .into_iter()
            .map(|v| {
                level += v;
                level
            })
            .collect()
    })
}

/// MA(∞) weights of the integrated model `φ(B)(1 - B)^d x = θ(B) a`.
fn psi_weights(ar: &[f64], ma: &[f64], d: usize, horizon: usize) -> Vec<f64> {
    let mut polynomial: Vec<f64> = std::iter::once(1.0).chain(ar.iter().map(|c| -c)).collect();
    for _ in 0..d {
        let mut next = vec![0.0; polynomial.len() + 1];
        for (i, &c) in polynomial.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c;
        }
        polynomial = next;
    }
    let phi: Vec<f64> = polynomial[1..].iter().map(|c| -c).collect();

    let mut psi: Vec<f64> = Vec::with_capacity(horizon);
    for j in 0..horizon {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut weight = ma.get(j - 1).copied().unwrap_or(0.0);
        for i in 1..=phi.len().min(j) {
            weight += phi[i - 1] * psi[j - i];
        }
        psi.push(weight);
    }
    psi
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn daily(values: &[f64]) -> TimeSeries {
        TimeSeries::daily(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), values).unwrap()
    }

    fn noise(n: usize, sd: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, sd).unwrap();
        (0..n).map(|_| normal.sample(&mut rng)).collect()
    }

    fn random_walk(n: usize, seed: u64) -> Vec<f64> {
        noise(n, 1.0, seed)
            .into_iter()
            .scan(100.0, |level, step| {
                *level += step;
                Some(*level)
            })
            .collect()
    }

    #[test]
    fn test_predict_before_fit() {
        let model = ArimaModel::for_metric(MetricType::General);
        assert!(matches!(model.predict(3), Err(ForecastError::ModelNotFitted(_))));
    }

    #[test]
    fn test_rejects_short_series() {
        let mut model = ArimaModel::for_metric(MetricType::General);
        assert!(matches!(
            model.fit(&daily(&[1.0, 2.0, 3.0])),
            Err(ForecastError::InsufficientData { required: 10, actual: 3 })
        ));
    }

    #[test]
    fn test_estimates_ar1_coefficient() {
        let shocks = noise(400, 1.0, 21);
        let mut x = vec![0.0; shocks.len()];
        for t in 1..x.len() {
            x[t] = 0.6 * x[t - 1] + shocks[t];
        }
        let fit = fit_arma(&x, 1, 0, true).unwrap();
        assert_relative_eq!(fit.ar[0], 0.6, epsilon = 0.15);
        assert_relative_eq!(fit.sigma2, 1.0, epsilon = 0.2);
    }

    #[test]
    fn test_trend_is_differenced_once() {
        let values: Vec<f64> = noise(100, 1.0, 5)
            .iter()
            .enumerate()
            .map(|(i, e)| 0.5 * i as f64 + e)
            .collect();
        let mut model = ArimaModel::for_metric(MetricType::General);
        model.fit(&daily(&values)).unwrap();
        assert_eq!(model.order().map(|o| o.d), Some(1));

        let forecast = model.predict(10).unwrap();
        assert!(forecast.values()[9] > 50.0);
    }

    #[test]
    fn test_constant_series_forecasts_its_level() {
        let mut model = ArimaModel::for_metric(MetricType::General);
        model.fit(&daily(&[5.0; 20])).unwrap();
        assert_eq!(model.order(), Some(ArimaOrder::new(0, 0, 0)));
        for value in model.predict(3).unwrap().values() {
            assert_relative_eq!(value, 5.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_probability_output_is_clamped() {
        let values: Vec<f64> = (0..30).map(|i| (0.7 + 0.01 * i as f64).min(0.99)).collect();
        let mut model = ArimaModel::for_metric(MetricType::Probability);
        model.fit(&daily(&values)).unwrap();
        for p in model.predict(40).unwrap().points() {
            assert!((0.0..=1.0).contains(&p.predicted_value));
            assert!(p.lower_bound >= 0.0 && p.upper_bound <= 1.0);
        }
    }

    #[test]
    fn test_search_budget_keeps_first_candidate() {
        let config = ArimaConfig::for_metric(MetricType::General)
            .with_search_budget(Some(StdDuration::ZERO));
        let mut model = ArimaModel::new(config);
        model.fit(&daily(&random_walk(60, 8))).unwrap();
        let order = model.order().unwrap();
        assert_eq!((order.p, order.q), (0, 0));
    }

    #[test]
    fn test_fallback_order() {
        let model = ArimaModel::for_metric(MetricType::General);
        let (order, fit) = model.fit_fallback(&random_walk(120, 13)).unwrap();
        assert_eq!(order, ArimaOrder::new(1, 1, 1));
        assert_eq!((fit.ar.len(), fit.ma.len()), (1, 1));
    }

    #[test]
    fn test_fit_uses_fallback_when_no_candidate_fits() {
        let values: Vec<f64> = noise(100, 1.0, 5)
            .iter()
            .enumerate()
            .map(|(i, e)| 0.5 * i as f64 + e)
            .collect();
        // Any differenced candidate exceeds an order cap of zero
        let config = ArimaConfig {
            max_order: 0,
            ..ArimaConfig::for_metric(MetricType::General)
        };
        let mut model = ArimaModel::new(config);
        model.fit(&daily(&values)).unwrap();

        assert_eq!(model.order(), Some(ArimaOrder::new(1, 1, 1)));
        assert!(model.aic().is_some_and(f64::is_finite));
        let forecast = model.predict(5).unwrap();
        assert_eq!(forecast.horizons(), 5);
        assert!(forecast.values()[4] > 45.0);
    }

    #[test]
    fn test_candidates_respect_max_order() {
        let config = ArimaConfig::for_metric(MetricType::Probability);
        let candidates: Vec<ArimaOrder> = config.candidates(2).collect();
        assert!(candidates.iter().all(|o| o.p + o.d + o.q <= 5));
        assert!(candidates.contains(&ArimaOrder::new(3, 2, 0)));
        assert!(!candidates.contains(&ArimaOrder::new(3, 2, 1)));
    }

    #[test]
    fn test_spectral_radius() {
        assert_relative_eq!(spectral_radius(&[0.5]), 0.5);
        // x² - 0.5x - 0.06 has roots 0.6 and -0.1
        assert_relative_eq!(spectral_radius(&[0.5, 0.06]), 0.6, epsilon = 1e-9);
        assert!(spectral_radius(&[0.5, 0.6]) > 1.0);
    }

    #[test]
    fn test_psi_weights() {
        assert_eq!(psi_weights(&[], &[], 1, 4), vec![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(psi_weights(&[0.5], &[], 0, 4), vec![1.0, 0.5, 0.25, 0.125]);
        assert_eq!(psi_weights(&[], &[0.4], 0, 3), vec![1.0, 0.4, 0.0]);
    }

    #[test]
    fn test_integrate() {
        assert_eq!(integrate(vec![1.0, 1.0], &[10.0]), vec![11.0, 12.0]);
        assert_eq!(integrate(vec![0.0, 0.0], &[10.0, 2.0]), vec![12.0, 14.0]);
        assert_eq!(integrate(vec![3.0], &[]), vec![3.0]);
    }

    #[test]
    fn test_interval_widens_for_random_walk() {
        let mut model = ArimaModel::for_metric(MetricType::General);
        model.fit(&daily(&random_walk(80, 2))).unwrap();
        let widths: Vec<f64> = model
            .predict(6)
            .unwrap()
            .points()
            .iter()
            .map(|p| p.upper_bound - p.lower_bound)
            .collect();
        assert!(widths[0] > 0.0);
        assert!(widths[5] >= widths[0]);
    }
}
